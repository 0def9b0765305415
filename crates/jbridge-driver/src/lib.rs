//! Host-side bridge between a JTAG-attached target and the outside world.
//!
//! The target cannot own a console or a network interface. It stages a
//! request in a small memory mailbox, writes a Status word and raises its
//! request line; this crate notices, moves the payload between target
//! memory and a console or UDP transport one word at a time, and answers
//! with an Ack word plus an ack pulse.
//!
//! # Layers
//!
//! ```text
//! TargetLink (SimulatedTarget, MappedLink)
//!   └─ DeviceAccess          one lock, one word per acquisition
//!        └─ codec            window ⇄ TextBuffer, little-endian, null-terminated
//!             └─ workers     term-write, term-read, inet-write, inet-read
//!                  ▲
//!   dispatch ──────┘         one Status word → one Wake Signal
//!   dump                     operator-triggered window dump
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use jbridge_driver::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let config = BridgeConfig::from_env()?.without_network();
//! let target = SimulatedTarget::new();
//! let ctx = BridgeContext::new(
//!     Box::new(target.clone()),
//!     Box::new(target.clone()),
//!     Arc::new(StdioConsole),
//!     &config,
//! );
//! startup::bring_up(ctx.access(), ctx.console(), config.expected_idcode, None)?;
//!
//! let bridge = Bridge::start(ctx)?;
//! bridge.interrupt();
//! bridge.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod ack;
pub mod backends;
mod bridge;
pub mod buffer;
pub mod codec;
pub mod config;
mod console;
mod context;
pub mod dispatch;
pub mod dump;
mod error;
mod link;
pub mod operator;
pub mod signal;
pub mod startup;
pub mod transport;
pub mod workers;

pub use ack::{AckLine, Acknowledger, Unwired};
pub use backends::{Direction, MappedLink, SimulatedTarget, SysfsGpio, TargetEvent};
pub use bridge::{Bridge, BridgeHandle};
pub use buffer::{ChannelBuffers, TextBuffer};
pub use config::{BridgeConfig, NetworkConfig};
pub use console::Console;
pub use context::{BridgeContext, NetworkChannel};
pub use error::{BridgeError, Result, ServiceError};
pub use link::{select_link, DeviceAccess, LinkSelection, LinkType, TargetLink};
pub use signal::{Role, Signals, WakePolicy, WakeSignal};
pub use startup::ProgramImage;
pub use transport::{
    ConsoleTransport, MemoryConsole, MemoryNetwork, NetworkTransport, StdioConsole, UdpTransport,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        startup, AckLine, Bridge, BridgeConfig, BridgeContext, BridgeError, BridgeHandle,
        ConsoleTransport, DeviceAccess, LinkSelection, MemoryConsole, MemoryNetwork,
        NetworkTransport, ProgramImage, Result, Role, SimulatedTarget, StdioConsole,
        TargetLink, UdpTransport, WakePolicy,
    };
}
