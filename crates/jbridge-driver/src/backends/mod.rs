//! Target link and handshake-line backends
//!
//! Two link backends are available:
//! - **Simulated**: in-process word memory with an event log (CI, dry runs)
//! - **Mapped**: target memory exposed as a mappable device file
//!
//! The handshake lines (request interrupt in, ack pulse out) are sysfs GPIOs
//! on real hardware; the simulated target doubles as its own ack line.

pub mod gpio;
pub mod mmap;
pub mod simulated;

pub use gpio::{Direction, SysfsGpio};
pub use mmap::MappedLink;
pub use simulated::{SimulatedTarget, TargetEvent};
