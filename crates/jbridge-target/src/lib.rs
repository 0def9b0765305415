//! Target-side model for the JTAG bridge.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure description of what the target processor expects from its host:
//! where the request mailbox lives in target memory, what the request and
//! acknowledgment codes mean, how to read the debug port identity, and how
//! the two boards of a deployment address each other on the network.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`map`] | Status/Ack word addresses, Outbound and Inbound memory windows |
//! | [`protocol`] | Request codes written by the target, acknowledgment codes |
//! | [`idcode`] | JTAG IDCODE layout and the expected debug port identity |
//! | [`net`] | Node profiles (local/remote address pairs, UDP port) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod idcode;
pub mod map;
pub mod net;
pub mod protocol;

pub use idcode::IdCode;
pub use map::{MemoryWindow, TargetMap, WORD_SIZE};
pub use net::NodeProfile;
pub use protocol::{AckKind, Request};
