//! Transports: the byte stream and datagram links outside the process.
//!
//! ```text
//! ConsoleTransport   blocking byte stream
//!   StdioConsole       process stdin/stdout
//!   MemoryConsole      scripted input, captured output
//!
//! NetworkTransport   connectionless, fixed peer
//!   UdpTransport       std UdpSocket, readiness via poll(2)
//!   MemoryNetwork      in-process datagram queues
//! ```
//!
//! Methods take `&self`: the console is read by one thread while another
//! writes to it, and the network is sent on and received from concurrently.

use crate::error::Result;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;

pub mod memory;
pub mod stdio;
pub mod udp;

pub use memory::{MemoryConsole, MemoryNetwork};
pub use stdio::StdioConsole;
pub use udp::UdpTransport;

/// Blocking byte-stream console.
pub trait ConsoleTransport: Debug + Send + Sync {
    /// Block for the next input byte. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns error if the input stream fails.
    fn read_byte(&self) -> Result<Option<u8>>;

    /// Write every byte of `bytes`, blocking while the stream is not writable.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails.
    fn write_all(&self, bytes: &[u8]) -> Result<()>;

    /// Release any reader blocked in [`Self::read_byte`].
    fn close(&self) {}
}

/// Datagram link with a peer fixed at initialization.
pub trait NetworkTransport: Debug + Send + Sync {
    /// Send one datagram to the peer. Returns bytes sent.
    ///
    /// # Errors
    ///
    /// Returns error on a definitive send failure.
    fn send(&self, payload: &[u8]) -> Result<usize>;

    /// Block for one datagram. Returns the sender and the payload length;
    /// a length of 0 means nothing was received.
    ///
    /// # Errors
    ///
    /// Returns error on a definitive receive failure.
    fn receive(&self, buf: &mut [u8]) -> Result<(SocketAddr, usize)>;

    /// The fixed peer endpoint.
    fn peer(&self) -> SocketAddr;

    /// Release any receiver blocked in [`Self::receive`]; it returns a
    /// length of 0.
    fn close(&self) {}
}

/// Run `op` again for as long as it is interrupted by a signal.
pub(crate) fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}
