//! UDP network transport
//!
//! The local port is bound once and the peer fixed at construction. Sends
//! use `send_to` on the bound socket. Receives wait for readability with
//! `poll(2)` in short slices so [`NetworkTransport::close`] can release a
//! blocked receiver.

use super::{retry_interrupted, NetworkTransport};
use crate::error::{BridgeError, Result};
use rustix::event::{poll, PollFd, PollFlags};
use rustix::io::Errno;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};

/// Poll slice while waiting for a datagram, in milliseconds.
const RECEIVE_POLL_MS: i32 = 100;

/// Bound UDP socket talking to one peer.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Bind `local` and fix `peer`.
    ///
    /// # Errors
    ///
    /// Returns error if the local endpoint cannot be bound.
    pub fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)
            .map_err(|e| BridgeError::transport_failed(format!("bind {local}: {e}")))?;
        tracing::info!("Network transport bound to {local}, peer {peer}");
        Ok(Self {
            socket,
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// Actual bound endpoint (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn wait_readable(&self) -> Result<bool> {
        while !self.closed.load(Ordering::Acquire) {
            let mut fds = [PollFd::new(&self.socket, PollFlags::IN)];
            match poll(&mut fds, RECEIVE_POLL_MS) {
                Ok(0) => {}
                Ok(_) => return Ok(true),
                Err(e) if e == Errno::INTR => {}
                Err(e) => return Err(BridgeError::transport_failed(format!("poll: {e}"))),
            }
        }
        Ok(false)
    }
}

impl NetworkTransport for UdpTransport {
    fn send(&self, payload: &[u8]) -> Result<usize> {
        let sent = self
            .socket
            .send_to(payload, self.peer)
            .map_err(|e| BridgeError::transport_failed(format!("send to {}: {e}", self.peer)))?;
        tracing::debug!("Sent {sent} bytes to {}", self.peer);
        Ok(sent)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<(SocketAddr, usize)> {
        if !self.wait_readable()? {
            return Ok((self.peer, 0));
        }
        let (len, from) = retry_interrupted(|| self.socket.recv_from(buf))
            .map_err(|e| BridgeError::transport_failed(format!("receive: {e}")))?;
        tracing::debug!("Received {len} bytes from {from}");
        Ok((from, len))
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
