//! In-memory transports
//!
//! Stand-ins for the console and the network that tests and dry runs can
//! script: input is queued ahead of time, output is captured and can be
//! waited on. Clones share the same queues.

use super::{ConsoleTransport, NetworkTransport};
use crate::error::{BridgeError, Result};
use bytes::Bytes;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Block on `cv` until `done` holds or `timeout` expires.
fn wait_until<T>(
    lock: &Mutex<T>,
    cv: &Condvar,
    timeout: Duration,
    mut done: impl FnMut(&T) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if done(&guard) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        guard = cv
            .wait_timeout(guard, deadline - now)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}

#[derive(Debug, Default)]
struct ConsoleState {
    input: VecDeque<u8>,
    input_ended: bool,
    output: Vec<u8>,
}

#[derive(Debug, Default)]
struct ConsoleShared {
    state: Mutex<ConsoleState>,
    changed: Condvar,
}

/// Scripted console.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    shared: Arc<ConsoleShared>,
}

impl MemoryConsole {
    /// Empty console; reads block until input is typed.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes as if typed by the operator.
    pub fn type_input(&self, bytes: &[u8]) {
        self.state().input.extend(bytes);
        self.shared.changed.notify_all();
    }

    /// Signal end of input; readers get `None` once the queue drains.
    pub fn end_input(&self) {
        self.state().input_ended = true;
        self.shared.changed.notify_all();
    }

    /// Everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.state().output.clone()
    }

    /// Everything written so far, as lossy UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.state().output).into_owned()
    }

    /// Drain the captured output.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().output)
    }

    /// Wait until the output contains `needle`.
    pub fn wait_for_output(&self, needle: &str, timeout: Duration) -> bool {
        let needle = needle.as_bytes();
        wait_until(&self.shared.state, &self.shared.changed, timeout, |s| {
            s.output.windows(needle.len().max(1)).any(|w| w == needle)
        })
    }

    /// Wait until at least `len` bytes have been written.
    pub fn wait_for_output_len(&self, len: usize, timeout: Duration) -> bool {
        wait_until(&self.shared.state, &self.shared.changed, timeout, |s| {
            s.output.len() >= len
        })
    }
}

impl ConsoleTransport for MemoryConsole {
    fn read_byte(&self) -> Result<Option<u8>> {
        let mut state = self.state();
        loop {
            if let Some(byte) = state.input.pop_front() {
                return Ok(Some(byte));
            }
            if state.input_ended {
                return Ok(None);
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        self.state().output.extend_from_slice(bytes);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn close(&self) {
        self.end_input();
    }
}

#[derive(Debug, Default)]
struct NetworkState {
    inbox: VecDeque<(SocketAddr, Bytes)>,
    sent: Vec<Bytes>,
    failing: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct NetworkShared {
    state: Mutex<NetworkState>,
    changed: Condvar,
}

/// In-process datagram link.
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    peer: SocketAddr,
    shared: Arc<NetworkShared>,
}

impl MemoryNetwork {
    /// Link whose fixed peer is `peer`.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            shared: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a datagram from `from` for the next receive.
    pub fn deliver(&self, from: SocketAddr, payload: impl Into<Bytes>) {
        self.state().inbox.push_back((from, payload.into()));
        self.shared.changed.notify_all();
    }

    /// Datagrams sent so far.
    pub fn sent(&self) -> Vec<Bytes> {
        self.state().sent.clone()
    }

    /// Make sends fail (`true`) or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Wait until at least `count` datagrams have been sent.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        wait_until(&self.shared.state, &self.shared.changed, timeout, |s| {
            s.sent.len() >= count
        })
    }
}

impl NetworkTransport for MemoryNetwork {
    fn send(&self, payload: &[u8]) -> Result<usize> {
        let mut state = self.state();
        if state.failing {
            return Err(BridgeError::transport_failed(format!(
                "send to {} refused",
                self.peer
            )));
        }
        state.sent.push(Bytes::copy_from_slice(payload));
        drop(state);
        self.shared.changed.notify_all();
        Ok(payload.len())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<(SocketAddr, usize)> {
        let mut state = self.state();
        loop {
            if let Some((from, payload)) = state.inbox.pop_front() {
                let n = payload.len().min(buf.len());
                buf[..n].copy_from_slice(&payload[..n]);
                return Ok((from, n));
            }
            if state.closed {
                return Ok((self.peer, 0));
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        self.state().closed = true;
        self.shared.changed.notify_all();
    }
}
