//! Simulated target backend
//!
//! Implements [`TargetLink`] and [`AckLine`] over an in-process word memory.
//! This enables:
//!
//! 1. **CI without hardware**: every dispatcher and worker path runs against
//!    a target whose memory can be staged and inspected word by word.
//!
//! 2. **Dry runs of the CLI**: `jbridge run --backend sim` brings the whole
//!    bridge up with nothing attached.
//!
//! 3. **Protocol accounting**: every word transfer, ack line transition and
//!    re-entry sequence is appended to an event log, so tests can assert the
//!    exact handshake order ("one ack word write, then one pulse"). The log
//!    keeps the most recent [`EVENT_LOG_CAPACITY`] events; pulse and
//!    re-entry totals are counted separately and never drop.
//!
//! `SimulatedTarget` is a cheap handle; clones share the same memory.

use crate::ack::AckLine;
use crate::error::{BridgeError, Result};
use crate::link::{LinkType, TargetLink};
use jbridge_target::idcode::EXPECTED_IDCODE;
use jbridge_target::{MemoryWindow, TargetMap, WORD_SIZE};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Events retained by the log; older ones are discarded first.
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// One observable action on the simulated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    /// Word read through the link
    Read {
        /// Word address
        address: u32,
    },
    /// Word written through the link
    Write {
        /// Word address
        address: u32,
        /// Value written
        word: u32,
    },
    /// Ack line driven to a level
    AckLevel(bool),
    /// Debug port re-entry sequence
    Reenter,
}

#[derive(Debug)]
struct State {
    memory: HashMap<u32, u32>,
    events: VecDeque<TargetEvent>,
    ack_high: bool,
    pulses: usize,
    reentries: usize,
    idcode: Option<u32>,
    responsive: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

/// Software stand-in for the target processor.
#[derive(Debug, Clone)]
pub struct SimulatedTarget {
    shared: Arc<Shared>,
}

impl Default for SimulatedTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTarget {
    /// Create a target with zeroed memory that answers the expected IDCODE.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    memory: HashMap::new(),
                    events: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
                    ack_high: false,
                    pulses: 0,
                    reentries: 0,
                    idcode: Some(EXPECTED_IDCODE),
                    responsive: true,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Report a different debug port identity (`None`: no identity at all).
    #[must_use]
    pub fn with_idcode(self, idcode: Option<u32>) -> Self {
        self.state().idcode = idcode;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, mut state: MutexGuard<'_, State>, event: TargetEvent) {
        match event {
            TargetEvent::AckLevel(level) => {
                if state.ack_high && !level {
                    state.pulses += 1;
                }
                state.ack_high = level;
            }
            TargetEvent::Reenter => state.reentries += 1,
            TargetEvent::Read { .. } | TargetEvent::Write { .. } => {}
        }
        if state.events.len() == EVENT_LOG_CAPACITY {
            state.events.pop_front();
        }
        state.events.push_back(event);
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Make every subsequent link transfer fail (`false`) or succeed again.
    pub fn set_responsive(&self, responsive: bool) {
        self.state().responsive = responsive;
    }

    /// Read a word without going through the link (not logged).
    pub fn peek(&self, address: u32) -> u32 {
        self.state().memory.get(&address).copied().unwrap_or(0)
    }

    /// Write a word without going through the link (not logged).
    pub fn poke(&self, address: u32, word: u32) {
        self.state().memory.insert(address, word);
    }

    /// Fill a window with one word value.
    pub fn fill(&self, window: MemoryWindow, word: u32) {
        let mut state = self.state();
        for address in window.word_addresses() {
            state.memory.insert(address, word);
        }
    }

    /// Stage text the way target firmware does: bytes packed little-endian
    /// into words, followed by a terminator if it fits.
    pub fn stage_text(&self, window: MemoryWindow, text: &[u8]) {
        let mut bytes = text.to_vec();
        bytes.push(0);
        let mut state = self.state();
        for (address, chunk) in window
            .word_addresses()
            .zip(bytes.chunks(WORD_SIZE as usize))
        {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            state.memory.insert(address, u32::from_le_bytes(word));
        }
    }

    /// Window contents up to the first zero byte.
    pub fn read_text(&self, window: MemoryWindow) -> Vec<u8> {
        let state = self.state();
        window
            .word_addresses()
            .flat_map(|a| state.memory.get(&a).copied().unwrap_or(0).to_le_bytes())
            .take_while(|&b| b != 0)
            .collect()
    }

    /// Raw words of a window.
    pub fn window_words(&self, window: MemoryWindow) -> Vec<u32> {
        let state = self.state();
        window
            .word_addresses()
            .map(|a| state.memory.get(&a).copied().unwrap_or(0))
            .collect()
    }

    /// Write the Status word of `map` (what the target does before raising
    /// its request line).
    pub fn post_request(&self, map: &TargetMap, status: u32) {
        self.poke(map.status_word, status);
    }

    /// Snapshot of the retained event log, oldest first.
    pub fn events(&self) -> Vec<TargetEvent> {
        self.state().events.iter().copied().collect()
    }

    /// Retained word writes to `address`, in order.
    pub fn writes_to(&self, address: u32) -> Vec<u32> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match *e {
                TargetEvent::Write { address: a, word } if a == address => Some(word),
                _ => None,
            })
            .collect()
    }

    /// Number of complete ack pulses (high followed by low).
    pub fn ack_pulses(&self) -> usize {
        self.state().pulses
    }

    /// Number of re-entry sequences driven.
    pub fn reentries(&self) -> usize {
        self.state().reentries
    }

    /// Block until `pulses` ack pulses have been seen or `timeout` expires.
    pub fn wait_for_pulses(&self, pulses: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            if state.pulses >= pulses {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl TargetLink for SimulatedTarget {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        let state = self.state();
        if !state.responsive {
            return Err(BridgeError::link_failed(format!(
                "target not responding (read {address:#010x})"
            )));
        }
        let word = state.memory.get(&address).copied().unwrap_or(0);
        self.record(state, TargetEvent::Read { address });
        Ok(word)
    }

    fn write_word(&mut self, address: u32, word: u32) -> Result<()> {
        let mut state = self.state();
        if !state.responsive {
            return Err(BridgeError::link_failed(format!(
                "target not responding (write {address:#010x})"
            )));
        }
        state.memory.insert(address, word);
        self.record(state, TargetEvent::Write { address, word });
        Ok(())
    }

    fn reenter(&mut self) -> Result<()> {
        let state = self.state();
        if !state.responsive {
            return Err(BridgeError::link_failed("target not responding (re-entry)"));
        }
        self.record(state, TargetEvent::Reenter);
        Ok(())
    }

    fn idcode(&mut self) -> Result<Option<u32>> {
        let state = self.state();
        if !state.responsive {
            return Err(BridgeError::link_failed("target not responding (IDCODE scan)"));
        }
        Ok(state.idcode)
    }

    fn link_type(&self) -> LinkType {
        LinkType::Simulated
    }
}

impl AckLine for SimulatedTarget {
    fn set(&mut self, high: bool) -> Result<()> {
        let state = self.state();
        self.record(state, TargetEvent::AckLevel(high));
        Ok(())
    }
}
