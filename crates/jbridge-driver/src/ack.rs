//! Acknowledgment handshake
//!
//! Completing a request is two steps the target must observe in order: the
//! Ack word is written, then the ack line is pulsed. Both happen while the
//! Device Access Layer lock is held so no other transfer can slip between
//! the word write and the edge the target reacts to.

use crate::error::Result;
use crate::link::DeviceAccess;
use jbridge_target::AckKind;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Digital output the target watches for the acknowledgment edge.
pub trait AckLine: Debug + Send {
    /// Drive the line high (`true`) or low.
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be driven.
    fn set(&mut self, high: bool) -> Result<()>;

    /// Assert, then immediately clear.
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be driven.
    fn pulse(&mut self) -> Result<()> {
        self.set(true)?;
        self.set(false)
    }
}

/// Ack line for links whose target polls the Ack word instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unwired;

impl AckLine for Unwired {
    fn set(&mut self, _high: bool) -> Result<()> {
        Ok(())
    }
}

/// Writes the Ack word and pulses the ack line.
#[derive(Debug)]
pub struct Acknowledger {
    ack_word: u32,
    line: Mutex<Box<dyn AckLine>>,
}

impl Acknowledger {
    /// Acknowledge through `line`, writing codes to `ack_word`.
    pub fn new(ack_word: u32, line: Box<dyn AckLine>) -> Self {
        Self {
            ack_word,
            line: Mutex::new(line),
        }
    }

    /// Signal completion of one request.
    ///
    /// # Errors
    ///
    /// Returns error if the word write or the pulse fails.
    pub fn acknowledge(&self, access: &DeviceAccess, kind: AckKind) -> Result<()> {
        let mut link = access.lock();
        link.write_word(self.ack_word, kind.word())?;
        self.line
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pulse()?;
        drop(link);
        tracing::debug!("Acknowledged {kind:?}");
        Ok(())
    }
}
