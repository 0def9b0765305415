//! Device Access Layer
//!
//! Every access to target memory goes through one [`DeviceAccess`], which
//! serializes the underlying [`TargetLink`] behind a single lock. The debug
//! port is a strictly serial resource: a word read interleaved with another
//! caller's word write would corrupt both transfers.
//!
//! Callers hold the lock for one word at a time ([`DeviceAccess::read`],
//! [`DeviceAccess::write`]) so the dispatcher's status read never waits
//! behind a whole window transfer. Multi-step sequences that must not be
//! split (ack word + ack pulse, the re-entry sequence) take the guard from
//! [`DeviceAccess::lock`] explicitly.

use crate::backends::{MappedLink, SimulatedTarget};
use crate::error::Result;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Word-at-a-time access to target memory.
///
/// Implementations block until the transfer completes. There is no timeout:
/// a target that stops answering surfaces as an error from the link itself
/// and is treated as fatal by the caller.
pub trait TargetLink: Debug + Send {
    /// Read one 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns error if the transfer fails or the address is unreachable.
    fn read_word(&mut self, address: u32) -> Result<u32>;

    /// Write one 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns error if the transfer fails or the address is unreachable.
    fn write_word(&mut self, address: u32, word: u32) -> Result<()>;

    /// Re-enter the debug port: reset, leave the test-logic state and power
    /// up the debug access port. Needed after the target has been running
    /// on its own for a while.
    ///
    /// # Errors
    ///
    /// Returns error if the sequence cannot be driven.
    fn reenter(&mut self) -> Result<()> {
        Ok(())
    }

    /// Debug port identity, if the link has one.
    ///
    /// # Errors
    ///
    /// Returns error if the identification scan fails.
    fn idcode(&mut self) -> Result<Option<u32>>;

    /// Backend type for diagnostics.
    fn link_type(&self) -> LinkType;
}

/// Link backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// In-process simulated target
    Simulated,

    /// Target memory mapped through a device file
    Mapped,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "Simulated"),
            Self::Mapped => write!(f, "Mapped"),
        }
    }
}

/// Link selection
#[derive(Debug, Clone)]
pub enum LinkSelection {
    /// Use (a handle to) a simulated target
    Simulated(SimulatedTarget),

    /// Map `size` bytes of `path`; byte 0 of the file is target address `base`
    Mapped {
        /// Device file exposing target memory
        path: PathBuf,
        /// Target address of the first mapped byte
        base: u32,
        /// Number of bytes to map
        size: usize,
    },
}

/// Open the selected link backend
///
/// # Errors
///
/// Returns error if the backend cannot be opened.
pub fn select_link(selection: LinkSelection) -> Result<Box<dyn TargetLink>> {
    match selection {
        LinkSelection::Simulated(target) => {
            tracing::info!("Using simulated target link");
            Ok(Box::new(target))
        }
        LinkSelection::Mapped { path, base, size } => {
            let link = MappedLink::open(&path, base, size)?;
            tracing::info!("Using mapped target link {}", path.display());
            Ok(Box::new(link))
        }
    }
}

/// The single serialization point for target memory.
#[derive(Debug)]
pub struct DeviceAccess {
    link: Mutex<Box<dyn TargetLink>>,
}

impl DeviceAccess {
    /// Wrap a link
    pub fn new(link: Box<dyn TargetLink>) -> Self {
        Self {
            link: Mutex::new(link),
        }
    }

    /// Read one word under the lock
    ///
    /// # Errors
    ///
    /// Returns error if the link transfer fails.
    pub fn read(&self, address: u32) -> Result<u32> {
        let word = self.lock().read_word(address)?;
        tracing::trace!("read  {address:#010x} = {word:#010x}");
        Ok(word)
    }

    /// Write one word under the lock
    ///
    /// # Errors
    ///
    /// Returns error if the link transfer fails.
    pub fn write(&self, address: u32, word: u32) -> Result<()> {
        tracing::trace!("write {address:#010x} = {word:#010x}");
        self.lock().write_word(address, word)
    }

    /// Take the lock for a multi-step sequence.
    ///
    /// A panic in another holder leaves only words behind, never a
    /// half-updated Rust value, so a poisoned lock is simply taken over.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn TargetLink>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
