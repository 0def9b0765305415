//! Startup sequence
//!
//! Runs before any role thread exists, so it uses the link directly:
//!
//! 1. Reset the debug port and read the IDCODE; a wrong identity halts.
//! 2. Power up the debug access port.
//! 3. If configured, load the program image word by word and read it back.
//!
//! Load progress is reported on the console.

use crate::console::Console;
use crate::error::{BridgeError, Result};
use crate::link::DeviceAccess;
use bytes::Bytes;
use jbridge_target::{IdCode, WORD_SIZE};
use std::path::Path;
use tracing::{debug, info, warn};

/// Program binary and where it goes.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    /// Raw image bytes
    pub data: Bytes,
    /// Target address of the first byte
    pub base: u32,
}

impl ProgramImage {
    /// Image of `data` loaded at `base`.
    pub fn new(data: impl Into<Bytes>, base: u32) -> Self {
        Self {
            data: data.into(),
            base,
        }
    }

    /// Read an image file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read.
    pub fn from_file(path: &Path, base: u32) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| BridgeError::load_failed(format!("{}: {e}", path.display())))?;
        info!("Program image {}: {} bytes", path.display(), data.len());
        Ok(Self::new(data, base))
    }

    /// Words in target order: little-endian, last word zero-padded.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.data.chunks(WORD_SIZE as usize).map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
    }

    /// Number of words written by a load.
    pub fn word_count(&self) -> usize {
        self.data.len().div_ceil(WORD_SIZE as usize)
    }

    /// Byte sum, for logs.
    pub fn checksum(&self) -> u32 {
        self.data
            .iter()
            .fold(0u32, |acc, &byte| acc.wrapping_add(u32::from(byte)))
    }
}

/// Reset the debug port and check its identity.
///
/// Links without a scan chain report no identity; the check is skipped for
/// them. Returns the identity read, if any.
///
/// # Errors
///
/// Returns error if the link fails or the identity differs from `expected`.
pub fn verify_identity(access: &DeviceAccess, expected: u32) -> Result<Option<IdCode>> {
    let mut link = access.lock();
    link.reenter()?;
    let Some(raw) = link.idcode()? else {
        warn!("{} link has no debug port identity; check skipped", link.link_type());
        return Ok(None);
    };
    drop(link);

    let id = IdCode::new(raw);
    if raw != expected {
        return Err(BridgeError::IdentityMismatch {
            expected,
            actual: id,
        });
    }
    info!("Target identity {id}");
    Ok(Some(id))
}

/// Write `image` into target memory and read it back.
///
/// # Errors
///
/// Returns error if a transfer fails or a word reads back different.
pub fn load_program(access: &DeviceAccess, image: &ProgramImage) -> Result<usize> {
    debug!(
        "Loading {} words at {:#010x}, checksum {:#010x}",
        image.word_count(),
        image.base,
        image.checksum()
    );

    let addresses = (0u32..).map(|i| image.base.wrapping_add(i * WORD_SIZE));
    for (address, word) in addresses.clone().zip(image.words()) {
        access
            .write(address, word)
            .map_err(|e| BridgeError::load_failed(format!("write {address:#010x}: {e}")))?;
    }
    for (address, word) in addresses.zip(image.words()) {
        let read = access
            .read(address)
            .map_err(|e| BridgeError::load_failed(format!("read {address:#010x}: {e}")))?;
        if read != word {
            return Err(BridgeError::load_failed(format!(
                "{address:#010x} reads {read:#010x}, wrote {word:#010x}"
            )));
        }
    }

    info!("Loaded {} words at {:#010x}", image.word_count(), image.base);
    Ok(image.word_count())
}

/// Full startup: identity, debug port power-up, optional program load.
///
/// # Errors
///
/// Returns error on identity mismatch, link failure or load failure.
pub fn bring_up(
    access: &DeviceAccess,
    console: &Console,
    expected_idcode: u32,
    program: Option<&ProgramImage>,
) -> Result<()> {
    verify_identity(access, expected_idcode)?;
    access.lock().reenter()?;

    if let Some(image) = program {
        console.print(format_args!("Beginning program load.\r\n"))?;
        if let Err(e) = load_program(access, image) {
            console.print(format_args!("Load failed!\r\n"))?;
            return Err(e);
        }
        console.print(format_args!("Load succeeded.\r\n"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedTarget;
    use crate::transport::MemoryConsole;
    use std::sync::Arc;

    fn access(target: &SimulatedTarget) -> DeviceAccess {
        DeviceAccess::new(Box::new(target.clone()))
    }

    #[test]
    fn matching_identity_passes() {
        let target = SimulatedTarget::new();
        let id = verify_identity(&access(&target), 0x4BA0_0477).unwrap();
        assert_eq!(id.map(|id| id.raw()), Some(0x4BA0_0477));
        assert_eq!(target.reentries(), 1);
    }

    #[test]
    fn wrong_identity_is_reported_with_both_codes() {
        let target = SimulatedTarget::new().with_idcode(Some(0x0BA0_0477));
        let err = verify_identity(&access(&target), 0x4BA0_0477).unwrap_err();
        assert!(matches!(err, BridgeError::IdentityMismatch { .. }));
        assert!(err.to_string().contains("0BA00477"), "{err}");
    }

    #[test]
    fn missing_identity_skips_check() {
        let target = SimulatedTarget::new().with_idcode(None);
        assert!(verify_identity(&access(&target), 0x4BA0_0477)
            .unwrap()
            .is_none());
    }

    #[test]
    fn image_words_are_little_endian_and_padded() {
        let image = ProgramImage::new(&b"abcdef"[..], 0x6000_0000);
        assert_eq!(image.word_count(), 2);
        assert_eq!(
            image.words().collect::<Vec<_>>(),
            vec![u32::from_le_bytes(*b"abcd"), u32::from_le_bytes([b'e', b'f', 0, 0])]
        );
    }

    #[test]
    fn bring_up_loads_and_reports() {
        let target = SimulatedTarget::new();
        let io = MemoryConsole::new();
        let console = Console::new(Arc::new(io.clone()), 64);
        let image = ProgramImage::new(vec![1, 0, 0, 0, 2], 0x6000_0000);

        bring_up(&access(&target), &console, 0x4BA0_0477, Some(&image)).unwrap();

        assert_eq!(target.peek(0x6000_0000), 1);
        assert_eq!(target.peek(0x6000_0004), 2);
        assert_eq!(
            io.output_string(),
            "Beginning program load.\r\nLoad succeeded.\r\n"
        );
    }

    #[test]
    fn bring_up_stops_at_wrong_identity() {
        let target = SimulatedTarget::new().with_idcode(Some(0));
        let io = MemoryConsole::new();
        let console = Console::new(Arc::new(io.clone()), 64);
        let image = ProgramImage::new(vec![1; 8], 0x6000_0000);

        assert!(bring_up(&access(&target), &console, 0x4BA0_0477, Some(&image)).is_err());
        assert!(target.writes_to(0x6000_0000).is_empty());
        assert!(io.output().is_empty());
    }

    #[test]
    fn unreadable_image_file_is_a_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProgramImage::from_file(&dir.path().join("missing.bin"), 0).unwrap_err();
        assert!(matches!(err, BridgeError::LoadFailed { .. }));
    }
}
