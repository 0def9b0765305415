//! Memory-mapped target link
//!
//! Some debug adapters expose the target's address space as a device file
//! (a UIO region, `/dev/mem` behind a bus bridge, a file-backed model in
//! tests). `MappedLink` maps that file once and turns word transfers into
//! bounds-checked volatile loads and stores.
//!
//! Minimal unsafe: only the `mmap` call and the two volatile accesses, each
//! guarded by the bounds check in [`MappedLink::offset_of`].

use crate::error::{BridgeError, Result};
use crate::link::{LinkType, TargetLink};
use jbridge_target::WORD_SIZE;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Target memory mapped from a device file
#[derive(Debug)]
pub struct MappedLink {
    ptr: NonNull<u8>,
    size: usize,
    base: u32,
    _file: File,
}

// SAFETY: Send - MappedLink owns the mapping exclusively; the mapping is
// process-wide, so moving the owner to another thread does not invalidate it.
// Concurrent access is serialized by `DeviceAccess`, which owns the link.
unsafe impl Send for MappedLink {}

impl MappedLink {
    /// Map `size` bytes of `path`, treating byte 0 as target address `base`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `base` or `size` is not word aligned, or the range wraps the
    ///   32-bit address space
    /// - The file cannot be opened or is shorter than `size`
    /// - mmap fails
    pub fn open(path: &Path, base: u32, size: usize) -> Result<Self> {
        let word = WORD_SIZE as usize;
        if base % WORD_SIZE != 0 || size % word != 0 || size == 0 {
            return Err(BridgeError::invalid_config(format!(
                "mapped range {base:#x}+{size:#x} must be non-empty and word aligned"
            )));
        }
        if u64::from(base) + size as u64 > 1 << 32 {
            return Err(BridgeError::invalid_config(format!(
                "mapped range {base:#x}+{size:#x} exceeds the 32-bit target address space"
            )));
        }

        tracing::debug!("Mapping target memory: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| BridgeError::link_failed(format!("Cannot open {}: {e}", path.display())))?;

        let file_len = file
            .metadata()
            .map_err(|e| BridgeError::link_failed(format!("Cannot stat {}: {e}", path.display())))?
            .len();
        // Character devices report 0; only regular files can be checked.
        if file_len != 0 && file_len < size as u64 {
            return Err(BridgeError::link_failed(format!(
                "{} is {file_len} bytes, need {size}",
                path.display()
            )));
        }

        // SAFETY: mmap preconditions:
        // - file descriptor is valid (just opened, kept alive in `_file`)
        // - size is non-zero (checked above)
        // - PROT_READ|PROT_WRITE with MAP_SHARED so stores reach the target
        // - offset 0
        // - unmapped exactly once in Drop
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| BridgeError::link_failed(format!("mmap {} failed: {e}", path.display())))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| BridgeError::link_failed("mmap returned a null mapping"))?;

        tracing::info!(
            "Mapped target {base:#010x}..{:#010x} from {}",
            u64::from(base) + size as u64,
            path.display()
        );

        Ok(Self {
            ptr,
            size,
            base,
            _file: file,
        })
    }

    /// First mapped target address
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Mapped length in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    fn offset_of(&self, address: u32) -> Result<usize> {
        #[allow(clippy::cast_possible_truncation)]
        let end = self.base.wrapping_add(self.size as u32);
        let out_of_range = || BridgeError::AddressOutOfRange {
            address,
            begin: self.base,
            end,
        };
        if address % WORD_SIZE != 0 {
            return Err(out_of_range());
        }
        let offset = address.checked_sub(self.base).ok_or_else(out_of_range)? as usize;
        if offset + WORD_SIZE as usize > self.size {
            return Err(out_of_range());
        }
        Ok(offset)
    }
}

impl TargetLink for MappedLink {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        let offset = self.offset_of(address)?;
        // SAFETY: offset + 4 <= size (offset_of), ptr valid for size bytes,
        // offset word aligned and the mapping page aligned, so the u32 is
        // aligned. Volatile: the target may change memory under us.
        #[allow(clippy::cast_ptr_alignment)]
        let word = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        Ok(u32::from_le(word))
    }

    fn write_word(&mut self, address: u32, word: u32) -> Result<()> {
        let offset = self.offset_of(address)?;
        // SAFETY: same bounds and alignment argument as read_word. Volatile:
        // the store must reach target memory, not be elided or reordered.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(word.to_le());
        }
        Ok(())
    }

    fn idcode(&mut self) -> Result<Option<u32>> {
        // A memory mapping has no scan chain to identify.
        Ok(None)
    }

    fn link_type(&self) -> LinkType {
        LinkType::Mapped
    }
}

impl Drop for MappedLink {
    fn drop(&mut self) {
        // SAFETY: ptr/size are exactly what mmap returned; Drop runs once and
        // no references into the mapping outlive self.
        unsafe {
            let _ = munmap(self.ptr.as_ptr().cast(), self.size);
        }
        tracing::debug!("Unmapped target memory at {:#010x}", self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing_file(len: u64) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(len).unwrap();
        file
    }

    #[test]
    fn words_land_in_the_file_little_endian() {
        let file = backing_file(64);
        let mut link = MappedLink::open(file.path(), 0x6000_1000, 64).unwrap();

        link.write_word(0x6000_1004, u32::from_le_bytes(*b"wxyz")).unwrap();
        assert_eq!(link.read_word(0x6000_1004).unwrap(), u32::from_le_bytes(*b"wxyz"));
        drop(link);

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(&bytes[4..8], b"wxyz");
    }

    #[test]
    fn out_of_range_and_misaligned_addresses_rejected() {
        let file = backing_file(16);
        let mut link = MappedLink::open(file.path(), 0x100, 16).unwrap();

        assert!(matches!(
            link.read_word(0xfc),
            Err(BridgeError::AddressOutOfRange { .. })
        ));
        assert!(link.read_word(0x110).is_err());
        assert!(link.write_word(0x102, 0).is_err());
        assert!(link.read_word(0x10c).is_ok());
        assert_eq!(link.idcode().unwrap(), None);
    }

    #[test]
    fn short_file_rejected() {
        let file = backing_file(8);
        assert!(MappedLink::open(file.path(), 0x100, 16).is_err());
        assert!(MappedLink::open(file.path(), 0x102, 8).is_err());
    }
}
