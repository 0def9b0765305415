//! Target memory map for the request mailbox.
//!
//! The target firmware reserves a small block of SRAM as a mailbox. It stages
//! print payloads in the Outbound window, expects scan payloads in the
//! Inbound window, writes a request code to the Status word and raises the
//! request line. The host answers through the Ack word and the ack line.
//!
//! ```text
//! Address      Size    Purpose
//! ──────────── ─────── ──────────────────────────────────────────────
//! 0x6000_1000  256 B   Outbound window (target → host, print paths)
//! 0x6000_1100  256 B   Inbound window  (host → target, scan paths)
//! 0x6000_1200  4 B     Status word     (request code, written by target)
//! 0x6000_1204  4 B     Ack word        (ack code, written by host)
//! ```
//!
//! All accesses are whole 32-bit words; the debug port cannot do anything
//! smaller. Bytes inside a word are little-endian, so byte 0 of a window is
//! the least significant byte of its first word.

/// Size of one debug-port transfer in bytes.
pub const WORD_SIZE: u32 = 4;

// ── Mailbox ──────────────────────────────────────────────────────────────────

/// First byte of the Outbound window.
pub const OUTBOUND_BEGIN: u32 = 0x6000_1000;
/// One past the last byte of the Outbound window.
pub const OUTBOUND_END: u32 = 0x6000_1100;

/// First byte of the Inbound window.
pub const INBOUND_BEGIN: u32 = 0x6000_1100;
/// One past the last byte of the Inbound window.
pub const INBOUND_END: u32 = 0x6000_1200;

/// Request code written by the target before it raises the request line.
pub const STATUS_WORD: u32 = 0x6000_1200;

/// Acknowledgment code written by the host before it pulses the ack line.
pub const ACK_WORD: u32 = 0x6000_1204;

/// Default program load address (start of target SRAM).
pub const PROGRAM_BASE: u32 = 0x6000_0000;

/// A contiguous, word-aligned range `[begin, end)` of target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryWindow {
    begin: u32,
    end: u32,
}

impl MemoryWindow {
    /// Create a window.
    ///
    /// Returns `None` if either bound is not word aligned or `end < begin`.
    #[must_use]
    pub const fn new(begin: u32, end: u32) -> Option<Self> {
        if begin % WORD_SIZE != 0 || end % WORD_SIZE != 0 || end < begin {
            return None;
        }
        Some(Self { begin, end })
    }

    /// First byte address.
    #[must_use]
    pub const fn begin(&self) -> u32 {
        self.begin
    }

    /// One past the last byte address.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Length of the window in bytes.
    #[must_use]
    pub const fn len_bytes(&self) -> usize {
        (self.end - self.begin) as usize
    }

    /// Number of words in the window.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.len_bytes() / WORD_SIZE as usize
    }

    /// Usable text capacity: the byte length minus the reserved terminator.
    #[must_use]
    pub const fn text_capacity(&self) -> usize {
        self.len_bytes().saturating_sub(1)
    }

    /// Whether `addr` lies inside the window.
    #[must_use]
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.begin && addr < self.end
    }

    /// Word addresses of the window, in ascending order.
    pub fn word_addresses(&self) -> impl Iterator<Item = u32> {
        (self.begin..self.end).step_by(WORD_SIZE as usize)
    }
}

impl std::fmt::Display for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}..{:#010x}", self.begin, self.end)
    }
}

/// Fixed addresses of one mailbox layout.
///
/// `TargetMap::default()` is the layout the target firmware is built with.
/// A different layout only makes sense together with matching firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMap {
    /// Target → host staging window.
    pub outbound: MemoryWindow,
    /// Host → target staging window.
    pub inbound: MemoryWindow,
    /// Address of the Status word.
    pub status_word: u32,
    /// Address of the Ack word.
    pub ack_word: u32,
}

impl TargetMap {
    /// The firmware's default mailbox layout.
    pub const DEFAULT: Self = Self {
        outbound: MemoryWindow {
            begin: OUTBOUND_BEGIN,
            end: OUTBOUND_END,
        },
        inbound: MemoryWindow {
            begin: INBOUND_BEGIN,
            end: INBOUND_END,
        },
        status_word: STATUS_WORD,
        ack_word: ACK_WORD,
    };
}

impl Default for TargetMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_do_not_overlap_mailbox_words() {
        let map = TargetMap::DEFAULT;
        for addr in [map.status_word, map.ack_word] {
            assert!(!map.outbound.contains(addr));
            assert!(!map.inbound.contains(addr));
        }
        assert!(map.outbound.end() <= map.inbound.begin());
    }

    #[test]
    fn window_geometry() {
        let w = MemoryWindow::new(0x100, 0x110).unwrap();
        assert_eq!(w.len_bytes(), 16);
        assert_eq!(w.word_count(), 4);
        assert_eq!(w.text_capacity(), 15);
        assert_eq!(
            w.word_addresses().collect::<Vec<_>>(),
            vec![0x100, 0x104, 0x108, 0x10c]
        );
    }

    #[test]
    fn misaligned_window_rejected() {
        assert!(MemoryWindow::new(0x101, 0x110).is_none());
        assert!(MemoryWindow::new(0x100, 0x10e).is_none());
        assert!(MemoryWindow::new(0x110, 0x100).is_none());
    }

    #[test]
    fn empty_window_has_no_text_capacity() {
        let w = MemoryWindow::new(0x100, 0x100).unwrap();
        assert_eq!(w.word_count(), 0);
        assert_eq!(w.text_capacity(), 0);
    }
}
