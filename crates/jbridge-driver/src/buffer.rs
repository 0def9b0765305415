//! Text Buffers and Channel Locks
//!
//! A [`TextBuffer`] is a fixed-capacity, null-terminated byte array. Each
//! channel family (terminal, network) owns one per direction, and each sits
//! behind its own direction lock in [`ChannelBuffers`]. A buffer cannot be
//! reached without holding its lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default Text Buffer capacity in bytes, terminator included.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Fixed-capacity, null-terminated byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    bytes: Box<[u8]>,
}

impl TextBuffer {
    /// Zeroed buffer of `capacity` bytes (at least one, for the terminator).
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity.max(1)].into_boxed_slice(),
        }
    }

    /// Total size, terminator included.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Longest text the buffer can hold.
    pub fn text_capacity(&self) -> usize {
        self.bytes.len() - 1
    }

    /// Contents up to the first null byte (or the whole buffer).
    pub fn text(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    /// Replace the contents with `src`, truncated to [`Self::text_capacity`]
    /// and terminated. Returns the number of bytes kept.
    pub fn set_text(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.text_capacity());
        self.bytes[..n].copy_from_slice(&src[..n]);
        self.bytes[n] = 0;
        n
    }

    /// Raw storage, for transports that fill the buffer in place.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Raw storage.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Place the terminator after the first `len` bytes, clamped to
    /// [`Self::text_capacity`].
    pub fn terminate(&mut self, len: usize) {
        let at = len.min(self.text_capacity());
        self.bytes[at] = 0;
    }

    /// Empty the buffer.
    pub fn clear(&mut self) {
        self.bytes[0] = 0;
    }
}

/// Print and scan buffers of one channel family, each behind its
/// direction lock.
#[derive(Debug)]
pub struct ChannelBuffers {
    print: Mutex<TextBuffer>,
    scan: Mutex<TextBuffer>,
}

impl ChannelBuffers {
    /// Allocate both buffers once; they are reused for every request.
    pub fn new(capacity: usize) -> Self {
        Self {
            print: Mutex::new(TextBuffer::new(capacity)),
            scan: Mutex::new(TextBuffer::new(capacity)),
        }
    }

    /// Take the write-direction lock.
    pub fn print(&self) -> MutexGuard<'_, TextBuffer> {
        self.print.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the read-direction lock.
    pub fn scan(&self) -> MutexGuard<'_, TextBuffer> {
        self.scan.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_text_truncates_and_terminates() {
        let mut buf = TextBuffer::new(6);
        assert_eq!(buf.set_text(b"hello world"), 5);
        assert_eq!(buf.text(), b"hello");
        assert_eq!(buf.as_bytes()[5], 0);

        assert_eq!(buf.set_text(b"hi"), 2);
        assert_eq!(buf.text(), b"hi");
    }

    #[test]
    fn terminate_clamps_to_capacity() {
        let mut buf = TextBuffer::new(4);
        buf.as_mut_bytes().copy_from_slice(b"abcd");
        assert_eq!(buf.text(), b"abcd");
        buf.terminate(10);
        assert_eq!(buf.text(), b"abc");
        buf.clear();
        assert!(buf.text().is_empty());
    }

    #[test]
    fn zero_capacity_still_holds_terminator() {
        let buf = TextBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.text_capacity(), 0);
    }

    #[test]
    fn directions_lock_independently() {
        let channel = ChannelBuffers::new(8);
        let mut print = channel.print();
        let mut scan = channel.scan();
        print.set_text(b"out");
        scan.set_text(b"in");
        drop((print, scan));
        assert_eq!(channel.print().text(), b"out");
        assert_eq!(channel.scan().text(), b"in");
    }
}
