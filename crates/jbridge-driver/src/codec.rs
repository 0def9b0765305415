//! Shared-Buffer Codec
//!
//! Moves text between a target memory window and a host [`TextBuffer`].
//! Target text is packed four bytes per word, little-endian, and ends at the
//! first null byte.
//!
//! Each word is a separate [`DeviceAccess`] acquisition. Only one worker
//! touches a given window at a time, so the window never needs the lock for
//! the whole transfer, and the dispatcher can read the Status word between
//! any two of our words.

use crate::buffer::TextBuffer;
use crate::error::Result;
use crate::link::DeviceAccess;
use jbridge_target::{MemoryWindow, WORD_SIZE};

const WORD: usize = WORD_SIZE as usize;

/// Copy the window's text into `dest` (target to host).
///
/// Stops at the first null byte, wherever it sits within a word, or when
/// `dest` is full. `dest` is always terminated. Returns the number of bytes
/// copied.
///
/// # Errors
///
/// Returns error if a word read fails.
pub fn encode(access: &DeviceAccess, window: MemoryWindow, dest: &mut TextBuffer) -> Result<usize> {
    let limit = dest.text_capacity();
    let out = dest.as_mut_bytes();
    let mut len = 0;

    'words: for address in window.word_addresses() {
        if len == limit {
            break;
        }
        let bytes = access.read(address)?.to_le_bytes();
        for byte in bytes {
            if byte == 0 || len == limit {
                break 'words;
            }
            out[len] = byte;
            len += 1;
        }
    }

    out[len] = 0;
    tracing::trace!("encoded {len} bytes from {window}");
    Ok(len)
}

/// Copy `src` into the window (host to target).
///
/// `src` ends at its first null byte. The word in which it ends is padded
/// with zeros and is the last word written; words after it are left as they
/// were. Text that does not fit is cut at the end of the window. Returns the
/// number of bytes copied.
///
/// # Errors
///
/// Returns error if a word write fails.
pub fn decode(access: &DeviceAccess, src: &[u8], window: MemoryWindow) -> Result<usize> {
    let text = src.iter().position(|&b| b == 0).map_or(src, |end| &src[..end]);
    let mut chunks = text.chunks(WORD);
    let mut len = 0;

    for address in window.word_addresses() {
        let chunk = chunks.next().unwrap_or_default();
        let mut word = [0u8; WORD];
        word[..chunk.len()].copy_from_slice(chunk);
        access.write(address, u32::from_le_bytes(word))?;
        len += chunk.len();
        if chunk.len() < WORD {
            break;
        }
    }

    tracing::trace!("decoded {len} bytes into {window}");
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{SimulatedTarget, TargetEvent};

    fn setup(begin: u32, end: u32) -> (SimulatedTarget, DeviceAccess, MemoryWindow) {
        let target = SimulatedTarget::new();
        let access = DeviceAccess::new(Box::new(target.clone()));
        (target, access, MemoryWindow::new(begin, end).unwrap())
    }

    #[test]
    fn decode_then_encode_reproduces_text() {
        let (_, access, window) = setup(0x100, 0x120);
        for text in [&b""[..], b"a", b"abcd", b"hello", b"exactly 31 bytes of text here!!"] {
            assert_eq!(decode(&access, text, window).unwrap(), text.len());
            let mut buf = TextBuffer::new(64);
            assert_eq!(encode(&access, window, &mut buf).unwrap(), text.len());
            assert_eq!(buf.text(), text);
        }
    }

    #[test]
    fn encode_stops_mid_word() {
        let (target, access, window) = setup(0x100, 0x110);
        target.poke(0x100, u32::from_le_bytes(*b"abcd"));
        target.poke(0x104, u32::from_le_bytes([b'e', 0, b'x', b'y']));
        target.poke(0x108, u32::from_le_bytes(*b"zzzz"));

        let mut buf = TextBuffer::new(32);
        assert_eq!(encode(&access, window, &mut buf).unwrap(), 5);
        assert_eq!(buf.text(), b"abcde");
        // The word after the terminator is never read.
        assert!(!target
            .events()
            .contains(&TargetEvent::Read { address: 0x108 }));
    }

    #[test]
    fn encode_terminates_without_null_in_window() {
        let (target, access, window) = setup(0x100, 0x108);
        target.fill(window, u32::from_le_bytes(*b"ABCD"));

        let mut buf = TextBuffer::new(32);
        buf.as_mut_bytes().fill(b'#');
        assert_eq!(encode(&access, window, &mut buf).unwrap(), 8);
        assert_eq!(buf.text(), b"ABCDABCD");
        assert_eq!(buf.as_bytes()[8], 0);
    }

    #[test]
    fn encode_bounded_by_destination() {
        let (target, access, window) = setup(0x100, 0x120);
        target.fill(window, u32::from_le_bytes(*b"wxyz"));

        let mut buf = TextBuffer::new(6);
        assert_eq!(encode(&access, window, &mut buf).unwrap(), 5);
        assert_eq!(buf.text(), b"wxyzw");
    }

    #[test]
    fn decode_pads_last_word_and_leaves_the_rest() {
        let (target, access, window) = setup(0x100, 0x110);
        target.fill(window, 0xffff_ffff);

        assert_eq!(decode(&access, b"world", window).unwrap(), 5);
        assert_eq!(
            target.window_words(window),
            vec![
                u32::from_le_bytes(*b"worl"),
                u32::from_le_bytes([b'd', 0, 0, 0]),
                0xffff_ffff,
                0xffff_ffff,
            ]
        );
    }

    #[test]
    fn decode_on_word_boundary_writes_a_terminator_word() {
        let (target, access, window) = setup(0x100, 0x110);
        target.fill(window, 0xffff_ffff);

        assert_eq!(decode(&access, b"abcd", window).unwrap(), 4);
        assert_eq!(target.peek(0x104), 0);
        assert_eq!(target.peek(0x108), 0xffff_ffff);
    }

    #[test]
    fn decode_truncates_at_window_end() {
        let (target, access, window) = setup(0x100, 0x108);
        let long = b"0123456789abcdef";

        assert_eq!(decode(&access, long, window).unwrap(), 8);
        assert_eq!(target.read_text(window), b"01234567");
        for event in target.events() {
            if let TargetEvent::Write { address, .. } = event {
                assert!(window.contains(address), "wrote outside window: {address:#x}");
            }
        }
    }

    #[test]
    fn decode_ignores_bytes_after_null() {
        let (target, access, window) = setup(0x100, 0x110);
        assert_eq!(decode(&access, b"ab\0cd", window).unwrap(), 2);
        assert_eq!(target.read_text(window), b"ab");
        assert_eq!(target.writes_to(0x104), Vec::<u32>::new());
    }
}
