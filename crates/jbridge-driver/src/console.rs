//! Host side of the console
//!
//! [`Console`] owns the terminal channel: the console transport plus the
//! terminal print and scan [`TextBuffer`]s, each behind its direction lock.
//! The Terminal-Write and Terminal-Read workers use it with text staged by
//! the target; host diagnostics, the debug dump and the operator prompt use
//! [`Console::print`] and [`Console::scan_line`] through the same buffers
//! and locks, so target output and host output never interleave mid-line.

use crate::buffer::{ChannelBuffers, TextBuffer};
use crate::error::Result;
use crate::transport::ConsoleTransport;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};

/// Terminal channel: transport plus print/scan buffers.
#[derive(Debug)]
pub struct Console {
    transport: Arc<dyn ConsoleTransport>,
    buffers: ChannelBuffers,
    // A '\n' right after a '\r' belongs to the previous line.
    after_cr: AtomicBool,
}

impl Console {
    /// Console over `transport` with buffers of `capacity` bytes.
    pub fn new(transport: Arc<dyn ConsoleTransport>, capacity: usize) -> Self {
        Self {
            transport,
            buffers: ChannelBuffers::new(capacity),
            after_cr: AtomicBool::new(false),
        }
    }

    /// Take the write-direction lock.
    pub fn print_buffer(&self) -> MutexGuard<'_, TextBuffer> {
        self.buffers.print()
    }

    /// Take the read-direction lock.
    pub fn scan_buffer(&self) -> MutexGuard<'_, TextBuffer> {
        self.buffers.scan()
    }

    /// Stream `buf` to the transport, up to its first null byte.
    ///
    /// # Errors
    ///
    /// Returns error if the transport write fails.
    pub fn send(&self, buf: &TextBuffer) -> Result<usize> {
        let text = buf.text();
        self.transport.write_all(text)?;
        Ok(text.len())
    }

    /// Read one line into `buf`.
    ///
    /// A line ends at `'\r'` or `'\n'` (a `"\r\n"` pair counts once), or when
    /// `buf` holds `capacity - 1` bytes. The terminator is not stored; `buf`
    /// is always terminated. Returns `None` if input ended before any byte
    /// was read.
    ///
    /// # Errors
    ///
    /// Returns error if the transport read fails.
    pub fn read_line(&self, buf: &mut TextBuffer) -> Result<Option<usize>> {
        let limit = buf.text_capacity();
        let mut len = 0;
        let mut saw_input = false;

        while len < limit {
            let Some(byte) = self.transport.read_byte()? else {
                break;
            };
            saw_input = true;
            let after_cr = self.after_cr.swap(byte == b'\r', Ordering::Relaxed);
            match byte {
                b'\n' if after_cr && len == 0 => saw_input = false,
                b'\r' | b'\n' => break,
                _ => {
                    buf.as_mut_bytes()[len] = byte;
                    len += 1;
                }
            }
        }

        buf.terminate(len);
        Ok(saw_input.then_some(len))
    }

    /// Format into the print buffer (truncated to its text capacity) and
    /// stream it. Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns error if the transport write fails.
    pub fn print(&self, args: fmt::Arguments<'_>) -> Result<usize> {
        let text = fmt::format(args);
        let mut buf = self.print_buffer();
        buf.set_text(text.as_bytes());
        self.send(&buf)
    }

    /// Read one line through the scan buffer. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns error if the transport read fails.
    pub fn scan_line(&self) -> Result<Option<String>> {
        let mut buf = self.scan_buffer();
        Ok(self
            .read_line(&mut buf)?
            .map(|_| String::from_utf8_lossy(buf.text()).into_owned()))
    }

    /// Release a reader blocked on the transport.
    pub fn close(&self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryConsole;

    fn console(capacity: usize) -> (MemoryConsole, Console) {
        let io = MemoryConsole::new();
        (io.clone(), Console::new(Arc::new(io), capacity))
    }

    #[test]
    fn print_truncates_like_a_bounded_formatter() {
        let (io, console) = console(8);
        assert_eq!(console.print(format_args!("{:08x}\r\n", 0xdead_beef_u32)).unwrap(), 7);
        assert_eq!(io.output(), b"deadbee");
    }

    #[test]
    fn lines_end_at_cr_or_lf() {
        let (io, console) = console(64);
        io.type_input(b"quit\r\ndebug\nlast");
        io.end_input();
        assert_eq!(console.scan_line().unwrap().as_deref(), Some("quit"));
        assert_eq!(console.scan_line().unwrap().as_deref(), Some("debug"));
        assert_eq!(console.scan_line().unwrap().as_deref(), Some("last"));
        assert_eq!(console.scan_line().unwrap(), None);
    }

    #[test]
    fn empty_lines_are_lines() {
        let (io, console) = console(64);
        io.type_input(b"\r\r\n\n");
        io.end_input();
        assert_eq!(console.scan_line().unwrap().as_deref(), Some(""));
        assert_eq!(console.scan_line().unwrap().as_deref(), Some(""));
        assert_eq!(console.scan_line().unwrap().as_deref(), Some(""));
        assert_eq!(console.scan_line().unwrap(), None);
    }

    #[test]
    fn long_line_split_at_capacity() {
        let (io, console) = console(4);
        io.type_input(b"abcdef\n");
        let mut buf = TextBuffer::new(4);
        assert_eq!(console.read_line(&mut buf).unwrap(), Some(3));
        assert_eq!(buf.text(), b"abc");
        assert_eq!(console.read_line(&mut buf).unwrap(), Some(3));
        assert_eq!(buf.text(), b"def");
    }
}
