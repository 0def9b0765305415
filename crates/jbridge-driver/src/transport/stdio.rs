//! Process stdin/stdout as the console.

use super::{retry_interrupted, ConsoleTransport};
use crate::error::Result;
use std::io::{Read, Write};

/// Console over the process's standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioConsole;

impl ConsoleTransport for StdioConsole {
    fn read_byte(&self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let mut stdin = std::io::stdin().lock();
        match retry_interrupted(|| stdin.read(&mut byte))? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()?;
        Ok(())
    }
}
