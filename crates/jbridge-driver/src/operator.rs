//! Operator command loop
//!
//! Line oriented, read through the console's scan buffer. Only the first
//! word of a line counts: `quit` stops the bridge, `debug` wakes
//! Debug-Dump, anything else is ignored. End of input acts as `quit`.

use crate::bridge::BridgeHandle;
use crate::error::Result;

/// Prompt printed before every command.
pub const PROMPT: &str = "Type 'quit' to quit.\r\n";

/// One operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stop the bridge
    Quit,
    /// Dump both windows
    Debug,
    /// Anything else (ignored)
    Other(String),
}

impl Command {
    /// Parse a line.
    pub fn parse(line: &str) -> Self {
        match line.split_whitespace().next().unwrap_or_default() {
            "quit" => Self::Quit,
            "debug" => Self::Debug,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Why the operator loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `quit` typed
    Quit,
    /// Console input ended
    EndOfInput,
    /// The bridge stopped on its own
    Halted,
}

/// Prompt, read and act until `quit`, end of input or a halt.
///
/// # Errors
///
/// Returns error if the console fails.
pub fn run(handle: &BridgeHandle) -> Result<Exit> {
    let ctx = handle.context();
    let console = ctx.console();

    loop {
        if ctx.is_stopped() {
            return Ok(Exit::Halted);
        }
        console.print(format_args!("{PROMPT}"))?;
        let Some(line) = console.scan_line()? else {
            return Ok(if ctx.is_stopped() {
                Exit::Halted
            } else {
                Exit::EndOfInput
            });
        };
        match Command::parse(&line) {
            Command::Quit => return Ok(Exit::Quit),
            Command::Debug => {
                handle.request_debug_dump();
            }
            Command::Other(word) => tracing::debug!("Ignoring operator input '{word}'"),
        }
    }
}
