//! Debug-Dump worker
//!
//! Woken only by the operator. Before its first dump it re-enters the debug
//! port; the re-entry is a state transition of the dumper itself
//! (`DebugDump<Uninitialized>` to `DebugDump<Ready>`), so it cannot run
//! twice and a dump cannot run before it.

use crate::console::Console;
use crate::context::BridgeContext;
use crate::error::Result;
use crate::link::DeviceAccess;
use crate::signal::Role;
use jbridge_target::{MemoryWindow, TargetMap};
use std::marker::PhantomData;

/// Port not yet re-entered.
#[derive(Debug)]
pub struct Uninitialized;

/// Port re-entered; dumps allowed.
#[derive(Debug)]
pub struct Ready;

/// Window dumper in state `S`.
#[derive(Debug)]
pub struct DebugDump<S> {
    state: PhantomData<S>,
}

impl DebugDump<Uninitialized> {
    /// Fresh dumper.
    pub const fn new() -> Self {
        Self { state: PhantomData }
    }

    /// Re-enter the debug port under the Device Access Layer lock.
    ///
    /// # Errors
    ///
    /// Returns error if the re-entry sequence fails.
    pub fn enter(self, access: &DeviceAccess) -> Result<DebugDump<Ready>> {
        access.lock().reenter()?;
        tracing::debug!("Debug port re-entered for dumping");
        Ok(DebugDump { state: PhantomData })
    }
}

impl Default for DebugDump<Uninitialized> {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugDump<Ready> {
    /// Dump both windows to the console.
    ///
    /// # Errors
    ///
    /// Returns error if a word read or a console write fails.
    pub fn dump(&self, access: &DeviceAccess, map: &TargetMap, console: &Console) -> Result<()> {
        dump_windows(access, map, console)
    }
}

/// Every word of the Outbound then the Inbound window, one `%08x` line per
/// word, a blank line between the windows.
///
/// # Errors
///
/// Returns error if a word read or a console write fails.
pub fn dump_windows(access: &DeviceAccess, map: &TargetMap, console: &Console) -> Result<()> {
    dump_window(access, map.outbound, console)?;
    console.print(format_args!("\r\n"))?;
    dump_window(access, map.inbound, console)
}

fn dump_window(access: &DeviceAccess, window: MemoryWindow, console: &Console) -> Result<()> {
    for address in window.word_addresses() {
        let word = access.read(address)?;
        console.print(format_args!("{word:08x}\r\n"))?;
    }
    Ok(())
}

/// Debug-Dump thread body. Returns when its signal is closed or on halt.
pub fn run(ctx: &BridgeContext) {
    let signal = ctx.signals().get(Role::DebugDump);
    if !signal.wait() {
        return;
    }

    let dumper = match DebugDump::new().enter(ctx.access()) {
        Ok(ready) => ready,
        Err(e) => {
            ctx.halt(&e);
            return;
        }
    };

    loop {
        if let Err(e) = dumper.dump(ctx.access(), ctx.map(), ctx.console()) {
            ctx.halt(&e);
            return;
        }
        if !signal.wait() {
            break;
        }
    }
    tracing::debug!("Debug-Dump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedTarget;
    use crate::config::BridgeConfig;
    use crate::transport::MemoryConsole;
    use std::sync::Arc;

    fn small_map() -> TargetMap {
        TargetMap {
            outbound: MemoryWindow::new(0x100, 0x108).unwrap(),
            inbound: MemoryWindow::new(0x108, 0x10c).unwrap(),
            status_word: 0x200,
            ack_word: 0x204,
        }
    }

    #[test]
    fn dump_format() {
        let target = SimulatedTarget::new();
        let io = MemoryConsole::new();
        let access = DeviceAccess::new(Box::new(target.clone()));
        let console = Console::new(Arc::new(io.clone()), 64);
        target.poke(0x100, 0x6c6c_6568);
        target.poke(0x108, 0xdead_beef);

        let dumper = DebugDump::new().enter(&access).unwrap();
        dumper.dump(&access, &small_map(), &console).unwrap();

        assert_eq!(
            io.output_string(),
            "6c6c6568\r\n00000000\r\n\r\ndeadbeef\r\n"
        );
        assert_eq!(target.reentries(), 1);
    }

    #[test]
    fn worker_reenters_once_across_dumps() {
        let target = SimulatedTarget::new();
        let io = MemoryConsole::new();
        let config = BridgeConfig::default().with_map(small_map());
        let ctx = Arc::new(BridgeContext::new(
            Box::new(target.clone()),
            Box::new(target.clone()),
            Arc::new(io.clone()),
            &config,
        ));

        let worker = {
            let ctx = ctx.clone();
            std::thread::spawn(move || run(&ctx))
        };
        for dumps in 1..=3 {
            ctx.signals().set(Role::DebugDump);
            // Three word lines of 10 bytes plus one separator line.
            assert!(io.wait_for_output_len(32 * dumps, std::time::Duration::from_secs(5)));
        }
        ctx.stop();
        worker.join().unwrap();

        assert_eq!(target.reentries(), 1);
        assert_eq!(target.ack_pulses(), 0);
    }
}
