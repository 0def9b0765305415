//! Bridge supervisor
//!
//! [`Bridge::start`] spawns one named thread per role over a shared
//! [`BridgeContext`] and returns a [`BridgeHandle`]:
//!
//! ```text
//! request line ──▶ interrupt() ──▶ dispatch ──▶ term-write │ term-read
//!                                             │ inet-write │ inet-read
//! operator "debug" ──▶ request_debug_dump() ──▶ debug-dump
//! ```
//!
//! Threads run until [`BridgeHandle::shutdown`] or until a fatal condition
//! halts the bridge.

use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::signal::Role;
use crate::{dispatch, dump, workers};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long shutdown waits for a thread blocked inside a transport.
const JOIN_GRACE: Duration = Duration::from_millis(500);

/// Entry point for starting a bridge.
#[derive(Debug)]
pub struct Bridge;

impl Bridge {
    /// Spawn the six role threads.
    ///
    /// # Errors
    ///
    /// Returns error if a thread cannot be spawned; threads already started
    /// are stopped again.
    pub fn start(ctx: BridgeContext) -> Result<BridgeHandle> {
        let ctx = Arc::new(ctx);
        let mut handle = BridgeHandle {
            ctx: ctx.clone(),
            threads: Vec::with_capacity(Role::ALL.len()),
        };

        for role in Role::ALL {
            let ctx = ctx.clone();
            let spawned = std::thread::Builder::new()
                .name(role.name().to_string())
                .spawn(move || run_role(&ctx, role));
            match spawned {
                Ok(thread) => handle.threads.push((role, thread)),
                Err(source) => {
                    handle.stop_and_join();
                    return Err(BridgeError::SpawnFailed {
                        role: role.name(),
                        source,
                    });
                }
            }
        }

        info!("Bridge started ({} role threads)", handle.threads.len());
        Ok(handle)
    }
}

fn run_role(ctx: &BridgeContext, role: Role) {
    match role {
        Role::Dispatch => dispatch::run(ctx),
        Role::DebugDump => dump::run(ctx),
        io => {
            if let Some(cycle) = workers::cycle_for(io) {
                workers::run(ctx, io, cycle);
            }
        }
    }
}

/// A running bridge.
#[derive(Debug)]
pub struct BridgeHandle {
    ctx: Arc<BridgeContext>,
    threads: Vec<(Role, JoinHandle<()>)>,
}

impl BridgeHandle {
    /// Shared context, e.g. for an interrupt source thread.
    pub fn context(&self) -> Arc<BridgeContext> {
        self.ctx.clone()
    }

    /// Deliver one request-line edge.
    pub fn interrupt(&self) -> bool {
        self.ctx.interrupt()
    }

    /// Wake Debug-Dump once.
    pub fn request_debug_dump(&self) -> bool {
        self.ctx.signals().set(Role::DebugDump)
    }

    /// Block until the bridge stops; the halt error if it halted.
    pub fn wait_for_halt(&self) -> Option<BridgeError> {
        self.ctx.wait_for_halt()
    }

    /// Reason of the first halt, if any.
    pub fn halt_reason(&self) -> Option<String> {
        self.ctx.halt_reason()
    }

    /// Stop every role and join the threads.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Halted` if the bridge had halted.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join();
        match self.ctx.halt_reason() {
            Some(reason) => Err(BridgeError::halted(reason)),
            None => Ok(()),
        }
    }

    fn stop_and_join(&mut self) {
        self.ctx.stop();
        let deadline = Instant::now() + JOIN_GRACE;

        for (role, thread) in std::mem::take(&mut self.threads) {
            while !thread.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if !thread.is_finished() {
                // Blocked in a transport that cannot be interrupted (stdin).
                warn!("{role} still blocked; leaving it behind");
                continue;
            }
            if thread.join().is_err() {
                warn!("{role} thread panicked");
            } else {
                debug!("{role} joined");
            }
        }
        info!("Bridge stopped");
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.ctx.stop();
        }
    }
}
