//! Bridge context
//!
//! One [`BridgeContext`] is built before the role threads start and shared
//! by reference with all of them. It owns everything the roles touch: the
//! Device Access Layer, the mailbox layout, the acknowledger, the terminal
//! and network channels and the role signals. There is no other shared
//! state.
//!
//! It is also where the bridge ends. [`BridgeContext::halt`] is the single
//! path for fatal conditions; [`BridgeContext::stop`] is the orderly one.

use crate::ack::{AckLine, Acknowledger};
use crate::buffer::ChannelBuffers;
use crate::config::BridgeConfig;
use crate::console::Console;
use crate::error::{BridgeError, Result};
use crate::link::{DeviceAccess, TargetLink};
use crate::signal::{Role, Signals};
use crate::transport::{ConsoleTransport, NetworkTransport};
use jbridge_target::TargetMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Network transport plus its print/scan buffers.
#[derive(Debug)]
pub struct NetworkChannel {
    transport: Arc<dyn NetworkTransport>,
    buffers: ChannelBuffers,
}

impl NetworkChannel {
    /// Transport.
    pub fn transport(&self) -> &dyn NetworkTransport {
        &*self.transport
    }

    /// Print/scan buffers behind their direction locks.
    pub fn buffers(&self) -> &ChannelBuffers {
        &self.buffers
    }
}

/// Whether the debug port has been re-entered since the target started
/// running on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortState {
    Uninitialized,
    Ready,
}

#[derive(Debug, Default)]
struct RunState {
    halt_reason: Option<String>,
    stopped: bool,
}

/// Shared state of one bridge.
#[derive(Debug)]
pub struct BridgeContext {
    access: DeviceAccess,
    map: TargetMap,
    acker: Acknowledger,
    console: Console,
    network: Option<NetworkChannel>,
    signals: Signals,
    buffer_size: usize,
    irq_port: Mutex<PortState>,
    run: Mutex<RunState>,
    ended: Condvar,
}

impl BridgeContext {
    /// Assemble a context. The network starts uninitialized; see
    /// [`Self::with_network`].
    pub fn new(
        link: Box<dyn TargetLink>,
        ack_line: Box<dyn AckLine>,
        console: Arc<dyn ConsoleTransport>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            access: DeviceAccess::new(link),
            map: config.map,
            acker: Acknowledger::new(config.map.ack_word, ack_line),
            console: Console::new(console, config.buffer_size),
            network: None,
            signals: Signals::new(config.wake_policy),
            buffer_size: config.buffer_size,
            irq_port: Mutex::new(PortState::Uninitialized),
            run: Mutex::new(RunState::default()),
            ended: Condvar::new(),
        }
    }

    /// Attach an initialized network transport.
    #[must_use]
    pub fn with_network(mut self, transport: Arc<dyn NetworkTransport>) -> Self {
        self.network = Some(NetworkChannel {
            transport,
            buffers: ChannelBuffers::new(self.buffer_size),
        });
        self
    }

    /// Device Access Layer.
    pub fn access(&self) -> &DeviceAccess {
        &self.access
    }

    /// Mailbox layout.
    pub fn map(&self) -> &TargetMap {
        &self.map
    }

    /// Acknowledger.
    pub fn acker(&self) -> &Acknowledger {
        &self.acker
    }

    /// Terminal channel.
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Network channel, `None` while uninitialized.
    pub fn network(&self) -> Option<&NetworkChannel> {
        self.network.as_ref()
    }

    /// Role signals.
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Interrupt entry: called once per rising edge of the request line.
    ///
    /// The first call re-enters the debug port under the Device Access
    /// Layer lock; every call sets the Dispatcher's signal. A failed
    /// re-entry halts the bridge.
    pub fn interrupt(&self) -> bool {
        if let Err(e) = self.ensure_port_ready() {
            self.halt(&e);
            return false;
        }
        self.signals.set(Role::Dispatch)
    }

    fn ensure_port_ready(&self) -> Result<()> {
        let mut port = self.irq_port.lock().unwrap_or_else(PoisonError::into_inner);
        if *port == PortState::Ready {
            return Ok(());
        }
        // Lock order: irq_port, then the Device Access Layer.
        self.access.lock().reenter()?;
        *port = PortState::Ready;
        tracing::debug!("Debug port re-entered on first interrupt");
        Ok(())
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fatal condition: report, record, stop every role.
    ///
    /// Only the first halt is reported; later ones are logged and otherwise
    /// ignored.
    pub fn halt(&self, error: &BridgeError) {
        let reason = error.to_string();
        {
            let mut run = self.run_state();
            if let Some(first) = &run.halt_reason {
                tracing::debug!("Already halted ({first}); ignoring: {reason}");
                return;
            }
            run.halt_reason = Some(reason.clone());
        }

        tracing::error!("Halting: {reason}");
        if let Err(e) = self.console.print(format_args!("{reason}\r\n")) {
            tracing::error!("Halt message not delivered to console: {e}");
        }
        self.stop();
    }

    /// Close every role signal and release blocked transport readers.
    pub fn stop(&self) {
        self.signals.close_all();
        self.console.close();
        if let Some(network) = &self.network {
            network.transport.close();
        }
        self.run_state().stopped = true;
        self.ended.notify_all();
    }

    /// Reason of the first halt, if the bridge halted.
    pub fn halt_reason(&self) -> Option<String> {
        self.run_state().halt_reason.clone()
    }

    /// Whether [`Self::stop`] or [`Self::halt`] has run.
    pub fn is_stopped(&self) -> bool {
        self.run_state().stopped
    }

    /// Block until the bridge stops. Returns the halt error, or `None` for
    /// an orderly stop.
    pub fn wait_for_halt(&self) -> Option<BridgeError> {
        let mut run = self.run_state();
        while !run.stopped {
            run = self
                .ended
                .wait(run)
                .unwrap_or_else(PoisonError::into_inner);
        }
        run.halt_reason.clone().map(BridgeError::halted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedTarget;
    use crate::transport::MemoryConsole;

    fn context() -> (SimulatedTarget, MemoryConsole, BridgeContext) {
        let target = SimulatedTarget::new();
        let console = MemoryConsole::new();
        let ctx = BridgeContext::new(
            Box::new(target.clone()),
            Box::new(target.clone()),
            Arc::new(console.clone()),
            &BridgeConfig::default(),
        );
        (target, console, ctx)
    }

    #[test]
    fn first_interrupt_reenters_once() {
        let (target, _, ctx) = context();
        assert!(ctx.interrupt());
        ctx.signals().get(Role::Dispatch).try_wait();
        assert!(ctx.interrupt());
        assert_eq!(target.reentries(), 1);
    }

    #[test]
    fn later_interrupts_skip_the_device_lock() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (_, _, ctx) = context();
        assert!(ctx.interrupt());

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();
        std::thread::scope(|s| {
            let (ctx, locked_tx) = (&ctx, &locked_tx);
            s.spawn(move || {
                let _link = ctx.access().lock();
                locked_tx.send(()).unwrap();
                let _ = release_rx.recv();
            });
            locked_rx.recv().unwrap();
            s.spawn(|| done_tx.send(ctx.interrupt()).unwrap());

            let done = done_rx.recv_timeout(Duration::from_secs(1));
            release_tx.send(()).unwrap();
            assert_eq!(done, Ok(true));
        });
    }

    #[test]
    fn interrupt_sets_only_dispatch() {
        let (_, _, ctx) = context();
        ctx.interrupt();
        assert_eq!(ctx.signals().snapshot(), [1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn failed_reentry_halts() {
        let (target, console, ctx) = context();
        target.set_responsive(false);
        assert!(!ctx.interrupt());
        assert!(ctx.is_stopped());
        assert!(ctx.halt_reason().unwrap().contains("not responding"));
        assert!(console.output_string().contains("not responding"));
    }

    #[test]
    fn first_halt_wins() {
        let (_, console, ctx) = context();
        ctx.halt(&BridgeError::transport_failed("send"));
        ctx.halt(&BridgeError::link_failed("later"));
        assert!(ctx.halt_reason().unwrap().contains("send"));
        assert!(!console.output_string().contains("later"));
        assert!(matches!(ctx.wait_for_halt(), Some(BridgeError::Halted { .. })));
        assert!(ctx.signals().get(Role::TerminalWrite).is_closed());
    }

    #[test]
    fn orderly_stop_is_not_a_halt() {
        let (_, _, ctx) = context();
        ctx.stop();
        assert!(ctx.wait_for_halt().is_none());
    }
}
