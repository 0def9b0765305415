//! Request Dispatcher
//!
//! ```text
//! WaitForInterrupt ──wake──▶ ReadStatus ──▶ Route ──▶ WaitForInterrupt
//! ```
//!
//! The dispatcher reads one Status word per wake-up and sets exactly one
//! worker's signal. It never moves payload data and never waits for the
//! worker it woke. Unknown requests are reported and dropped: no signal, no
//! acknowledgment.

use crate::context::BridgeContext;
use crate::error::Result;
use crate::signal::Role;
use jbridge_target::Request;
use tracing::{debug, warn};

/// Worker role that services `request`; `None` for unknown requests.
///
/// A fault's message is staged in the Outbound window like any print, so
/// it takes the Terminal-Write path.
pub const fn route(request: Request) -> Option<Role> {
    match request {
        Request::TerminalPrint | Request::Fault => Some(Role::TerminalWrite),
        Request::TerminalScan => Some(Role::TerminalRead),
        Request::NetworkPrint => Some(Role::NetworkWrite),
        Request::NetworkScan => Some(Role::NetworkRead),
        Request::Unknown(_) => None,
    }
}

/// Read the Status word and wake its worker. Returns the role woken.
///
/// # Errors
///
/// Returns error if the Status word cannot be read or the Unsupported
/// diagnostic cannot be written.
pub fn dispatch_once(ctx: &BridgeContext) -> Result<Option<Role>> {
    let status = ctx.access().read(ctx.map().status_word)?;
    let request = Request::from_status(status);

    match route(request) {
        Some(role) => {
            debug!("{request} -> {role}");
            ctx.signals().set(role);
            Ok(Some(role))
        }
        None => {
            warn!("Unsupported request: {status:08x}");
            ctx.console()
                .print(format_args!("Unsupported request: {status:08x}\r\n"))?;
            Ok(None)
        }
    }
}

/// Dispatcher thread body. Returns when its signal is closed or on halt.
pub fn run(ctx: &BridgeContext) {
    let signal = ctx.signals().get(Role::Dispatch);
    while signal.wait() {
        if let Err(e) = dispatch_once(ctx) {
            ctx.halt(&e);
            break;
        }
    }
    debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedTarget;
    use crate::config::BridgeConfig;
    use crate::transport::MemoryConsole;
    use std::sync::Arc;

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
    fn each_known_request_wakes_exactly_one_role() {
        let cases = [
            (0, Role::TerminalWrite),
            (1, Role::TerminalRead),
            (2, Role::NetworkWrite),
            (3, Role::NetworkRead),
            (15, Role::TerminalWrite),
        ];
        for (status, expected) in cases {
            let (target, console, ctx) = context();
            target.post_request(ctx.map(), status);

            assert_eq!(dispatch_once(&ctx).unwrap(), Some(expected));

            for role in Role::ALL {
                let want = usize::from(role == expected);
                assert_eq!(
                    ctx.signals().get(role).pending_count(),
                    want,
                    "status {status}, role {role}"
                );
            }
            assert!(console.output().is_empty());
        }
    }

    #[test]
    fn unknown_requests_set_nothing_and_report_once() {
        for status in [4, 14, 16, 99, u32::MAX] {
            let (target, console, ctx) = context();
            target.post_request(ctx.map(), status);

            assert_eq!(dispatch_once(&ctx).unwrap(), None);
            assert_eq!(ctx.signals().snapshot(), [0; 6]);
            assert_eq!(
                console.output_string(),
                format!("Unsupported request: {status:08x}\r\n")
            );
            assert_eq!(target.ack_pulses(), 0);
        }
    }

    #[test]
    fn dispatcher_never_acknowledges() {
        let (target, _, ctx) = context();
        target.post_request(ctx.map(), 0);
        dispatch_once(&ctx).unwrap();
        assert!(target.writes_to(ctx.map().ack_word).is_empty());
    }

    #[test]
    fn status_read_failure_halts() {
        let (target, _, ctx) = context();
        target.set_responsive(false);
        ctx.signals().set(Role::Dispatch);
        run(&ctx);
        assert!(ctx.halt_reason().is_some());
    }
}
