//! Worker Channels
//!
//! Each I/O role runs the same loop:
//!
//! ```text
//! WaitForOwnSignal → lock direction buffer → codec + transport → unlock
//!                  → ack word + ack pulse → WaitForOwnSignal
//! ```
//!
//! A cycle ends in one of four ways:
//!
//! | Outcome | Ack | Bridge |
//! |---------|-----|--------|
//! | `Ok(kind)` | word + pulse | continues |
//! | `ServiceError::Transient` (nothing received) | none | continues |
//! | `ServiceError::PreconditionUnmet` (network uninitialized) | none | continues |
//! | `ServiceError::Fatal` | none | halts |

use crate::codec;
use crate::context::BridgeContext;
use crate::error::ServiceError;
use crate::signal::Role;
use jbridge_target::AckKind;
use tracing::debug;

/// Result of one worker cycle.
pub type Cycle = std::result::Result<AckKind, ServiceError>;

/// Print the Outbound window on the console.
///
/// # Errors
///
/// Fatal if the window read or the console write fails.
pub fn terminal_write(ctx: &BridgeContext) -> Cycle {
    let console = ctx.console();
    let mut buf = console.print_buffer();
    let len = codec::encode(ctx.access(), ctx.map().outbound, &mut buf)?;
    console.send(&buf)?;
    debug!("Printed {len} bytes");
    Ok(AckKind::Print)
}

/// Read one console line into the Inbound window.
///
/// End of input counts as an empty line.
///
/// # Errors
///
/// Fatal if the console read or the window write fails.
pub fn terminal_read(ctx: &BridgeContext) -> Cycle {
    let console = ctx.console();
    let mut buf = console.scan_buffer();
    if console.read_line(&mut buf)?.is_none() {
        debug!("Console input ended; answering with an empty line");
    }
    let len = codec::decode(ctx.access(), buf.text(), ctx.map().inbound)?;
    debug!("Scanned {len} bytes");
    Ok(AckKind::Scan)
}

/// Send the Outbound window's text as one datagram.
///
/// # Errors
///
/// `PreconditionUnmet` if the network is uninitialized; fatal if the
/// window read or the send fails.
pub fn network_write(ctx: &BridgeContext) -> Cycle {
    let network = ctx
        .network()
        .ok_or(ServiceError::PreconditionUnmet("network transport not initialized"))?;
    let mut buf = network.buffers().print();
    codec::encode(ctx.access(), ctx.map().outbound, &mut buf)?;
    let sent = network.transport().send(buf.text())?;
    debug!("Sent {sent} bytes to {}", network.transport().peer());
    Ok(AckKind::Print)
}

/// Receive one datagram into the Inbound window.
///
/// # Errors
///
/// `PreconditionUnmet` if the network is uninitialized; `Transient` if
/// nothing was received; fatal if the receive or the window write fails.
pub fn network_read(ctx: &BridgeContext) -> Cycle {
    let network = ctx
        .network()
        .ok_or(ServiceError::PreconditionUnmet("network transport not initialized"))?;
    let mut buf = network.buffers().scan();
    let limit = buf.text_capacity();
    let (from, received) = network
        .transport()
        .receive(&mut buf.as_mut_bytes()[..limit])?;
    if received == 0 {
        return Err(ServiceError::Transient);
    }
    buf.terminate(received);
    let len = codec::decode(ctx.access(), buf.text(), ctx.map().inbound)?;
    debug!("Received {received} bytes from {from}, {len} to target");
    Ok(AckKind::Scan)
}

/// Cycle function of an I/O role.
///
/// `None` for the Dispatcher and Debug-Dump, which have their own loops.
pub fn cycle_for(role: Role) -> Option<fn(&BridgeContext) -> Cycle> {
    match role {
        Role::TerminalWrite => Some(terminal_write),
        Role::TerminalRead => Some(terminal_read),
        Role::NetworkWrite => Some(network_write),
        Role::NetworkRead => Some(network_read),
        Role::Dispatch | Role::DebugDump => None,
    }
}

/// Run one cycle and settle its outcome. Returns `false` if the bridge
/// halted.
pub fn service(ctx: &BridgeContext, role: Role, cycle: fn(&BridgeContext) -> Cycle) -> bool {
    match cycle(ctx) {
        Ok(kind) => {
            if let Err(e) = ctx.acker().acknowledge(ctx.access(), kind) {
                ctx.halt(&e);
                return false;
            }
            true
        }
        Err(ServiceError::Transient) => {
            debug!("{role}: nothing received, no ack");
            true
        }
        Err(ServiceError::PreconditionUnmet(why)) => {
            debug!("{role}: request dropped, {why}");
            true
        }
        Err(ServiceError::Fatal(e)) => {
            ctx.halt(&e);
            false
        }
    }
}

/// Worker thread body. Returns when its signal is closed or on halt.
pub fn run(ctx: &BridgeContext, role: Role, cycle: fn(&BridgeContext) -> Cycle) {
    let signal = ctx.signals().get(role);
    while signal.wait() {
        if !service(ctx, role, cycle) {
            break;
        }
    }
    debug!("{role} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{SimulatedTarget, TargetEvent};
    use crate::config::BridgeConfig;
    use crate::error::BridgeError;
    use crate::transport::{MemoryConsole, MemoryNetwork};
    use bytes::Bytes;
    use std::net::SocketAddr;
    use std::sync::Arc;

    struct Rig {
        target: SimulatedTarget,
        console: MemoryConsole,
        network: MemoryNetwork,
        ctx: BridgeContext,
    }

    fn peer() -> SocketAddr {
        "192.168.1.128:7".parse().unwrap()
    }

    fn rig(with_network: bool) -> Rig {
        let target = SimulatedTarget::new();
        let console = MemoryConsole::new();
        let network = MemoryNetwork::new(peer());
        let mut ctx = BridgeContext::new(
            Box::new(target.clone()),
            Box::new(target.clone()),
            Arc::new(console.clone()),
            &BridgeConfig::default().with_buffer_size(32),
        );
        if with_network {
            ctx = ctx.with_network(Arc::new(network.clone()));
        }
        Rig {
            target,
            console,
            network,
            ctx,
        }
    }

    fn ack_events(rig: &Rig, kind: AckKind) -> Vec<TargetEvent> {
        vec![
            TargetEvent::Write {
                address: rig.ctx.map().ack_word,
                word: kind.word(),
            },
            TargetEvent::AckLevel(true),
            TargetEvent::AckLevel(false),
        ]
    }

    fn non_read_events(rig: &Rig) -> Vec<TargetEvent> {
        rig.target
            .events()
            .into_iter()
            .filter(|e| !matches!(e, TargetEvent::Read { .. }))
            .collect()
    }

    #[test]
    fn terminal_write_prints_and_acks() {
        let rig = rig(false);
        rig.target.stage_text(rig.ctx.map().outbound, b"hello");

        assert!(service(&rig.ctx, Role::TerminalWrite, terminal_write));
        assert_eq!(rig.console.output(), b"hello");
        assert_eq!(non_read_events(&rig), ack_events(&rig, AckKind::Print));
    }

    #[test]
    fn terminal_write_output_bounded_by_buffer() {
        let rig = rig(false);
        rig.target.fill(rig.ctx.map().outbound, u32::from_le_bytes(*b"abcd"));

        assert!(service(&rig.ctx, Role::TerminalWrite, terminal_write));
        assert_eq!(rig.console.output().len(), 31);
    }

    #[test]
    fn terminal_read_decodes_line_and_acks() {
        let rig = rig(false);
        rig.console.type_input(b"world\r");

        assert!(service(&rig.ctx, Role::TerminalRead, terminal_read));
        assert_eq!(rig.target.read_text(rig.ctx.map().inbound), b"world");
        assert_eq!(rig.target.ack_pulses(), 1);
        assert_eq!(rig.target.writes_to(rig.ctx.map().ack_word), vec![1]);
    }

    #[test]
    fn terminal_read_at_end_of_input_sends_empty_line() {
        let rig = rig(false);
        rig.console.end_input();
        assert!(service(&rig.ctx, Role::TerminalRead, terminal_read));
        assert_eq!(rig.target.peek(rig.ctx.map().inbound.begin()), 0);
        assert_eq!(rig.target.ack_pulses(), 1);
    }

    #[test]
    fn network_write_sends_text_only() {
        let rig = rig(true);
        rig.target.stage_text(rig.ctx.map().outbound, b"ping");

        assert!(service(&rig.ctx, Role::NetworkWrite, network_write));
        assert_eq!(rig.network.sent(), vec![Bytes::from_static(b"ping")]);
        assert_eq!(non_read_events(&rig), ack_events(&rig, AckKind::Print));
    }

    #[test]
    fn uninitialized_network_is_skipped_silently() {
        let rig = rig(false);
        assert!(matches!(
            network_write(&rig.ctx),
            Err(ServiceError::PreconditionUnmet(_))
        ));
        assert!(service(&rig.ctx, Role::NetworkWrite, network_write));
        assert!(service(&rig.ctx, Role::NetworkRead, network_read));
        assert!(rig.target.events().is_empty());
        assert!(rig.console.output().is_empty());
        assert!(rig.ctx.halt_reason().is_none());
    }

    #[test]
    fn failed_send_halts_without_ack() {
        let rig = rig(true);
        rig.network.set_failing(true);

        assert!(!service(&rig.ctx, Role::NetworkWrite, network_write));
        assert_eq!(rig.target.ack_pulses(), 0);
        assert!(rig.target.writes_to(rig.ctx.map().ack_word).is_empty());
        assert!(rig.ctx.halt_reason().unwrap().contains("refused"));
    }

    #[test]
    fn network_read_bounds_payload_and_acks() {
        let rig = rig(true);
        rig.network.deliver(peer(), vec![b'x'; 100]);

        assert!(service(&rig.ctx, Role::NetworkRead, network_read));
        assert_eq!(rig.target.read_text(rig.ctx.map().inbound), vec![b'x'; 31]);
        assert_eq!(rig.target.writes_to(rig.ctx.map().ack_word), vec![1]);
    }

    #[test]
    fn empty_receive_is_transient() {
        let rig = rig(true);
        rig.network.deliver(peer(), Bytes::new());

        assert!(matches!(network_read(&rig.ctx), Err(ServiceError::Transient)));
        assert_eq!(rig.target.ack_pulses(), 0);
        assert!(rig.ctx.halt_reason().is_none());
    }

    #[test]
    fn link_failure_halts() {
        let rig = rig(false);
        rig.target.set_responsive(false);
        assert!(!service(&rig.ctx, Role::TerminalWrite, terminal_write));
        assert!(matches!(
            rig.ctx.wait_for_halt(),
            Some(BridgeError::Halted { .. })
        ));
    }

    #[test]
    fn only_io_roles_have_cycles() {
        assert!(cycle_for(Role::Dispatch).is_none());
        assert!(cycle_for(Role::DebugDump).is_none());
        assert!(cycle_for(Role::NetworkRead).is_some());
    }
}
