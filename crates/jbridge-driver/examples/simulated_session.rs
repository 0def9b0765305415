//! Simulated bridge session
//!
//! Runs a bridge against an in-process target and in-memory transports:
//! the target prints, scans a line, sends a datagram and receives one.

use jbridge_driver::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("jbridge_driver=debug")
        .init();

    println!("🔌 JTAG bridge simulated session\n");

    let config = BridgeConfig::default();
    let map = config.map;
    let peer = config.network.peer;

    let target = SimulatedTarget::new();
    let console = MemoryConsole::new();
    let network = MemoryNetwork::new(peer);

    let ctx = BridgeContext::new(
        Box::new(target.clone()),
        Box::new(target.clone()),
        Arc::new(console.clone()),
        &config,
    )
    .with_network(Arc::new(network.clone()));

    startup::bring_up(ctx.access(), ctx.console(), config.expected_idcode, None)?;
    let bridge = Bridge::start(ctx)?;
    let timeout = Duration::from_secs(2);

    // Terminal print
    target.stage_text(map.outbound, b"Hello from the target\r\n");
    target.post_request(&map, 0);
    bridge.interrupt();
    target.wait_for_pulses(1, timeout);

    // Terminal scan
    console.type_input(b"42\r");
    target.post_request(&map, 1);
    bridge.interrupt();
    target.wait_for_pulses(2, timeout);
    println!(
        "📥 Target received: {:?}",
        String::from_utf8_lossy(&target.read_text(map.inbound))
    );

    // Network print, then network scan
    target.stage_text(map.outbound, b"ping");
    target.post_request(&map, 2);
    bridge.interrupt();
    network.wait_for_sent(1, timeout);
    target.wait_for_pulses(3, timeout);

    network.deliver(peer, &b"pong"[..]);
    target.post_request(&map, 3);
    bridge.interrupt();
    target.wait_for_pulses(4, timeout);

    println!("📤 Datagrams sent: {:?}", network.sent());
    println!(
        "📥 Target received: {:?}",
        String::from_utf8_lossy(&target.read_text(map.inbound))
    );
    println!("\n🖥️  Console:\n{}", console.output_string());

    bridge.shutdown()?;
    println!("✅ {} acknowledgments", target.ack_pulses());
    Ok(())
}
