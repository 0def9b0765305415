//! `jbridge`: console and UDP bridge for a JTAG-attached target.
//!
//! ```text
//! USAGE:
//!   jbridge [LINK OPTIONS] run      Start the bridge and the operator loop
//!   jbridge [LINK OPTIONS] probe    Read and decode the target IDCODE
//!   jbridge [LINK OPTIONS] dump     Dump the Outbound and Inbound windows once
//!
//! LINK OPTIONS:
//!   --backend sim|mapped  --device PATH --base ADDR --size BYTES
//!   --ack-gpio PIN        --irq-gpio PIN
//! ```
//!
//! Settings not given on the command line come from `JBRIDGE_*` environment
//! variables, then from built-in defaults.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jbridge_driver::dump::DebugDump;
use jbridge_driver::operator::{self, Exit};
use jbridge_driver::prelude::*;
use jbridge_driver::{config::wake_policy, Console, Direction, NetworkConfig, SysfsGpio, Unwired};
use jbridge_target::{IdCode, NodeProfile, TargetMap};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jbridge", about = "JTAG console/UDP bridge", version)]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process simulated target (nothing attached)
    Sim,
    /// Target memory mapped from a device file
    Mapped,
}

#[derive(Args)]
struct LinkArgs {
    /// Link backend.
    #[arg(long, value_enum, default_value = "sim", global = true)]
    backend: Backend,

    /// Device file exposing target memory (mapped backend).
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// Target address of the first mapped byte.
    #[arg(long, value_parser = parse_u32, default_value = "0x60000000", global = true)]
    base: u32,

    /// Bytes to map.
    #[arg(long, default_value_t = 0x2000, global = true)]
    size: usize,

    /// Sysfs GPIO driving the ack line.
    #[arg(long, global = true)]
    ack_gpio: Option<u32>,

    /// Sysfs GPIO carrying the target's request interrupt.
    #[arg(long, global = true)]
    irq_gpio: Option<u32>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Bring the target up and bridge its requests until `quit`.
    Run(RunArgs),
    /// Read and decode the target's debug port identity.
    Probe,
    /// Print every word of both mailbox windows.
    Dump,
}

#[derive(Args)]
struct RunArgs {
    /// Leave the network transport uninitialized.
    #[arg(long)]
    no_network: bool,

    /// Node profile (0 or 1); selects the peer address.
    #[arg(long, value_parser = parse_node)]
    node: Option<NodeProfile>,

    /// Peer endpoint, overrides the node profile.
    #[arg(long)]
    peer: Option<SocketAddr>,

    /// Local endpoint to bind.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Program image to load before bridging.
    #[arg(long)]
    program: Option<PathBuf>,

    /// Text Buffer capacity in bytes.
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Pending wake-ups kept per role (1 = coalesce).
    #[arg(long)]
    wake_depth: Option<usize>,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}': {e}"))
}

fn parse_node(s: &str) -> Result<NodeProfile, String> {
    NodeProfile::parse(s).ok_or_else(|| format!("unknown node '{s}' (expected 0 or 1)"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Run(args) => cmd_run(&cli.link, args),
        Cmd::Probe => cmd_probe(&cli.link),
        Cmd::Dump => cmd_dump(&cli.link),
    }
}

/// Opened link plus the matching ack line.
struct Attached {
    link: Box<dyn TargetLink>,
    ack_line: Box<dyn AckLine>,
}

fn attach(args: &LinkArgs) -> Result<Attached> {
    let (selection, sim) = match args.backend {
        Backend::Sim => {
            let target = SimulatedTarget::new();
            (LinkSelection::Simulated(target.clone()), Some(target))
        }
        Backend::Mapped => {
            let Some(path) = args.device.clone() else {
                bail!("--backend mapped needs --device");
            };
            let selection = LinkSelection::Mapped {
                path,
                base: args.base,
                size: args.size,
            };
            (selection, None)
        }
    };
    let link = jbridge_driver::select_link(selection).context("opening target link")?;

    let ack_line: Box<dyn AckLine> = match (args.ack_gpio, sim) {
        (Some(pin), _) => Box::new(
            SysfsGpio::open(pin, Direction::Output).context("configuring ack GPIO")?,
        ),
        (None, Some(target)) => Box::new(target),
        (None, None) => {
            warn!("No --ack-gpio; the target must poll the Ack word");
            Box::new(Unwired)
        }
    };

    Ok(Attached { link, ack_line })
}

fn load_config(args: RunArgs) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::from_env().context("reading JBRIDGE_* environment")?;
    if let Some(node) = args.node {
        config = config.with_node(node);
    }
    if let Some(peer) = args.peer {
        config = config.with_peer(peer);
    }
    if let Some(bind) = args.bind {
        config = config.with_bind(bind);
    }
    if let Some(program) = args.program {
        config = config.with_program(program);
    }
    if let Some(size) = args.buffer_size {
        config = config.with_buffer_size(size);
    }
    if let Some(depth) = args.wake_depth {
        config = config.with_wake_policy(wake_policy(depth)?);
    }
    if args.no_network {
        config = config.without_network();
    }
    config.validate()?;
    Ok(config)
}

/// Address this node answers on. An unspecified bind falls back to the
/// node profile's address.
fn local_address(net: &NetworkConfig) -> IpAddr {
    if net.bind.ip().is_unspecified() {
        IpAddr::V4(net.node.local_addr())
    } else {
        net.bind.ip()
    }
}

fn cmd_run(link_args: &LinkArgs, args: RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let attached = attach(link_args)?;

    let mut ctx = BridgeContext::new(
        attached.link,
        attached.ack_line,
        Arc::new(StdioConsole),
        &config,
    );

    if config.network.enabled {
        let net = &config.network;
        match UdpTransport::bind(net.bind, net.peer) {
            Ok(transport) => {
                ctx.console()
                    .print(format_args!("Local address is {}\r\n", local_address(net)))?;
                ctx = ctx.with_network(Arc::new(transport));
            }
            Err(e) => {
                ctx.halt(&e);
                bail!("network initialization failed");
            }
        }
    } else {
        info!("Network transport left uninitialized");
    }

    let image = match &config.program {
        Some(path) => Some(ProgramImage::from_file(path, config.load_address)?),
        None => None,
    };
    if let Err(e) = startup::bring_up(
        ctx.access(),
        ctx.console(),
        config.expected_idcode,
        image.as_ref(),
    ) {
        ctx.halt(&e);
        return Err(e).context("target bring-up failed");
    }

    let bridge = Bridge::start(ctx)?;
    let shared = bridge.context();

    if let Some(pin) = link_args.irq_gpio {
        spawn_irq_source(pin, shared.clone())?;
    } else {
        warn!("No --irq-gpio; no target requests will be noticed");
    }
    spawn_halt_watcher(shared.clone())?;

    let exit = operator::run(&bridge)?;
    info!("Operator loop ended: {exit:?}");
    if exit == Exit::Halted {
        bail!("bridge halted");
    }

    shared.console().print(format_args!("Powering down\r\n"))?;
    bridge.shutdown()?;
    shared.console().print(format_args!("Done.\r\n"))?;
    Ok(())
}

/// Turn rising edges of the request GPIO into interrupts.
fn spawn_irq_source(pin: u32, ctx: Arc<BridgeContext>) -> Result<()> {
    let mut line = SysfsGpio::open(pin, Direction::RisingEdgeInput)
        .context("configuring request GPIO")?;
    std::thread::Builder::new()
        .name("irq".into())
        .spawn(move || {
            while !ctx.is_stopped() {
                if let Err(e) = line.wait_edge() {
                    ctx.halt(&e);
                    break;
                }
                ctx.interrupt();
            }
        })
        .context("spawning request line thread")?;
    Ok(())
}

/// Exit the process when the bridge halts; recovery needs a restart.
fn spawn_halt_watcher(ctx: Arc<BridgeContext>) -> Result<()> {
    std::thread::Builder::new()
        .name("halt-watch".into())
        .spawn(move || {
            if let Some(e) = ctx.wait_for_halt() {
                eprintln!("jbridge: {e}");
                std::process::exit(1);
            }
        })
        .context("spawning halt watcher")?;
    Ok(())
}

fn cmd_probe(link_args: &LinkArgs) -> Result<()> {
    let attached = attach(link_args)?;
    let access = DeviceAccess::new(attached.link);
    let mut link = access.lock();
    link.reenter()?;

    match link.idcode()? {
        Some(raw) => {
            let id = IdCode::new(raw);
            println!("IDCODE       : {id}");
            println!("Plausible    : {}", id.is_plausible());
            println!(
                "Expected     : {:08X} ({})",
                jbridge_target::idcode::EXPECTED_IDCODE,
                if raw == jbridge_target::idcode::EXPECTED_IDCODE {
                    "match"
                } else {
                    "MISMATCH"
                }
            );
        }
        None => println!("{} link has no debug port identity", link.link_type()),
    }
    Ok(())
}

fn cmd_dump(link_args: &LinkArgs) -> Result<()> {
    let attached = attach(link_args)?;
    let access = DeviceAccess::new(attached.link);
    let console = Console::new(Arc::new(StdioConsole), 64);

    DebugDump::new()
        .enter(&access)?
        .dump(&access, &TargetMap::DEFAULT, &console)?;
    Ok(())
}
