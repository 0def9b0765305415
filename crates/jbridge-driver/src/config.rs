//! Bridge configuration
//!
//! Defaults describe the deployed board pair: default mailbox layout, node 0
//! addressing, coalescing wake signals. `JBRIDGE_*` environment variables
//! overlay the defaults; command-line flags overlay both.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `JBRIDGE_NODE` | node profile (`0`/`1`), selects the peer address |
//! | `JBRIDGE_PEER` | peer endpoint (`ip:port`), overrides the profile |
//! | `JBRIDGE_BIND` | local bind endpoint (`ip:port`) |
//! | `JBRIDGE_PROGRAM` | program image loaded at startup |
//! | `JBRIDGE_BUFFER_SIZE` | Text Buffer capacity in bytes |
//! | `JBRIDGE_WAKE_DEPTH` | pending wake-ups kept per role (`1` = coalesce) |

use crate::buffer::DEFAULT_BUFFER_SIZE;
use crate::error::{BridgeError, Result};
use crate::signal::WakePolicy;
use jbridge_target::idcode::EXPECTED_IDCODE;
use jbridge_target::map::PROGRAM_BASE;
use jbridge_target::net::SERVER_PORT;
use jbridge_target::{NodeProfile, TargetMap};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;

/// Network transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Initialize the network transport at startup
    pub enabled: bool,
    /// Which side of the board pair this host is
    pub node: NodeProfile,
    /// Local endpoint bound once at startup
    pub bind: SocketAddr,
    /// Fixed peer endpoint
    pub peer: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let node = NodeProfile::default();
        Self {
            enabled: true,
            node,
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SERVER_PORT)),
            peer: node.peer_endpoint(),
        }
    }
}

/// Everything the bridge needs before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Mailbox layout of the target firmware
    pub map: TargetMap,
    /// Text Buffer capacity, terminator included
    pub buffer_size: usize,
    /// Pending wake-up accounting
    pub wake_policy: WakePolicy,
    /// Network transport settings
    pub network: NetworkConfig,
    /// Debug port identity the target must report
    pub expected_idcode: u32,
    /// Program image loaded at startup, if any
    pub program: Option<PathBuf>,
    /// Target address of the program's first word
    pub load_address: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            map: TargetMap::DEFAULT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            wake_policy: WakePolicy::Coalesce,
            network: NetworkConfig::default(),
            expected_idcode: EXPECTED_IDCODE,
            program: None,
            load_address: PROGRAM_BASE,
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with `JBRIDGE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set to a malformed value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(node) = lookup("JBRIDGE_NODE") {
            let node = NodeProfile::parse(&node).ok_or_else(|| {
                BridgeError::invalid_config(format!("JBRIDGE_NODE: unknown node '{node}'"))
            })?;
            config = config.with_node(node);
        }
        if let Some(peer) = lookup("JBRIDGE_PEER") {
            config.network.peer = parse_var("JBRIDGE_PEER", &peer)?;
        }
        if let Some(bind) = lookup("JBRIDGE_BIND") {
            config.network.bind = parse_var("JBRIDGE_BIND", &bind)?;
        }
        if let Some(program) = lookup("JBRIDGE_PROGRAM") {
            config.program = Some(PathBuf::from(program));
        }
        if let Some(size) = lookup("JBRIDGE_BUFFER_SIZE") {
            config.buffer_size = parse_var("JBRIDGE_BUFFER_SIZE", &size)?;
        }
        if let Some(depth) = lookup("JBRIDGE_WAKE_DEPTH") {
            config.wake_policy = wake_policy(parse_var("JBRIDGE_WAKE_DEPTH", &depth)?)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer cannot hold one character plus its
    /// terminator.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < 2 {
            return Err(BridgeError::invalid_config(format!(
                "buffer size {} too small (minimum 2)",
                self.buffer_size
            )));
        }
        Ok(())
    }

    /// Use node profile `node`; the peer follows the profile.
    #[must_use]
    pub fn with_node(mut self, node: NodeProfile) -> Self {
        self.network.node = node;
        self.network.peer = node.peer_endpoint();
        self
    }

    /// Fix the peer endpoint.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.network.peer = peer;
        self
    }

    /// Bind the network transport to `bind`.
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.network.bind = bind;
        self
    }

    /// Leave the network transport uninitialized.
    #[must_use]
    pub fn without_network(mut self) -> Self {
        self.network.enabled = false;
        self
    }

    /// Load `program` at startup.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Text Buffer capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Wake-up accounting.
    #[must_use]
    pub fn with_wake_policy(mut self, policy: WakePolicy) -> Self {
        self.wake_policy = policy;
        self
    }

    /// Mailbox layout.
    #[must_use]
    pub fn with_map(mut self, map: TargetMap) -> Self {
        self.map = map;
        self
    }
}

/// `1` keeps the one-shot behavior; larger depths count.
///
/// # Errors
///
/// Returns error for a depth of 0.
pub fn wake_policy(depth: usize) -> Result<WakePolicy> {
    match depth {
        0 => Err(BridgeError::invalid_config("wake depth must be at least 1")),
        1 => Ok(WakePolicy::Coalesce),
        depth => Ok(WakePolicy::Counting { depth }),
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| BridgeError::invalid_config(format!("{key}='{value}': {e}")))
}
