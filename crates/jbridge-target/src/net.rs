//! Network node profiles.
//!
//! A deployment is two boards talking UDP to each other on a private
//! /24. Each board is built as one of two nodes; node 0 and node 1 are
//! mirror images of each other.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// UDP port both nodes bind and send to.
pub const SERVER_PORT: u16 = 7;

/// Address of node 0.
pub const NODE0_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 64);
/// Address of node 1.
pub const NODE1_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 128);

/// Netmask of the deployment subnet.
pub const NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
/// Gateway of the deployment subnet.
pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Which side of the link this host is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeProfile {
    /// 192.168.1.64, peer 192.168.1.128.
    #[default]
    Node0,
    /// 192.168.1.128, peer 192.168.1.64.
    Node1,
}

impl NodeProfile {
    /// Parse `0`/`1`/`node0`/`node1`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "node0" => Some(Self::Node0),
            "1" | "node1" => Some(Self::Node1),
            _ => None,
        }
    }

    /// This node's address.
    #[must_use]
    pub const fn local_addr(&self) -> Ipv4Addr {
        match self {
            Self::Node0 => NODE0_ADDR,
            Self::Node1 => NODE1_ADDR,
        }
    }

    /// The peer's address.
    #[must_use]
    pub const fn remote_addr(&self) -> Ipv4Addr {
        match self {
            Self::Node0 => NODE1_ADDR,
            Self::Node1 => NODE0_ADDR,
        }
    }

    /// Peer endpoint.
    #[must_use]
    pub const fn peer_endpoint(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.remote_addr(), SERVER_PORT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_mirror_each_other() {
        let a = NodeProfile::Node0;
        let b = NodeProfile::Node1;
        assert_eq!(a.local_addr(), b.remote_addr());
        assert_eq!(a.remote_addr(), b.local_addr());
        assert_eq!(a.peer_endpoint().port(), SERVER_PORT);
    }

    #[test]
    fn parse_profile_names() {
        assert_eq!(NodeProfile::parse("node1"), Some(NodeProfile::Node1));
        assert_eq!(NodeProfile::parse(" 0 "), Some(NodeProfile::Node0));
        assert_eq!(NodeProfile::parse("2"), None);
    }
}
