//! Types shared with the cluster runtime
//!
//! The cluster runtime hands the local [`DiscoveryNode`] to a
//! [`DiscoveryStrategyFactory`], drives the resulting [`DiscoveryStrategy`]
//! through its lifecycle and consumes the discovered candidates.

use crate::error::Result;
use crate::properties::{Properties, PropertyDefinition};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// Host and port of a cluster member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host name or IP address
    pub host: String,
    /// Port
    pub port: u16,
}

impl Address {
    /// Create an address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            _ => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// A cluster member, either the local one or a discovered candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryNode {
    private_address: Address,
    public_address: Address,
    properties: HashMap<String, String>,
}

impl DiscoveryNode {
    /// Create a node whose public and private addresses are the same
    pub fn new(address: Address, properties: HashMap<String, String>) -> Self {
        Self {
            public_address: address.clone(),
            private_address: address,
            properties,
        }
    }

    /// Create a node with distinct public and private addresses
    pub fn with_public_address(
        private_address: Address,
        public_address: Address,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            private_address,
            public_address,
            properties,
        }
    }

    /// Cluster-internal address
    pub fn private_address(&self) -> &Address {
        &self.private_address
    }

    /// Address reachable from outside the cluster network
    pub fn public_address(&self) -> &Address {
        &self.public_address
    }

    /// Properties attached by the discovery mechanism
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}

/// Pluggable member discovery
pub trait DiscoveryStrategy: Send + Sync {
    /// Called once before the first discovery
    fn start(&self) -> Result<()>;

    /// Current cluster member candidates
    fn discover_nodes(&self) -> Result<Vec<DiscoveryNode>>;

    /// Release resources; the strategy is unusable afterwards
    fn destroy(&self);
}

/// Creates discovery strategies from plugin properties
pub trait DiscoveryStrategyFactory: Send + Sync {
    /// Name identifying the strategy in cluster configuration
    fn strategy_name(&self) -> &'static str;

    /// Properties the strategy understands
    fn configuration_properties(&self) -> Vec<PropertyDefinition>;

    /// Create a strategy for the local `node`, absent on clients
    fn new_discovery_strategy(
        &self,
        node: Option<DiscoveryNode>,
        properties: Properties,
    ) -> Result<Box<dyn DiscoveryStrategy>>;
}

/// Resolves host names to IP addresses
pub trait HostResolver: Send + Sync {
    /// Resolve `host`, which may already be an IP literal
    fn resolve(&self, host: &str) -> io::Result<IpAddr>;
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        (host, 0)
            .to_socket_addrs()?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        assert_eq!(Address::new("10.0.0.1", 5701).to_string(), "10.0.0.1:5701");
        assert_eq!(Address::new("::1", 5701).to_string(), "[::1]:5701");
        assert_eq!(Address::new("node-1", 80).to_string(), "node-1:80");
    }

    #[test]
    fn test_system_resolver_accepts_literals() {
        let ip = SystemResolver.resolve("203.0.113.5").unwrap();
        assert_eq!(ip.to_string(), "203.0.113.5");

        assert!(SystemResolver.resolve("localhost").is_ok());
    }

    #[test]
    fn test_node_addresses() {
        let node = DiscoveryNode::new(Address::new("10.0.0.1", 5701), HashMap::new());
        assert_eq!(node.private_address(), node.public_address());

        let node = DiscoveryNode::with_public_address(
            Address::new("10.0.0.1", 5701),
            Address::new("203.0.113.5", 5701),
            HashMap::new(),
        );
        assert_eq!(node.public_address().host, "203.0.113.5");
    }
}
