//! Cluster member discovery through a Eureka registry
//!
//! A member registers itself with the registry and finds its peers by
//! listing the instances registered under the same application name. In
//! metadata mode members publish their cluster address and group name as
//! instance metadata, which keeps clusters sharing one application apart.
//!
//! # Example
//!
//! ```no_run
//! use eureka_discovery::{
//!     Address, DiscoveryNode, DiscoveryStrategy, DiscoveryStrategyFactory,
//!     EurekaOneDiscoveryStrategyFactory, Properties, PropertyValue,
//! };
//! use std::collections::HashMap;
//!
//! # fn example() -> eureka_discovery::Result<()> {
//! let local = DiscoveryNode::new(Address::new("10.0.0.1", 5701), HashMap::new());
//! let properties = Properties::from([(
//!     "use-metadata-for-host-and-port".to_string(),
//!     PropertyValue::Bool(true),
//! )]);
//!
//! let strategy = EurekaOneDiscoveryStrategyFactory
//!     .new_discovery_strategy(Some(local), properties)?;
//! strategy.start()?;
//! for node in strategy.discover_nodes()? {
//!     println!("candidate {}", node.private_address());
//! }
//! strategy.destroy();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod cluster;
pub mod error;
pub mod factory;
pub mod instance_config;
pub mod metadata;
pub mod properties;
pub mod status;
pub mod strategy;

pub use builder::EurekaOneDiscoveryStrategyBuilder;
pub use cluster::{
    Address, DiscoveryNode, DiscoveryStrategy, DiscoveryStrategyFactory, HostResolver,
    SystemResolver,
};
pub use error::{DiscoveryError, Result};
pub use factory::EurekaOneDiscoveryStrategyFactory;
pub use instance_config::DelegatingInstanceConfig;
pub use properties::{Properties, PropertyDefinition, PropertyKind, PropertyValue};
pub use status::{MetadataUpdater, StatusChangeStrategy, StatusUpdater};
pub use strategy::EurekaOneDiscoveryStrategy;
