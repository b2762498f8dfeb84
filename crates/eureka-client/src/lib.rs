//! Blocking client for Eureka v2 registries
//!
//! This crate registers a local instance with a Eureka registry, keeps its
//! lease alive and looks up registered applications. It is synchronous:
//! callers block on registry requests and a single background thread sends
//! heartbeats.
//!
//! # Architecture
//!
//! - [`ConfigProperties`] loads flat, namespace-scoped configuration from
//!   `.properties`, YAML or JSON files
//! - [`EurekaInstanceConfig`] describes the local instance, with generic and
//!   EC2 flavours
//! - [`ApplicationInfoManager`] owns the local [`InstanceInfo`] and
//!   publishes status changes
//! - [`DiscoveryClient`] talks to the registry through a
//!   [`TransportClientFactory`], HTTP by default
//!
//! # Example
//!
//! ```no_run
//! use eureka_client::{
//!     ApplicationInfoManager, ConfigProperties, DataCenterInstanceConfig, DiscoveryClient,
//!     EurekaClient, EurekaClientConfig, InstanceStatus,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> eureka_client::Result<()> {
//! let properties = ConfigProperties::locate()?;
//! let instance = DataCenterInstanceConfig::new("eureka", &properties)?;
//! let manager = Arc::new(ApplicationInfoManager::from_config(Arc::new(instance)));
//! let client = DiscoveryClient::new(
//!     Arc::clone(&manager),
//!     EurekaClientConfig::from_properties("eureka", &properties)?,
//! )?;
//!
//! manager.set_instance_status(InstanceStatus::Up);
//! let peers = client.get_application("my-app")?;
//! client.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod client_config;
pub mod error;
pub mod info_manager;
pub mod instance_config;
pub mod memory;
pub mod models;
pub mod properties;
pub mod transport;

pub use client::{DiscoveryClient, EurekaClient};
pub use client_config::{EurekaClientConfig, ProxyConfig};
pub use error::{Error, Result};
pub use info_manager::{ApplicationInfoManager, StatusChangeEvent, StatusChangeListener};
pub use instance_config::{
    CloudInstanceConfig, DataCenterInstanceConfig, DataCenterType, EurekaInstanceConfig,
};
pub use memory::MemoryRegistry;
pub use models::*;
pub use properties::ConfigProperties;
pub use transport::{
    EurekaHttpClient, HeartbeatOutcome, ReqwestEurekaHttpClient, ReqwestTransportFactory,
    TransportClientFactory,
};
