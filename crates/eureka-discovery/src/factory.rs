//! Factory registered with the cluster runtime
//!
//! Co-located members can share one registry connection and transport
//! through process-wide settings. They must be set before the first member
//! starts; nothing resets them automatically, set `None` to clear.

use crate::builder::EurekaOneDiscoveryStrategyBuilder;
use crate::cluster::{DiscoveryNode, DiscoveryStrategy, DiscoveryStrategyFactory};
use crate::error::Result;
use crate::properties::{
    EUREKA_CLIENT_PROPERTY_DEFINITIONS, HZ_PROPERTY_DEFINITIONS, Properties, PropertyDefinition,
};
use eureka_client::{EurekaClient, TransportClientFactory};
use std::sync::{Arc, PoisonError, RwLock};

static EUREKA_CLIENT: RwLock<Option<Arc<dyn EurekaClient>>> = RwLock::new(None);
static TRANSPORT_CLIENT_FACTORY: RwLock<Option<Arc<dyn TransportClientFactory>>> =
    RwLock::new(None);
static GROUP_NAME: RwLock<Option<String>> = RwLock::new(None);

/// Creates [`EurekaOneDiscoveryStrategy`](crate::EurekaOneDiscoveryStrategy)
/// instances
#[derive(Debug, Clone, Copy, Default)]
pub struct EurekaOneDiscoveryStrategyFactory;

impl EurekaOneDiscoveryStrategyFactory {
    /// Share an already configured registry client with every new strategy
    pub fn set_eureka_client(client: Option<Arc<dyn EurekaClient>>) {
        *EUREKA_CLIENT.write().unwrap_or_else(PoisonError::into_inner) = client;
    }

    /// Transport used by registry clients the strategies create
    pub fn set_transport_client_factory(factory: Option<Arc<dyn TransportClientFactory>>) {
        *TRANSPORT_CLIENT_FACTORY
            .write()
            .unwrap_or_else(PoisonError::into_inner) = factory;
    }

    /// Cluster group name published and matched in metadata mode
    pub fn set_group_name(group_name: Option<String>) {
        *GROUP_NAME.write().unwrap_or_else(PoisonError::into_inner) = group_name;
    }

    fn eureka_client() -> Option<Arc<dyn EurekaClient>> {
        EUREKA_CLIENT
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transport_client_factory() -> Option<Arc<dyn TransportClientFactory>> {
        TRANSPORT_CLIENT_FACTORY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn group_name() -> Option<String> {
        GROUP_NAME
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiscoveryStrategyFactory for EurekaOneDiscoveryStrategyFactory {
    fn strategy_name(&self) -> &'static str {
        "eureka-one"
    }

    fn configuration_properties(&self) -> Vec<PropertyDefinition> {
        HZ_PROPERTY_DEFINITIONS
            .iter()
            .chain(EUREKA_CLIENT_PROPERTY_DEFINITIONS.iter())
            .copied()
            .collect()
    }

    fn new_discovery_strategy(
        &self,
        node: Option<DiscoveryNode>,
        properties: Properties,
    ) -> Result<Box<dyn DiscoveryStrategy>> {
        let strategy = EurekaOneDiscoveryStrategyBuilder::new()
            .discovery_node(node)
            .properties(properties)
            .eureka_client(Self::eureka_client())
            .group_name(Self::group_name())
            .transport_client_factory(Self::transport_client_factory())
            .build()?;
        Ok(Box::new(strategy))
    }
}
