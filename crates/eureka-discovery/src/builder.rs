//! Builder for [`EurekaOneDiscoveryStrategy`]

use crate::cluster::{DiscoveryNode, HostResolver};
use crate::error::Result;
use crate::properties::{Environment, Properties};
use crate::status::{StatusChangeStrategy, StatusUpdater};
use crate::strategy::EurekaOneDiscoveryStrategy;
use eureka_client::{ApplicationInfoManager, ConfigProperties, EurekaClient, TransportClientFactory};
use std::sync::Arc;
use tracing::Span;

/// Group name used when none is supplied
pub const DEFAULT_GROUP_NAME: &str = "dev";

/// Collects the inputs of a [`EurekaOneDiscoveryStrategy`].
///
/// Setters only record values. Defaults and the dependencies between inputs
/// are resolved in [`build`](Self::build):
///
/// 1. an injected registry client supplies the application info manager,
///    unless one was set explicitly;
/// 2. the status change policy is the injected one, else
///    [`StatusUpdater::Disabled`] when a registry client was injected, else
///    [`StatusUpdater::Default`];
/// 3. without a local discovery node the policy is always
///    [`StatusUpdater::Disabled`];
/// 4. the group name defaults to [`DEFAULT_GROUP_NAME`].
#[derive(Default)]
pub struct EurekaOneDiscoveryStrategyBuilder {
    pub(crate) eureka_client: Option<Arc<dyn EurekaClient>>,
    pub(crate) application_info_manager: Option<Arc<ApplicationInfoManager>>,
    pub(crate) discovery_node: Option<DiscoveryNode>,
    pub(crate) span: Option<Span>,
    pub(crate) properties: Properties,
    pub(crate) group_name: Option<String>,
    pub(crate) status_change_strategy: Option<Arc<dyn StatusChangeStrategy>>,
    pub(crate) transport_client_factory: Option<Arc<dyn TransportClientFactory>>,
    pub(crate) host_resolver: Option<Arc<dyn HostResolver>>,
    pub(crate) environment: Option<Environment>,
    pub(crate) config_properties: Option<ConfigProperties>,
}

impl EurekaOneDiscoveryStrategyBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing registry client instead of creating one
    pub fn eureka_client(mut self, client: Option<Arc<dyn EurekaClient>>) -> Self {
        self.eureka_client = client;
        self
    }

    /// Use an existing application info manager
    pub fn application_info_manager(mut self, manager: Arc<ApplicationInfoManager>) -> Self {
        self.application_info_manager = Some(manager);
        self
    }

    /// Local cluster member, absent on clients
    pub fn discovery_node(mut self, node: Option<DiscoveryNode>) -> Self {
        self.discovery_node = node;
        self
    }

    /// Span entered by every strategy operation
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Plugin properties
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Cluster group name, used in metadata mode
    pub fn group_name(mut self, group_name: Option<String>) -> Self {
        self.group_name = group_name;
        self
    }

    /// Replace the status change policy
    pub fn status_change_strategy(mut self, strategy: Arc<dyn StatusChangeStrategy>) -> Self {
        self.status_change_strategy = Some(strategy);
        self
    }

    /// Transport used when the strategy creates its own registry client
    pub fn transport_client_factory(mut self, factory: Option<Arc<dyn TransportClientFactory>>) -> Self {
        self.transport_client_factory = factory;
        self
    }

    /// Resolver for discovered host names
    pub fn host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.host_resolver = Some(resolver);
        self
    }

    /// Source of `hazelcast.eurekaone.*` overrides, the process environment
    /// by default
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Configuration resource to use instead of locating one on disk
    pub fn config_properties(mut self, properties: ConfigProperties) -> Self {
        self.config_properties = Some(properties);
        self
    }

    /// Resolve defaults and create the strategy
    pub fn build(mut self) -> Result<EurekaOneDiscoveryStrategy> {
        if self.application_info_manager.is_none() {
            self.application_info_manager = self
                .eureka_client
                .as_ref()
                .map(|client| client.application_info_manager());
        }

        let strategy: Arc<dyn StatusChangeStrategy> = match (
            &self.discovery_node,
            self.status_change_strategy.take(),
            &self.eureka_client,
        ) {
            (None, _, _) => Arc::new(StatusUpdater::Disabled),
            (Some(_), Some(injected), _) => injected,
            (Some(_), None, Some(_)) => Arc::new(StatusUpdater::Disabled),
            (Some(_), None, None) => Arc::new(StatusUpdater::Default),
        };
        self.status_change_strategy = Some(strategy);

        if self.group_name.is_none() {
            self.group_name = Some(DEFAULT_GROUP_NAME.to_string());
        }

        EurekaOneDiscoveryStrategy::new(self)
    }

    pub(crate) fn resolved_group_name(&self) -> String {
        self.group_name
            .clone()
            .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string())
    }

    pub(crate) fn resolved_status_change_strategy(&self) -> Arc<dyn StatusChangeStrategy> {
        self.status_change_strategy
            .clone()
            .unwrap_or_else(|| Arc::new(StatusUpdater::Default))
    }
}

impl std::fmt::Debug for EurekaOneDiscoveryStrategyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EurekaOneDiscoveryStrategyBuilder")
            .field("has_eureka_client", &self.eureka_client.is_some())
            .field("discovery_node", &self.discovery_node)
            .field("properties", &self.properties)
            .field("group_name", &self.group_name)
            .finish_non_exhaustive()
    }
}
