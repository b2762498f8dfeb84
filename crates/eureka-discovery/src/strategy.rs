//! Discovery strategy backed by a Eureka registry
//!
//! The strategy registers the local member (unless disabled), publishes its
//! cluster address when metadata mode is on, and turns the registry's view
//! of the member's application into cluster member candidates.

use crate::builder::EurekaOneDiscoveryStrategyBuilder;
use crate::cluster::{Address, DiscoveryNode, DiscoveryStrategy, HostResolver, SystemResolver};
use crate::error::{DiscoveryError, Result};
use crate::instance_config::DelegatingInstanceConfig;
use crate::metadata::{HAZELCAST_GROUP_NAME, HAZELCAST_HOST, HAZELCAST_PORT};
use crate::properties::{
    self, DATACENTER, HZ_PROPERTY_DEFINITIONS, NAME, NAMESPACE, Properties, PropertyLookup,
    SELF_REGISTRATION, SKIP_EUREKA_REGISTRATION_VERIFICATION, USE_CLASSPATH_EUREKA_CLIENT_PROPS,
    USE_METADATA_FOR_HOST_AND_PORT,
};
use crate::status::{MetadataUpdater, StatusChangeStrategy, StatusUpdater};
use eureka_client::{
    Application, ApplicationInfoManager, ConfigProperties, DataCenterType, DiscoveryClient,
    EurekaClient, EurekaClientConfig, InstanceInfo, InstanceStatus, ReqwestTransportFactory,
    TransportClientFactory,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{Span, debug, info, info_span, warn};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "hazelcast";

/// Application name used when the plugin properties name none
pub const DEFAULT_APP_NAME: &str = "unknown";

/// Registry lookups per discovery round
pub const NUM_RETRIES: usize = 5;

/// Pause between discovery lookups
pub const DISCOVERY_RETRY_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between registration checks
pub const VERIFICATION_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the registry client and instance settings come from
enum ConfigSource {
    /// The shared configuration resource
    Resource(ConfigProperties),
    /// Plugin properties, prefixed with the namespace
    Plugin {
        instance: ConfigProperties,
        client: ConfigProperties,
        datacenter: String,
        app_name: String,
    },
}

impl ConfigSource {
    fn load(
        use_classpath: bool,
        namespace: &str,
        lookup: &PropertyLookup<'_>,
        properties: &Properties,
        resource: Option<ConfigProperties>,
    ) -> Result<Self> {
        if use_classpath {
            let resource = match resource {
                Some(resource) => resource,
                None => ConfigProperties::locate()?,
            };
            return Ok(ConfigSource::Resource(resource));
        }

        let instance: ConfigProperties = properties
            .iter()
            .map(|(key, value)| (format!("{namespace}.{key}"), value.to_string()))
            .collect();
        let mut client = instance.clone();
        for definition in HZ_PROPERTY_DEFINITIONS {
            client.remove(&format!("{namespace}.{}", definition.key));
        }

        Ok(ConfigSource::Plugin {
            instance,
            client,
            datacenter: lookup.get_string(&DATACENTER, "")?,
            app_name: lookup.get_string(&NAME, DEFAULT_APP_NAME)?,
        })
    }

    fn instance_config(
        &self,
        namespace: &str,
        local_node: Option<DiscoveryNode>,
    ) -> Result<DelegatingInstanceConfig> {
        Ok(match self {
            ConfigSource::Resource(resource) => {
                let datacenter = resource.namespace(namespace).get("datacenter").unwrap_or("");
                let delegate = DataCenterType::from_name(datacenter).instance_config(namespace, resource)?;
                DelegatingInstanceConfig::new(delegate, local_node)
            }
            ConfigSource::Plugin {
                instance,
                datacenter,
                app_name,
                ..
            } => {
                let delegate = DataCenterType::from_name(datacenter).instance_config(namespace, instance)?;
                DelegatingInstanceConfig::new(delegate, local_node).with_app_name(app_name.as_str())
            }
        })
    }

    fn client_config(&self, namespace: &str, should_register: bool) -> Result<EurekaClientConfig> {
        Ok(match self {
            ConfigSource::Resource(resource) => {
                EurekaClientConfig::from_properties(namespace, resource)?
                    .with_registration(should_register)
            }
            ConfigSource::Plugin { client, .. } => {
                let config = EurekaClientConfig::from_properties(namespace, client)?;
                let register = config.register_with_eureka && should_register;
                config.with_registration(register)
            }
        })
    }
}

/// Discovery strategy querying a Eureka registry
pub struct EurekaOneDiscoveryStrategy {
    eureka_client: Arc<dyn EurekaClient>,
    application_info_manager: Arc<ApplicationInfoManager>,
    status_change_strategy: Arc<dyn StatusChangeStrategy>,
    host_resolver: Arc<dyn HostResolver>,
    span: Span,
    namespace: String,
    group_name: String,
    use_metadata: bool,
    skip_verification: bool,
    pub(crate) discovery_retry_delay: Duration,
    pub(crate) verification_delay: Duration,
}

impl EurekaOneDiscoveryStrategy {
    /// Create the strategy from a builder whose defaults have been resolved
    pub(crate) fn new(builder: EurekaOneDiscoveryStrategyBuilder) -> Result<Self> {
        let environment = builder
            .environment
            .clone()
            .unwrap_or_else(properties::process_environment);
        let lookup = PropertyLookup::new(&builder.properties, &environment);

        let namespace = lookup.get_string(&NAMESPACE, DEFAULT_NAMESPACE)?;
        let self_registration = lookup.get_bool(&SELF_REGISTRATION, true)?;
        let use_metadata = lookup.get_bool(&USE_METADATA_FOR_HOST_AND_PORT, false)?;
        let use_classpath = lookup.get_bool(&USE_CLASSPATH_EUREKA_CLIENT_PROPS, true)?;
        let skip_verification = lookup.get_bool(&SKIP_EUREKA_REGISTRATION_VERIFICATION, false)?;
        let group_name = builder.resolved_group_name();

        let span = builder
            .span
            .clone()
            .unwrap_or_else(|| info_span!("eureka_discovery", namespace = %namespace));
        let entered = span.enter();

        let status_change_strategy: Arc<dyn StatusChangeStrategy> =
            match (&builder.discovery_node, self_registration, use_metadata) {
                (_, false, false) => Arc::new(StatusUpdater::Disabled),
                (Some(node), _, true) => Arc::new(StatusUpdater::Metadata(MetadataUpdater::new(
                    node.private_address().clone(),
                    self_registration,
                    group_name.as_str(),
                )?)),
                _ => builder.resolved_status_change_strategy(),
            };
        debug!(
            self_registration,
            use_metadata,
            use_classpath,
            should_register = status_change_strategy.should_register(),
            "Discovery strategy configured"
        );

        let injected_manager = builder.application_info_manager.clone();
        let source = if injected_manager.is_none() || builder.eureka_client.is_none() {
            Some(ConfigSource::load(
                use_classpath,
                &namespace,
                &lookup,
                &builder.properties,
                builder.config_properties.clone(),
            )?)
        } else {
            None
        };

        let application_info_manager = match (injected_manager, &source) {
            (Some(manager), _) => manager,
            (None, Some(source)) => {
                let instance_config = source.instance_config(&namespace, builder.discovery_node.clone())?;
                let manager = Arc::new(ApplicationInfoManager::from_config(Arc::new(instance_config)));
                status_change_strategy.update(&manager, InstanceStatus::Starting);
                manager
            }
            (None, None) => {
                return Err(DiscoveryError::precondition(
                    "no application info manager and no configuration source",
                ));
            }
        };

        let eureka_client: Arc<dyn EurekaClient> = match (builder.eureka_client.clone(), &source) {
            (Some(client), _) => client,
            (None, Some(source)) => {
                let config =
                    source.client_config(&namespace, status_change_strategy.should_register())?;
                let transport: Arc<dyn TransportClientFactory> = builder
                    .transport_client_factory
                    .clone()
                    .unwrap_or_else(|| Arc::new(ReqwestTransportFactory));
                Arc::new(DiscoveryClient::with_transport_factory(
                    Arc::clone(&application_info_manager),
                    config,
                    transport.as_ref(),
                )?)
            }
            (None, None) => {
                return Err(DiscoveryError::precondition(
                    "no registry client and no configuration source",
                ));
            }
        };

        drop(entered);
        Ok(Self {
            eureka_client,
            application_info_manager,
            status_change_strategy,
            host_resolver: builder
                .host_resolver
                .clone()
                .unwrap_or_else(|| Arc::new(SystemResolver)),
            span,
            namespace,
            group_name,
            use_metadata,
            skip_verification,
            discovery_retry_delay: DISCOVERY_RETRY_TIMEOUT,
            verification_delay: VERIFICATION_WAIT_TIMEOUT,
        })
    }

    /// Registry client in use
    pub fn eureka_client(&self) -> &Arc<dyn EurekaClient> {
        &self.eureka_client
    }

    /// Manager of the local instance record
    pub fn application_info_manager(&self) -> &Arc<ApplicationInfoManager> {
        &self.application_info_manager
    }

    /// Whether the member registers itself
    pub fn should_register(&self) -> bool {
        self.status_change_strategy.should_register()
    }

    /// Configuration namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Group name used for metadata filtering
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    fn app_name(&self) -> String {
        self.application_info_manager.instance_config().app_name()
    }

    fn lookup_application(&self, app_name: &str) -> Result<Option<Application>> {
        for attempt in 1..=NUM_RETRIES {
            match self.eureka_client.get_application(app_name) {
                Ok(Some(application)) => return Ok(Some(application)),
                Ok(None) => debug!(attempt, "Application {} not in registry yet", app_name),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => warn!(attempt, "Looking up application {} failed: {}", app_name, e),
            }
            if attempt < NUM_RETRIES {
                thread::sleep(self.discovery_retry_delay);
            }
        }
        Ok(None)
    }

    /// Map a registry record to a member candidate, `None` to skip it
    fn to_candidate(&self, instance: &InstanceInfo) -> Option<DiscoveryNode> {
        let (host, port) = if self.use_metadata {
            if instance.get_metadata(HAZELCAST_GROUP_NAME) != Some(self.group_name.as_str()) {
                debug!("Skipping {}, it belongs to another group", instance);
                return None;
            }
            let Some(host) = instance.get_metadata(HAZELCAST_HOST) else {
                warn!("Instance {} publishes no {}", instance, HAZELCAST_HOST);
                return None;
            };
            let port = instance
                .get_metadata(HAZELCAST_PORT)
                .and_then(|port| port.trim().parse::<i64>().ok())
                .unwrap_or(-1);
            (host, port)
        } else {
            (instance.ip_addr.as_str(), i64::from(instance.port.port))
        };

        let ip = match self.host_resolver.resolve(host) {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Address of instance {} could not be resolved: {}", instance, e);
                return None;
            }
        };
        let port = match u16::try_from(port) {
            Ok(port) if port > 0 => port,
            _ => {
                warn!("Instance {} has invalid port {}", instance, port);
                return None;
            }
        };

        Some(DiscoveryNode::new(
            Address::new(ip.to_string(), port),
            instance.metadata.clone(),
        ))
    }

    /// Block until the registry lists the member's application.
    ///
    /// Non-fatal lookup errors are retried indefinitely; fatal ones end the
    /// wait with an error.
    pub fn verify_eureka_registration(&self) -> Result<()> {
        let _entered = self.span.enter();
        let app_name = self.app_name();

        loop {
            info!("Waiting for registration with Eureka...");
            match self.eureka_client.get_application(&app_name) {
                Ok(Some(_)) => {
                    info!("Registration of {} with Eureka verified", app_name);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => debug!("Registration check failed: {}", e),
            }
            thread::sleep(self.verification_delay);
        }
    }
}

impl DiscoveryStrategy for EurekaOneDiscoveryStrategy {
    fn start(&self) -> Result<()> {
        {
            let _entered = self.span.enter();
            self.status_change_strategy
                .update(&self.application_info_manager, InstanceStatus::Up);
            if self.skip_verification {
                info!("Skipping verification of the Eureka registration");
                return Ok(());
            }
        }
        self.verify_eureka_registration()
    }

    fn discover_nodes(&self) -> Result<Vec<DiscoveryNode>> {
        let _entered = self.span.enter();
        let app_name = self.app_name();

        let Some(application) = self.lookup_application(&app_name)? else {
            debug!("Application {} not found, no candidates", app_name);
            return Ok(Vec::new());
        };

        let nodes: Vec<DiscoveryNode> = application
            .instances()
            .iter()
            .filter(|instance| instance.status == InstanceStatus::Up)
            .filter_map(|instance| self.to_candidate(instance))
            .collect();
        debug!("Discovered {} candidates for {}", nodes.len(), app_name);
        Ok(nodes)
    }

    fn destroy(&self) {
        let _entered = self.span.enter();
        self.status_change_strategy
            .update(&self.application_info_manager, InstanceStatus::Down);
        self.eureka_client.shutdown();
    }
}

impl std::fmt::Debug for EurekaOneDiscoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EurekaOneDiscoveryStrategy")
            .field("namespace", &self.namespace)
            .field("group_name", &self.group_name)
            .field("use_metadata", &self.use_metadata)
            .field("skip_verification", &self.skip_verification)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{Environment, PropertyValue};
    use eureka_client::{
        DataCenterInstanceConfig, DataCenterName, Error as ClientError, EurekaInstanceConfig,
    };
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::net::IpAddr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Events = Arc<Mutex<Vec<String>>>;

    /// Registry client answering lookups from a script
    struct ScriptedClient {
        manager: Arc<ApplicationInfoManager>,
        script: Mutex<VecDeque<eureka_client::Result<Option<Application>>>>,
        fallback: Option<Application>,
        lookups: AtomicUsize,
        events: Events,
    }

    impl ScriptedClient {
        fn new(fallback: Option<Application>, events: Events) -> Self {
            let properties: ConfigProperties = [
                ("hazelcast.name", "hazelcast-test"),
                ("hazelcast.hostname", "local"),
            ]
            .into_iter()
            .collect();
            let config = DataCenterInstanceConfig::new("hazelcast", &properties).unwrap();
            Self {
                manager: Arc::new(ApplicationInfoManager::from_config(Arc::new(config))),
                script: Mutex::new(VecDeque::new()),
                fallback,
                lookups: AtomicUsize::new(0),
                events,
            }
        }

        fn then(self, answer: eureka_client::Result<Option<Application>>) -> Self {
            self.script.lock().unwrap().push_back(answer);
            self
        }
    }

    impl EurekaClient for ScriptedClient {
        fn get_application(&self, app_name: &str) -> eureka_client::Result<Option<Application>> {
            assert_eq!(app_name, "hazelcast-test");
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(answer) => answer,
                None => Ok(self.fallback.clone()),
            }
        }

        fn application_info_manager(&self) -> Arc<ApplicationInfoManager> {
            Arc::clone(&self.manager)
        }

        fn shutdown(&self) {
            self.events.lock().unwrap().push("shutdown".to_string());
        }
    }

    /// Policy recording every update
    struct RecordingStrategy {
        events: Events,
    }

    impl StatusChangeStrategy for RecordingStrategy {
        fn update(&self, _manager: &ApplicationInfoManager, status: InstanceStatus) {
            self.events.lock().unwrap().push(format!("update:{status}"));
        }

        fn should_register(&self) -> bool {
            true
        }
    }

    /// Resolves IP literals only
    struct LiteralResolver;

    impl HostResolver for LiteralResolver {
        fn resolve(&self, host: &str) -> io::Result<IpAddr> {
            host.parse()
                .map_err(|_| io::Error::new(io::ErrorKind::NotFound, host.to_string()))
        }
    }

    fn instance(id: &str, ip: &str, port: i32, status: InstanceStatus) -> InstanceInfo {
        let mut instance = InstanceInfo::new("hazelcast-test", id);
        instance.ip_addr = ip.to_string();
        instance.port.port = port;
        instance.status = status;
        instance
    }

    fn application(instances: Vec<InstanceInfo>) -> Application {
        let mut application = Application::new("hazelcast-test");
        for instance in instances {
            application.add_instance(instance);
        }
        application
    }

    fn metadata_instance(host: &str, port: Option<&str>, group: &str) -> InstanceInfo {
        let mut instance = instance("m-1", "192.168.0.1", 8080, InstanceStatus::Up);
        instance.metadata.insert(HAZELCAST_HOST.to_string(), host.to_string());
        if let Some(port) = port {
            instance.metadata.insert(HAZELCAST_PORT.to_string(), port.to_string());
        }
        instance
            .metadata
            .insert(HAZELCAST_GROUP_NAME.to_string(), group.to_string());
        instance
    }

    fn local_node() -> DiscoveryNode {
        DiscoveryNode::new(Address::new("10.0.0.1", 5701), HashMap::new())
    }

    fn strategy(
        client: Arc<ScriptedClient>,
        properties: &[(&str, PropertyValue)],
        group: &str,
    ) -> EurekaOneDiscoveryStrategy {
        let properties = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut strategy = EurekaOneDiscoveryStrategyBuilder::new()
            .eureka_client(Some(client))
            .discovery_node(Some(local_node()))
            .properties(properties)
            .group_name(Some(group.to_string()))
            .host_resolver(Arc::new(LiteralResolver))
            .environment(Arc::new(|_: &str| None))
            .build()
            .unwrap();
        strategy.discovery_retry_delay = Duration::ZERO;
        strategy.verification_delay = Duration::ZERO;
        strategy
    }

    fn metadata_mode() -> Vec<(&'static str, PropertyValue)> {
        vec![("use-metadata-for-host-and-port", PropertyValue::Bool(true))]
    }

    fn addresses(nodes: &[DiscoveryNode]) -> Vec<String> {
        nodes.iter().map(|n| n.private_address().to_string()).collect()
    }

    #[test]
    fn test_absent_application_is_retried_then_empty() {
        let client = Arc::new(ScriptedClient::new(None, Events::default()));
        let strategy = strategy(Arc::clone(&client), &[], "dev");

        let nodes = strategy.discover_nodes().unwrap();
        assert!(nodes.is_empty());
        assert_eq!(client.lookups.load(Ordering::SeqCst), NUM_RETRIES);
    }

    #[test]
    fn test_direct_mode_uses_registry_address() {
        let app = application(vec![instance("i-1", "203.0.113.5", 5701, InstanceStatus::Up)]);
        let client = Arc::new(ScriptedClient::new(Some(app), Events::default()));
        let strategy = strategy(client, &[], "dev");

        let nodes = strategy.discover_nodes().unwrap();
        assert_eq!(addresses(&nodes), vec!["203.0.113.5:5701"]);
        assert_eq!(nodes[0].public_address(), nodes[0].private_address());
    }

    #[test]
    fn test_instances_not_up_are_skipped() {
        let app = application(vec![
            instance("i-1", "203.0.113.5", 5701, InstanceStatus::Down),
            instance("i-2", "203.0.113.6", 5701, InstanceStatus::Starting),
            instance("i-3", "203.0.113.7", 5701, InstanceStatus::OutOfService),
        ]);
        let client = Arc::new(ScriptedClient::new(Some(app), Events::default()));
        let strategy = strategy(client, &[], "dev");

        assert!(strategy.discover_nodes().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_mode_isolates_groups() {
        let app = application(vec![metadata_instance("10.0.0.9", Some("5708"), "g1")]);

        let client = Arc::new(ScriptedClient::new(Some(app.clone()), Events::default()));
        let same_group = strategy(client, &metadata_mode(), "g1");
        let nodes = same_group.discover_nodes().unwrap();
        assert_eq!(addresses(&nodes), vec!["10.0.0.9:5708"]);
        assert_eq!(
            nodes[0].properties().get(HAZELCAST_GROUP_NAME).map(String::as_str),
            Some("g1")
        );

        let client = Arc::new(ScriptedClient::new(Some(app), Events::default()));
        let other_group = strategy(client, &metadata_mode(), "g2");
        assert!(other_group.discover_nodes().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_ports_are_dropped() {
        let direct = application(vec![
            instance("i-1", "203.0.113.5", 0, InstanceStatus::Up),
            instance("i-2", "203.0.113.6", 70000, InstanceStatus::Up),
            instance("i-3", "203.0.113.7", 5701, InstanceStatus::Up),
        ]);
        let client = Arc::new(ScriptedClient::new(Some(direct), Events::default()));
        let nodes = strategy(client, &[], "dev").discover_nodes().unwrap();
        assert_eq!(addresses(&nodes), vec!["203.0.113.7:5701"]);

        let metadata = application(vec![
            metadata_instance("10.0.0.9", None, "g1"),
        ]);
        let client = Arc::new(ScriptedClient::new(Some(metadata), Events::default()));
        let nodes = strategy(client, &metadata_mode(), "g1").discover_nodes().unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_unresolvable_hosts_are_dropped() {
        let app = application(vec![
            instance("i-1", "no-such-host", 5701, InstanceStatus::Up),
            instance("i-2", "203.0.113.6", 5701, InstanceStatus::Up),
        ]);
        let client = Arc::new(ScriptedClient::new(Some(app), Events::default()));
        let nodes = strategy(client, &[], "dev").discover_nodes().unwrap();
        assert_eq!(addresses(&nodes), vec!["203.0.113.6:5701"]);
    }

    #[test]
    fn test_registry_order_is_preserved() {
        let app = application(vec![
            instance("i-3", "203.0.113.3", 5701, InstanceStatus::Up),
            instance("i-1", "203.0.113.1", 5701, InstanceStatus::Up),
            instance("i-2", "203.0.113.2", 5701, InstanceStatus::Up),
        ]);
        let client = Arc::new(ScriptedClient::new(Some(app), Events::default()));
        let nodes = strategy(client, &[], "dev").discover_nodes().unwrap();
        assert_eq!(
            addresses(&nodes),
            vec!["203.0.113.3:5701", "203.0.113.1:5701", "203.0.113.2:5701"]
        );
    }

    #[test]
    fn test_discovery_retries_transient_errors() {
        let app = application(vec![instance("i-1", "203.0.113.5", 5701, InstanceStatus::Up)]);
        let client = Arc::new(
            ScriptedClient::new(Some(app), Events::default())
                .then(Err(ClientError::Shutdown))
                .then(Ok(None)),
        );
        let strategy = strategy(Arc::clone(&client), &[], "dev");

        assert_eq!(strategy.discover_nodes().unwrap().len(), 1);
        assert_eq!(client.lookups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_discovery_propagates_fatal_errors() {
        let client = Arc::new(
            ScriptedClient::new(None, Events::default())
                .then(Err(ClientError::Fatal("corrupt registry".to_string()))),
        );
        let strategy = strategy(Arc::clone(&client), &[], "dev");

        let err = strategy.discover_nodes().unwrap_err();
        assert!(matches!(err, DiscoveryError::Client(ClientError::Fatal(_))));
        assert_eq!(client.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_verification_waits_past_transient_errors() {
        let app = application(vec![]);
        let client = Arc::new(
            ScriptedClient::new(Some(app), Events::default())
                .then(Ok(None))
                .then(Err(ClientError::UnexpectedStatus {
                    status: 503,
                    url: "http://registry/apps/HAZELCAST-TEST".to_string(),
                }))
                .then(Ok(None)),
        );
        let strategy = strategy(Arc::clone(&client), &[], "dev");

        strategy.verify_eureka_registration().unwrap();
        assert_eq!(client.lookups.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_verification_propagates_fatal_errors() {
        let client = Arc::new(
            ScriptedClient::new(None, Events::default())
                .then(Ok(None))
                .then(Err(ClientError::NoServiceUrls)),
        );
        let strategy = strategy(Arc::clone(&client), &[], "dev");

        assert!(strategy.verify_eureka_registration().is_err());
        assert_eq!(client.lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_destroy_reports_down_then_shuts_down() {
        let events = Events::default();
        let client = Arc::new(ScriptedClient::new(None, Arc::clone(&events)));
        let strategy = EurekaOneDiscoveryStrategyBuilder::new()
            .eureka_client(Some(client))
            .discovery_node(Some(local_node()))
            .status_change_strategy(Arc::new(RecordingStrategy {
                events: Arc::clone(&events),
            }))
            .environment(Arc::new(|_: &str| None))
            .build()
            .unwrap();

        strategy.destroy();
        assert_eq!(*events.lock().unwrap(), vec!["update:DOWN", "shutdown"]);
    }

    #[test]
    fn test_start_without_registration_never_sets_status() {
        let events = Events::default();
        let app = application(vec![]);
        let client = Arc::new(ScriptedClient::new(Some(app), Arc::clone(&events)));
        let status_before = client.manager.info().status;
        let strategy = EurekaOneDiscoveryStrategyBuilder::new()
            .eureka_client(Some(Arc::clone(&client) as Arc<dyn EurekaClient>))
            .discovery_node(Some(local_node()))
            .status_change_strategy(Arc::new(RecordingStrategy {
                events: Arc::clone(&events),
            }))
            .properties(Properties::from([(
                "self-registration".to_string(),
                PropertyValue::Bool(false),
            )]))
            .environment(Arc::new(|_: &str| None))
            .build()
            .unwrap();

        assert!(!strategy.should_register());
        strategy.start().unwrap();
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(client.manager.info().status, status_before);
    }

    #[test]
    fn test_skipped_verification_does_not_query() {
        let client = Arc::new(ScriptedClient::new(None, Events::default()));
        let strategy = strategy(
            Arc::clone(&client),
            &[(
                "skip-eureka-registration-verification",
                PropertyValue::Bool(true),
            )],
            "dev",
        );

        strategy.start().unwrap();
        assert_eq!(client.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_option_fails_construction() {
        let client = Arc::new(ScriptedClient::new(None, Events::default()));
        let result = EurekaOneDiscoveryStrategyBuilder::new()
            .eureka_client(Some(client))
            .properties(Properties::from([(
                "self-registration".to_string(),
                PropertyValue::from("maybe"),
            )]))
            .environment(Arc::new(|_: &str| None))
            .build();

        assert!(matches!(result, Err(DiscoveryError::InvalidProperty { .. })));
    }

    const OFFLINE_METADATA_URL: &str = "http://127.0.0.1:1/latest/meta-data/";

    fn plugin_properties(entries: &[(&str, PropertyValue)]) -> Properties {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn plugin_source(properties: &Properties) -> ConfigSource {
        let env: Environment = Arc::new(|_: &str| None);
        let lookup = PropertyLookup::new(properties, &env);
        ConfigSource::load(false, DEFAULT_NAMESPACE, &lookup, properties, None).unwrap()
    }

    #[test]
    fn test_plugin_options_stay_out_of_client_properties() {
        let properties = plugin_properties(&[
            ("self-registration", PropertyValue::Bool(true)),
            ("name", PropertyValue::from("cluster-a")),
            ("datacenter", PropertyValue::from("generic")),
            ("use-metadata-for-host-and-port", PropertyValue::Bool(true)),
            ("skip-eureka-registration-verification", PropertyValue::Bool(true)),
            ("serviceUrl.default", PropertyValue::from("http://registry:8080/eureka/v2/")),
            ("registration.enabled", PropertyValue::Bool(true)),
        ]);
        let source = plugin_source(&properties);
        let ConfigSource::Plugin {
            instance,
            client,
            datacenter,
            app_name,
        } = &source
        else {
            panic!("plugin properties must not load a configuration resource");
        };

        for definition in HZ_PROPERTY_DEFINITIONS {
            let key = format!("{DEFAULT_NAMESPACE}.{}", definition.key);
            assert_eq!(client.get(&key), None, "{key} leaked into client settings");
        }
        assert_eq!(
            client.get("hazelcast.serviceUrl.default"),
            Some("http://registry:8080/eureka/v2/")
        );
        assert_eq!(instance.get("hazelcast.name"), Some("cluster-a"));
        assert_eq!(app_name, "cluster-a");
        assert_eq!(datacenter, "generic");

        let config = source.client_config(DEFAULT_NAMESPACE, true).unwrap();
        assert!(config.register_with_eureka);
        assert_eq!(config.ordered_service_urls(), vec!["http://registry:8080/eureka/v2/"]);
        let config = source.client_config(DEFAULT_NAMESPACE, false).unwrap();
        assert!(!config.register_with_eureka);
    }

    #[test]
    fn test_plugin_registration_switch_overrides_policy() {
        let properties = plugin_properties(&[
            ("serviceUrl.default", PropertyValue::from("http://registry:8080/eureka/v2/")),
            ("registration.enabled", PropertyValue::Bool(false)),
        ]);
        let config = plugin_source(&properties)
            .client_config(DEFAULT_NAMESPACE, true)
            .unwrap();
        assert!(!config.register_with_eureka);
    }

    #[test]
    fn test_datacenter_selects_instance_config() {
        let cases = [
            (Some("Cloud"), DataCenterName::Amazon),
            (Some(" cloud "), DataCenterName::Amazon),
            (Some("generic"), DataCenterName::MyOwn),
            (None, DataCenterName::MyOwn),
        ];
        for (datacenter, expected) in cases {
            let mut properties = plugin_properties(&[
                ("amazon.metadataUrl", PropertyValue::from(OFFLINE_METADATA_URL)),
                ("hostname", PropertyValue::from("node-1")),
            ]);
            if let Some(datacenter) = datacenter {
                properties.insert("datacenter".to_string(), PropertyValue::from(datacenter));
            }

            let config = plugin_source(&properties)
                .instance_config(DEFAULT_NAMESPACE, Some(local_node()))
                .unwrap();
            assert_eq!(config.data_center_info().name, expected, "datacenter {datacenter:?}");
            assert_eq!(config.ip_address(), "10.0.0.1");
        }
    }

    #[test]
    fn test_resource_datacenter_is_namespaced() {
        let resource: ConfigProperties = [
            ("cluster.datacenter", "CLOUD"),
            ("cluster.amazon.metadataUrl", OFFLINE_METADATA_URL),
            ("hazelcast.datacenter", "generic"),
        ]
        .into_iter()
        .collect();
        let source = ConfigSource::Resource(resource);

        let cloud = source.instance_config("cluster", None).unwrap();
        assert_eq!(cloud.data_center_info().name, DataCenterName::Amazon);
        let generic = source.instance_config("hazelcast", None).unwrap();
        assert_eq!(generic.data_center_info().name, DataCenterName::MyOwn);
    }
}
