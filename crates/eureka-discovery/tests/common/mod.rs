//! Common test utilities

#![allow(dead_code)]

use eureka_client::{InstanceInfo, MemoryRegistry};
use eureka_discovery::{
    Address, DiscoveryNode, EurekaOneDiscoveryStrategy, EurekaOneDiscoveryStrategyBuilder,
    Properties, PropertyValue,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Application name shared by the test members
pub const APP_NAME: &str = "hazelcast-test";

/// Route test logs through the test harness writer
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Local member at `host:port`
pub fn node(host: &str, port: u16) -> DiscoveryNode {
    DiscoveryNode::new(Address::new(host, port), HashMap::new())
}

/// Plugin properties pointing the member at the in-memory registry
pub fn plugin_properties(extra: &[(&str, PropertyValue)]) -> Properties {
    let mut properties = Properties::from([
        (
            "use-classpath-eureka-client-props".to_string(),
            PropertyValue::Bool(false),
        ),
        ("name".to_string(), PropertyValue::from(APP_NAME)),
        (
            "serviceUrl.default".to_string(),
            PropertyValue::from("memory://registry/"),
        ),
    ]);
    for (key, value) in extra {
        properties.insert(key.to_string(), value.clone());
    }
    properties
}

/// Environment without any overrides
pub fn no_environment() -> eureka_discovery::properties::Environment {
    Arc::new(|_: &str| None)
}

/// Member registering with `registry` under `group`
pub fn member(
    registry: &MemoryRegistry,
    local: DiscoveryNode,
    group: &str,
    extra: &[(&str, PropertyValue)],
) -> EurekaOneDiscoveryStrategy {
    EurekaOneDiscoveryStrategyBuilder::new()
        .discovery_node(Some(local))
        .properties(plugin_properties(extra))
        .group_name(Some(group.to_string()))
        .transport_client_factory(Some(Arc::new(registry.clone())))
        .environment(no_environment())
        .build()
        .expect("Failed to build strategy")
}

/// Instances registered under the test application
pub fn registered(registry: &MemoryRegistry) -> Vec<InstanceInfo> {
    registry
        .application(APP_NAME)
        .map(|app| app.instances)
        .unwrap_or_default()
}
