//! End-to-end discovery against the in-memory registry

mod common;

use common::{APP_NAME, init_tracing, member, no_environment, node, registered};
use eureka_client::memory::Operation;
use eureka_client::{ConfigProperties, Error as ClientError, InstanceInfo, InstanceStatus, MemoryRegistry};
use eureka_discovery::metadata::{HAZELCAST_GROUP_NAME, HAZELCAST_HOST, HAZELCAST_PORT};
use eureka_discovery::{
    DiscoveryNode, DiscoveryStrategy, EurekaOneDiscoveryStrategyBuilder, Properties, PropertyValue,
};
use std::sync::Arc;

fn metadata_mode() -> Vec<(&'static str, PropertyValue)> {
    vec![("use-metadata-for-host-and-port", PropertyValue::Bool(true))]
}

fn sorted_addresses(nodes: &[DiscoveryNode]) -> Vec<String> {
    let mut addresses: Vec<String> = nodes
        .iter()
        .map(|n| n.private_address().to_string())
        .collect();
    addresses.sort();
    addresses
}

#[test]
fn test_members_find_each_other_through_metadata() -> anyhow::Result<()> {
    init_tracing();
    let registry = MemoryRegistry::new();

    let a = member(&registry, node("10.0.0.1", 5701), "g1", &metadata_mode());
    let b = member(&registry, node("10.0.0.2", 5702), "g1", &metadata_mode());
    let c = member(&registry, node("10.0.0.3", 5703), "g2", &metadata_mode());
    for strategy in [&a, &b, &c] {
        strategy.start()?;
    }

    let published = registered(&registry)
        .into_iter()
        .find(|i| i.get_metadata(HAZELCAST_HOST) == Some("10.0.0.1"))
        .expect("Member a did not publish its address");
    assert_eq!(published.get_metadata(HAZELCAST_PORT), Some("5701"));
    assert_eq!(published.get_metadata(HAZELCAST_GROUP_NAME), Some("g1"));
    assert_eq!(published.status, InstanceStatus::Up);

    assert_eq!(
        sorted_addresses(&b.discover_nodes()?),
        vec!["10.0.0.1:5701", "10.0.0.2:5702"]
    );
    assert_eq!(sorted_addresses(&c.discover_nodes()?), vec!["10.0.0.3:5703"]);

    a.destroy();
    assert_eq!(sorted_addresses(&b.discover_nodes()?), vec!["10.0.0.2:5702"]);

    b.destroy();
    c.destroy();
    assert!(registered(&registry).is_empty());
    Ok(())
}

#[test]
fn test_member_registers_its_cluster_address() -> anyhow::Result<()> {
    init_tracing();
    let registry = MemoryRegistry::new();
    let strategy = member(&registry, node("10.0.0.1", 5701), "dev", &[]);

    let instances = registered(&registry);
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].app, APP_NAME.to_uppercase());
    assert_eq!(instances[0].ip_addr, "10.0.0.1");
    assert_eq!(instances[0].port.port, 5701);
    assert_eq!(instances[0].status, InstanceStatus::Starting);

    strategy.start()?;
    assert_eq!(registered(&registry)[0].status, InstanceStatus::Up);

    let nodes = strategy.discover_nodes()?;
    assert_eq!(sorted_addresses(&nodes), vec!["10.0.0.1:5701"]);

    strategy.destroy();
    assert!(matches!(
        registry.operations().as_slice(),
        [.., Operation::Register { status: InstanceStatus::Down, .. }, Operation::Cancel { .. }]
    ));
    Ok(())
}

#[test]
fn test_lookup_only_member_never_registers() -> anyhow::Result<()> {
    init_tracing();
    let registry = MemoryRegistry::new();
    let mut peer = InstanceInfo::new(APP_NAME, "peer-1");
    peer.ip_addr = "10.0.0.9".to_string();
    peer.port.port = 5701;
    peer.status = InstanceStatus::Up;
    registry.put_instance(peer);

    let strategy = member(
        &registry,
        node("10.0.0.1", 5701),
        "dev",
        &[("self-registration", PropertyValue::Bool(false))],
    );
    assert!(!strategy.should_register());

    strategy.start()?;
    assert_eq!(sorted_addresses(&strategy.discover_nodes()?), vec!["10.0.0.9:5701"]);
    strategy.destroy();

    assert!(
        registry
            .operations()
            .iter()
            .all(|op| matches!(op, Operation::GetApplication { .. }))
    );
    Ok(())
}

#[test]
fn test_transient_registry_failure_is_retried() -> anyhow::Result<()> {
    init_tracing();
    let registry = MemoryRegistry::new();
    let strategy = member(&registry, node("10.0.0.1", 5701), "dev", &[]);
    strategy.start()?;

    registry.fail_next(ClientError::UnexpectedStatus {
        status: 503,
        url: "memory://registry/apps/HAZELCAST-TEST".to_string(),
    });
    assert_eq!(strategy.discover_nodes()?.len(), 1);

    strategy.destroy();
    Ok(())
}

#[test]
fn test_fatal_registry_failure_is_reported() -> anyhow::Result<()> {
    init_tracing();
    let registry = MemoryRegistry::new();
    let strategy = member(&registry, node("10.0.0.1", 5701), "dev", &[]);
    strategy.start()?;

    registry.fail_next(ClientError::Fatal("registry corrupted".to_string()));
    let err = strategy.discover_nodes().unwrap_err();
    assert!(err.is_fatal());

    strategy.destroy();
    Ok(())
}

#[test]
fn test_environment_overrides_plugin_properties() {
    init_tracing();
    let registry = MemoryRegistry::new();
    let strategy = EurekaOneDiscoveryStrategyBuilder::new()
        .discovery_node(Some(node("10.0.0.1", 5701)))
        .properties(common::plugin_properties(&[(
            "self-registration",
            PropertyValue::Bool(true),
        )]))
        .transport_client_factory(Some(Arc::new(registry.clone())))
        .environment(Arc::new(|key: &str| {
            (key == "HAZELCAST_EUREKAONE_SELF_REGISTRATION").then(|| "false".to_string())
        }))
        .build()
        .expect("Failed to build strategy");

    assert!(!strategy.should_register());
    assert!(registered(&registry).is_empty());
    strategy.destroy();
}

#[test]
fn test_configuration_resource_from_file() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("eureka-client.properties");
    std::fs::write(
        &path,
        "cluster.name=from-resource\n\
         cluster.serviceUrl.default=memory://registry/\n\
         cluster.lease.renewalInterval=10\n",
    )?;

    let registry = MemoryRegistry::new();
    let strategy = EurekaOneDiscoveryStrategyBuilder::new()
        .discovery_node(Some(node("10.0.0.1", 5701)))
        .properties(Properties::from([(
            "namespace".to_string(),
            PropertyValue::from("cluster"),
        )]))
        .config_properties(ConfigProperties::from_file(&path)?)
        .transport_client_factory(Some(Arc::new(registry.clone())))
        .environment(no_environment())
        .build()?;

    assert_eq!(strategy.namespace(), "cluster");
    let app = registry
        .application("from-resource")
        .expect("Member not registered under the resource's name");
    assert_eq!(app.instances[0].lease_info.renewal_interval_in_secs, 10);

    strategy.destroy();
    Ok(())
}
