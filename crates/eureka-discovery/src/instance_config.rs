//! Instance configuration tied to the local cluster member

use crate::cluster::DiscoveryNode;
use eureka_client::{DataCenterInfo, EurekaInstanceConfig};
use std::collections::HashMap;
use uuid::Uuid;

/// Wraps a registry instance configuration, taking identity and address
/// from the local member.
///
/// Every construction draws a fresh random instance id, so restarted
/// members never collide with their previous registration. When a local
/// member is known its private address replaces the configured IP and port.
#[derive(Debug)]
pub struct DelegatingInstanceConfig {
    delegate: Box<dyn EurekaInstanceConfig>,
    local_node: Option<DiscoveryNode>,
    app_name: Option<String>,
    instance_id: String,
}

impl DelegatingInstanceConfig {
    /// Wrap `delegate` for the optional local member
    pub fn new(delegate: Box<dyn EurekaInstanceConfig>, local_node: Option<DiscoveryNode>) -> Self {
        Self {
            delegate,
            local_node,
            app_name: None,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Replace the delegate's application name
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

impl EurekaInstanceConfig for DelegatingInstanceConfig {
    fn instance_id(&self) -> Option<String> {
        Some(self.instance_id.clone())
    }

    fn app_name(&self) -> String {
        self.app_name
            .clone()
            .unwrap_or_else(|| self.delegate.app_name())
    }

    fn app_group_name(&self) -> Option<String> {
        self.delegate.app_group_name()
    }

    fn is_instance_enabled_on_init(&self) -> bool {
        self.delegate.is_instance_enabled_on_init()
    }

    fn non_secure_port(&self) -> i32 {
        match &self.local_node {
            Some(node) => i32::from(node.private_address().port),
            None => self.delegate.non_secure_port(),
        }
    }

    fn secure_port(&self) -> i32 {
        self.delegate.secure_port()
    }

    fn is_non_secure_port_enabled(&self) -> bool {
        self.delegate.is_non_secure_port_enabled()
    }

    fn is_secure_port_enabled(&self) -> bool {
        self.delegate.is_secure_port_enabled()
    }

    fn lease_renewal_interval_secs(&self) -> i32 {
        self.delegate.lease_renewal_interval_secs()
    }

    fn lease_expiration_duration_secs(&self) -> i32 {
        self.delegate.lease_expiration_duration_secs()
    }

    fn virtual_host_name(&self) -> String {
        self.delegate.virtual_host_name()
    }

    fn secure_virtual_host_name(&self) -> String {
        self.delegate.secure_virtual_host_name()
    }

    fn asg_name(&self) -> Option<String> {
        self.delegate.asg_name()
    }

    fn host_name(&self, refresh: bool) -> String {
        self.delegate.host_name(refresh)
    }

    fn ip_address(&self) -> String {
        match &self.local_node {
            Some(node) => node.private_address().host.clone(),
            None => self.delegate.ip_address(),
        }
    }

    fn metadata_map(&self) -> HashMap<String, String> {
        self.delegate.metadata_map()
    }

    fn data_center_info(&self) -> DataCenterInfo {
        self.delegate.data_center_info()
    }

    fn status_page_url_path(&self) -> String {
        self.delegate.status_page_url_path()
    }

    fn status_page_url(&self) -> Option<String> {
        self.delegate.status_page_url()
    }

    fn home_page_url_path(&self) -> String {
        self.delegate.home_page_url_path()
    }

    fn home_page_url(&self) -> Option<String> {
        self.delegate.home_page_url()
    }

    fn health_check_url_path(&self) -> String {
        self.delegate.health_check_url_path()
    }

    fn health_check_url(&self) -> Option<String> {
        self.delegate.health_check_url()
    }

    fn secure_health_check_url(&self) -> Option<String> {
        self.delegate.secure_health_check_url()
    }

    fn namespace(&self) -> String {
        self.delegate.namespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Address;
    use eureka_client::{ConfigProperties, DataCenterInstanceConfig};

    fn delegate() -> Box<dyn EurekaInstanceConfig> {
        let properties: ConfigProperties = [
            ("hazelcast.name", "from-config"),
            ("hazelcast.instanceId", "configured-id"),
            ("hazelcast.ipAddress", "192.168.1.1"),
            ("hazelcast.port", "8080"),
            ("hazelcast.hostname", "node-1"),
        ]
        .into_iter()
        .collect();
        Box::new(DataCenterInstanceConfig::new("hazelcast", &properties).unwrap())
    }

    #[test]
    fn test_local_node_overrides_address() {
        let node = DiscoveryNode::new(Address::new("10.0.0.1", 5701), HashMap::new());
        let config = DelegatingInstanceConfig::new(delegate(), Some(node));

        assert_eq!(config.ip_address(), "10.0.0.1");
        assert_eq!(config.non_secure_port(), 5701);
        assert_eq!(config.app_name(), "from-config");
        assert_eq!(config.host_name(false), "node-1");
    }

    #[test]
    fn test_without_local_node_delegates_address() {
        let config = DelegatingInstanceConfig::new(delegate(), None);

        assert_eq!(config.ip_address(), "192.168.1.1");
        assert_eq!(config.non_secure_port(), 8080);
    }

    #[test]
    fn test_instance_id_is_fresh_uuid() {
        let first = DelegatingInstanceConfig::new(delegate(), None);
        let second = DelegatingInstanceConfig::new(delegate(), None);

        let id = first.instance_id().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, "configured-id");
        assert_eq!(first.instance_id(), first.instance_id());
        assert_ne!(first.instance_id(), second.instance_id());
    }

    #[test]
    fn test_app_name_override() {
        let config = DelegatingInstanceConfig::new(delegate(), None).with_app_name("from-property");
        assert_eq!(config.app_name(), "from-property");
    }
}
