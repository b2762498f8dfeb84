//! Status change policies
//!
//! A policy decides whether the member registers itself and how a lifecycle
//! status reaches the registry.

use crate::cluster::Address;
use crate::error::{DiscoveryError, Result};
use crate::metadata::{HAZELCAST_GROUP_NAME, HAZELCAST_HOST, HAZELCAST_PORT};
use eureka_client::{ApplicationInfoManager, InstanceStatus};
use tracing::debug;

/// Policy applied on lifecycle status changes
pub trait StatusChangeStrategy: Send + Sync {
    /// Apply `status` to the local instance record
    fn update(&self, manager: &ApplicationInfoManager, status: InstanceStatus);

    /// Whether the member registers itself with the registry
    fn should_register(&self) -> bool;
}

/// Built-in policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdater {
    /// Never registers, status changes are ignored
    Disabled,
    /// Registers and forwards every status change
    Default,
    /// Publishes the cluster address in metadata before forwarding
    Metadata(MetadataUpdater),
}

impl StatusChangeStrategy for StatusUpdater {
    fn update(&self, manager: &ApplicationInfoManager, status: InstanceStatus) {
        match self {
            StatusUpdater::Disabled => {
                debug!("Status change to {} not forwarded", status);
            }
            StatusUpdater::Default => manager.set_instance_status(status),
            StatusUpdater::Metadata(updater) => updater.update(manager, status),
        }
    }

    fn should_register(&self) -> bool {
        match self {
            StatusUpdater::Disabled => false,
            StatusUpdater::Default => true,
            StatusUpdater::Metadata(updater) => updater.should_register(),
        }
    }
}

/// Publishes the member's cluster address and group in instance metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdater {
    address: Address,
    self_registration: bool,
    group_name: String,
}

impl MetadataUpdater {
    /// Create an updater for the member reachable at `address`
    pub fn new(address: Address, self_registration: bool, group_name: impl Into<String>) -> Result<Self> {
        let group_name = group_name.into();
        if group_name.trim().is_empty() {
            return Err(DiscoveryError::precondition("group name must not be empty"));
        }
        if address.host.trim().is_empty() || address.port == 0 {
            return Err(DiscoveryError::precondition(format!(
                "local address {} cannot be published",
                address
            )));
        }

        Ok(Self {
            address,
            self_registration,
            group_name,
        })
    }

    /// Group name published with the address
    pub fn group_name(&self) -> &str {
        &self.group_name
    }
}

impl StatusChangeStrategy for MetadataUpdater {
    fn update(&self, manager: &ApplicationInfoManager, status: InstanceStatus) {
        if !self.should_register() {
            return;
        }

        manager.update_info(|info| {
            info.metadata
                .insert(HAZELCAST_PORT.to_string(), self.address.port.to_string());
            info.metadata
                .insert(HAZELCAST_HOST.to_string(), self.address.host.clone());
            info.metadata
                .insert(HAZELCAST_GROUP_NAME.to_string(), self.group_name.clone());
        });
        manager.set_instance_status(status);
    }

    fn should_register(&self) -> bool {
        self.self_registration
    }
}
