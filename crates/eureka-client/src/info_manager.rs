//! Holder of the local instance record
//!
//! [`ApplicationInfoManager`] owns the [`InstanceInfo`] this process
//! publishes and notifies listeners when its status changes. The discovery
//! client listens to push status changes to the registry.

use crate::instance_config::EurekaInstanceConfig;
use crate::models::{InstanceInfo, InstanceStatus, LeaseInfo, PortWrapper};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Status transition of the local instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChangeEvent {
    /// Status before the change
    pub previous: InstanceStatus,
    /// Status after the change
    pub current: InstanceStatus,
}

/// Callback invoked on status transitions
pub type StatusChangeListener = Arc<dyn Fn(&StatusChangeEvent) + Send + Sync>;

impl InstanceInfo {
    /// Build the initial instance record from configuration
    pub fn from_config(config: &dyn EurekaInstanceConfig) -> Self {
        let host_name = config.host_name(false);
        let id = config.instance_id().unwrap_or_else(|| host_name.clone());
        let mut info = InstanceInfo::new(config.app_name(), id);

        let port = config.non_secure_port();
        let secure_port = config.secure_port();
        let http_url = |path: String| format!("http://{}:{}{}", host_name, port, path);
        let https_url = |path: String| format!("https://{}:{}{}", host_name, secure_port, path);

        info.app_group_name = config.app_group_name().map(|g| g.to_uppercase());
        info.ip_addr = config.ip_address();
        info.port = PortWrapper::new(port, config.is_non_secure_port_enabled());
        info.secure_port = PortWrapper::new(secure_port, config.is_secure_port_enabled());
        info.vip_address = Some(config.virtual_host_name());
        info.secure_vip_address = Some(config.secure_virtual_host_name());
        info.asg_name = config.asg_name();
        info.data_center_info = config.data_center_info();
        info.lease_info = LeaseInfo::new(
            config.lease_renewal_interval_secs(),
            config.lease_expiration_duration_secs(),
        );
        info.metadata = config.metadata_map();
        info.home_page_url = Some(
            config
                .home_page_url()
                .unwrap_or_else(|| http_url(config.home_page_url_path())),
        );
        info.status_page_url = Some(
            config
                .status_page_url()
                .unwrap_or_else(|| http_url(config.status_page_url_path())),
        );
        info.health_check_url = Some(
            config
                .health_check_url()
                .unwrap_or_else(|| http_url(config.health_check_url_path())),
        );
        info.secure_health_check_url = config
            .secure_health_check_url()
            .or_else(|| {
                config
                    .is_secure_port_enabled()
                    .then(|| https_url(config.health_check_url_path()))
            });
        info.status = if config.is_instance_enabled_on_init() {
            InstanceStatus::Up
        } else {
            InstanceStatus::Starting
        };
        info.host_name = host_name;
        info
    }
}

/// Owner of the local instance record and its status listeners
pub struct ApplicationInfoManager {
    config: Arc<dyn EurekaInstanceConfig>,
    info: RwLock<InstanceInfo>,
    listeners: Mutex<HashMap<String, StatusChangeListener>>,
}

impl ApplicationInfoManager {
    /// Create a manager around an existing record
    pub fn new(config: Arc<dyn EurekaInstanceConfig>, info: InstanceInfo) -> Self {
        Self {
            config,
            info: RwLock::new(info),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Create a manager with a record built from `config`
    pub fn from_config(config: Arc<dyn EurekaInstanceConfig>) -> Self {
        let info = InstanceInfo::from_config(config.as_ref());
        Self::new(config, info)
    }

    /// Instance configuration the record was built from
    pub fn instance_config(&self) -> Arc<dyn EurekaInstanceConfig> {
        Arc::clone(&self.config)
    }

    /// Snapshot of the current record
    pub fn info(&self) -> InstanceInfo {
        self.info.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Mutate the record in place, marking it dirty
    pub fn update_info<R>(&self, f: impl FnOnce(&mut InstanceInfo) -> R) -> R {
        let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut info);
        info.mark_dirty();
        result
    }

    /// Merge entries into the published metadata
    pub fn register_app_metadata(&self, metadata: HashMap<String, String>) {
        debug!("Registering {} metadata entries", metadata.len());
        self.update_info(|info| info.metadata.extend(metadata));
    }

    /// Clear the dirty flag after a successful push made at `timestamp`
    pub fn unset_dirty(&self, timestamp: i64) {
        self.info
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unset_dirty(timestamp);
    }

    /// Change the instance status, notifying listeners on an actual change
    pub fn set_instance_status(&self, status: InstanceStatus) {
        let previous = {
            let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
            info.set_status(status)
        };
        let Some(previous) = previous else {
            return;
        };

        info!("Instance status changed from {} to {}", previous, status);
        let event = StatusChangeEvent {
            previous,
            current: status,
        };
        // Listeners may call back into the manager, so none of our locks
        // may be held while they run.
        let listeners: Vec<StatusChangeListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Register a listener under `id`, replacing any previous one
    pub fn register_status_change_listener(
        &self,
        id: impl Into<String>,
        listener: StatusChangeListener,
    ) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), listener);
    }

    /// Remove the listener registered under `id`
    pub fn unregister_status_change_listener(&self, id: &str) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

impl std::fmt::Debug for ApplicationInfoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationInfoManager")
            .field("config", &self.config)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
