//! In-memory registry
//!
//! [`MemoryRegistry`] behaves like a single Eureka server held in process
//! memory. It plugs in as a [`TransportClientFactory`], so a
//! [`DiscoveryClient`](crate::DiscoveryClient) can run against it without a
//! network. Failures can be scheduled to exercise retry paths.

use crate::client_config::EurekaClientConfig;
use crate::error::{Error, Result};
use crate::models::{Application, InstanceInfo, InstanceStatus};
use crate::transport::{EurekaHttpClient, HeartbeatOutcome, TransportClientFactory};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry operation recorded by [`MemoryRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Instance registered, with the status it carried
    Register {
        /// Application name
        app: String,
        /// Instance id
        id: String,
        /// Registered status
        status: InstanceStatus,
    },
    /// Registration cancelled
    Cancel {
        /// Application name
        app: String,
        /// Instance id
        id: String,
    },
    /// Lease renewed
    Heartbeat {
        /// Application name
        app: String,
        /// Instance id
        id: String,
    },
    /// Application looked up
    GetApplication {
        /// Application name
        app: String,
    },
}

#[derive(Default)]
struct State {
    applications: HashMap<String, Application>,
    operations: Vec<Operation>,
    failures: VecDeque<Error>,
}

impl State {
    /// Remove an instance, dropping its application once it is empty
    fn remove_instance(&mut self, app_name: &str, id: &str) -> Option<InstanceInfo> {
        let key = app_name.to_uppercase();
        let app = self.applications.get_mut(&key)?;
        let removed = app.remove_instance(id);
        if app.instances.is_empty() {
            self.applications.remove(&key);
        }
        removed
    }
}

/// Shared in-memory registry
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<State>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an instance directly, bypassing any client
    pub fn put_instance(&self, instance: InstanceInfo) {
        self.state()
            .applications
            .entry(instance.app.clone())
            .or_insert_with(|| Application::new(&instance.app))
            .add_instance(instance);
    }

    /// Current view of an application
    pub fn application(&self, app_name: &str) -> Option<Application> {
        self.state()
            .applications
            .get(&app_name.to_uppercase())
            .cloned()
    }

    /// Current record of one instance
    pub fn instance(&self, app_name: &str, id: &str) -> Option<InstanceInfo> {
        self.application(app_name)
            .and_then(|app| app.instance_by_id(id).cloned())
    }

    /// Drop an instance as if its lease expired
    pub fn evict(&self, app_name: &str, id: &str) -> Option<InstanceInfo> {
        self.state().remove_instance(app_name, id)
    }

    /// Operations received so far, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.state().operations.clone()
    }

    /// Fail the next request with `error`. Scheduled failures are consumed
    /// in order, one per request.
    pub fn fail_next(&self, error: Error) {
        self.state().failures.push_back(error);
    }

    fn begin(&self, operation: Operation) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.operations.push(operation);
        Ok(state)
    }
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryRegistry")
            .field("applications", &state.applications.len())
            .field("operations", &state.operations.len())
            .finish()
    }
}

impl TransportClientFactory for MemoryRegistry {
    fn new_client(
        &self,
        service_url: &str,
        _config: &EurekaClientConfig,
    ) -> Result<Box<dyn EurekaHttpClient>> {
        Ok(Box::new(MemoryTransport {
            registry: self.clone(),
            service_url: service_url.to_string(),
        }))
    }
}

struct MemoryTransport {
    registry: MemoryRegistry,
    service_url: String,
}

impl EurekaHttpClient for MemoryTransport {
    fn service_url(&self) -> &str {
        &self.service_url
    }

    fn register(&self, info: &InstanceInfo) -> Result<()> {
        let mut state = self.registry.begin(Operation::Register {
            app: info.app.clone(),
            id: info.id().to_string(),
            status: info.status,
        })?;
        let mut stored = info.clone();
        stored.dirty = false;
        stored.last_updated_timestamp = Utc::now().timestamp_millis();
        state
            .applications
            .entry(info.app.clone())
            .or_insert_with(|| Application::new(&info.app))
            .add_instance(stored);
        Ok(())
    }

    fn cancel(&self, app_name: &str, id: &str) -> Result<()> {
        let mut state = self.registry.begin(Operation::Cancel {
            app: app_name.to_string(),
            id: id.to_string(),
        })?;
        state.remove_instance(app_name, id);
        Ok(())
    }

    fn send_heartbeat(&self, info: &InstanceInfo) -> Result<HeartbeatOutcome> {
        let state = self.registry.begin(Operation::Heartbeat {
            app: info.app.clone(),
            id: info.id().to_string(),
        })?;
        let known = state
            .applications
            .get(&info.app)
            .is_some_and(|app| app.instance_by_id(info.id()).is_some());
        Ok(if known {
            HeartbeatOutcome::Renewed
        } else {
            HeartbeatOutcome::NotFound
        })
    }

    fn get_application(&self, app_name: &str) -> Result<Option<Application>> {
        let app_name = app_name.to_uppercase();
        let state = self.registry.begin(Operation::GetApplication {
            app: app_name.clone(),
        })?;
        Ok(state
            .applications
            .get(&app_name)
            .filter(|app| !app.instances.is_empty())
            .cloned())
    }
}
