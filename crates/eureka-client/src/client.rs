//! Registry client
//!
//! [`DiscoveryClient`] registers the local instance, keeps its lease alive
//! from a background heartbeat thread, pushes status changes and looks up
//! applications. Requests fail over across the configured service URLs in
//! order.

use crate::client_config::EurekaClientConfig;
use crate::error::{Error, Result};
use crate::info_manager::{ApplicationInfoManager, StatusChangeEvent};
use crate::models::Application;
use crate::transport::{
    EurekaHttpClient, HeartbeatOutcome, ReqwestTransportFactory, TransportClientFactory,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Id under which the client listens to status changes
const STATUS_LISTENER_ID: &str = "discovery-client";

/// Registry client as seen by discovery code
pub trait EurekaClient: Send + Sync {
    /// Fetch an application by name, `None` if the registry does not know it
    fn get_application(&self, app_name: &str) -> Result<Option<Application>>;

    /// Manager of the local instance record
    fn application_info_manager(&self) -> Arc<ApplicationInfoManager>;

    /// Unregister and stop background work. Calling it twice is harmless.
    fn shutdown(&self);
}

struct Inner {
    manager: Arc<ApplicationInfoManager>,
    config: EurekaClientConfig,
    transports: Vec<Box<dyn EurekaHttpClient>>,
    shut_down: AtomicBool,
}

impl Inner {
    /// Run `op` against each server in order until one succeeds
    fn execute<T>(
        &self,
        name: &str,
        op: impl Fn(&dyn EurekaHttpClient) -> Result<T>,
    ) -> Result<T> {
        let mut last = None;
        for transport in &self.transports {
            match op(transport.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("{} against {} failed: {}", name, transport.service_url(), e);
                    last = Some(e);
                }
            }
        }
        match last {
            Some(last) => Err(Error::AllServersFailed {
                attempted: self.transports.len(),
                last: Box::new(last),
            }),
            None => Err(Error::NoServiceUrls),
        }
    }

    fn register(&self) -> Result<()> {
        let info = self.manager.info();
        info!("Registering {} with the registry", info);
        self.execute("register", |t| t.register(&info))?;
        self.manager.unset_dirty(info.last_dirty_timestamp);
        Ok(())
    }

    fn renew(&self) -> Result<()> {
        let info = self.manager.info();
        match self.execute("heartbeat", |t| t.send_heartbeat(&info))? {
            HeartbeatOutcome::Renewed => Ok(()),
            HeartbeatOutcome::NotFound => {
                info!("Registry lost {}, registering again", info.id());
                self.register()
            }
        }
    }

    fn cancel(&self) -> Result<()> {
        let info = self.manager.info();
        info!("Unregistering {}", info);
        self.execute("cancel", |t| t.cancel(&info.app, info.id()))
    }

    fn on_status_change(&self, event: &StatusChangeEvent) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        debug!(
            "Pushing status change {} -> {}",
            event.previous, event.current
        );
        if let Err(e) = self.register() {
            warn!("Cannot push status {} to the registry: {}", event.current, e);
        }
    }
}

struct Heartbeat {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Eureka registry client
pub struct DiscoveryClient {
    inner: Arc<Inner>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl DiscoveryClient {
    /// Create a client using the HTTP transport
    pub fn new(manager: Arc<ApplicationInfoManager>, config: EurekaClientConfig) -> Result<Self> {
        Self::with_transport_factory(manager, config, &ReqwestTransportFactory)
    }

    /// Create a client using a custom transport.
    ///
    /// With registration enabled, the instance is registered immediately and
    /// a heartbeat thread is started. A failed initial registration is only
    /// logged; the heartbeat registers again once the registry answers.
    pub fn with_transport_factory(
        manager: Arc<ApplicationInfoManager>,
        config: EurekaClientConfig,
        factory: &dyn TransportClientFactory,
    ) -> Result<Self> {
        let urls = config.ordered_service_urls();
        if urls.is_empty() {
            return Err(Error::NoServiceUrls);
        }
        let transports = urls
            .iter()
            .map(|url| factory.new_client(url, &config))
            .collect::<Result<Vec<_>>>()?;

        let inner = Arc::new(Inner {
            manager,
            config,
            transports,
            shut_down: AtomicBool::new(false),
        });
        let client = Self {
            inner,
            heartbeat: Mutex::new(None),
        };

        if client.inner.config.register_with_eureka {
            client.start_registration()?;
        } else {
            debug!("Registration disabled, client only reads the registry");
        }
        Ok(client)
    }

    fn start_registration(&self) -> Result<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.manager.register_status_change_listener(
            STATUS_LISTENER_ID,
            Arc::new(move |event: &StatusChangeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_status_change(event);
                }
            }),
        );

        if let Err(e) = self.inner.register() {
            warn!("Initial registration failed: {}", e);
        }

        let interval = self.inner.manager.info().lease_info.renewal_interval_in_secs;
        let interval = Duration::from_secs(u64::try_from(interval).unwrap_or(1).max(1));
        let (stop, stopped) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("eureka-heartbeat".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = inner.renew() {
                                warn!("Heartbeat failed: {}", e);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Heartbeat thread stopped");
            })?;

        *self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Heartbeat { stop, handle });
        Ok(())
    }

    /// Renew the lease now instead of waiting for the heartbeat thread
    pub fn renew(&self) -> Result<()> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(Error::Shutdown);
        }
        self.inner.renew()
    }

    /// Whether [`EurekaClient::shutdown`] has run
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl EurekaClient for DiscoveryClient {
    fn get_application(&self, app_name: &str) -> Result<Option<Application>> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(Error::Shutdown);
        }
        if !self.inner.config.fetch_registry {
            debug!("Registry fetching disabled, {} not looked up", app_name);
            return Ok(None);
        }
        self.inner
            .execute("get application", |t| t.get_application(app_name))
    }

    fn application_info_manager(&self) -> Arc<ApplicationInfoManager> {
        Arc::clone(&self.inner.manager)
    }

    fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down registry client");

        self.inner
            .manager
            .unregister_status_change_listener(STATUS_LISTENER_ID);

        let heartbeat = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(heartbeat) = heartbeat {
            let _ = heartbeat.stop.send(());
            if heartbeat.handle.join().is_err() {
                error!("Heartbeat thread panicked");
            }
        }

        if self.inner.config.register_with_eureka {
            if let Err(e) = self.inner.cancel() {
                warn!("Cannot unregister from the registry: {}", e);
            }
        }

        for transport in &self.inner.transports {
            transport.shutdown();
        }
    }
}

impl Drop for DiscoveryClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DiscoveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryClient")
            .field("config", &self.inner.config)
            .field("shut_down", &self.inner.shut_down)
            .finish_non_exhaustive()
    }
}
