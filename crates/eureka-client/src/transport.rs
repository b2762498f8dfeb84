//! Transport to a single registry server
//!
//! [`EurekaHttpClient`] speaks the Eureka v2 REST protocol against one
//! service URL. [`TransportClientFactory`] creates one per configured URL,
//! which lets the HTTP layer be replaced, for example by an in-memory
//! registry in tests.

use crate::client_config::EurekaClientConfig;
use crate::error::{Error, Result};
use crate::models::{Application, ApplicationEnvelope, InstanceEnvelope, InstanceInfo};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use tracing::{debug, trace};

/// Outcome of a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Lease renewed
    Renewed,
    /// The registry does not know the instance, it must register again
    NotFound,
}

/// Registry operations against one server
pub trait EurekaHttpClient: Send + Sync {
    /// Service URL this client talks to
    fn service_url(&self) -> &str;

    /// Register an instance
    fn register(&self, info: &InstanceInfo) -> Result<()>;

    /// Remove an instance registration
    fn cancel(&self, app_name: &str, id: &str) -> Result<()>;

    /// Renew the lease of an instance
    fn send_heartbeat(&self, info: &InstanceInfo) -> Result<HeartbeatOutcome>;

    /// Fetch an application, `None` if the registry does not know it
    fn get_application(&self, app_name: &str) -> Result<Option<Application>>;

    /// Release resources held by the client
    fn shutdown(&self) {}
}

/// Creates a transport client per registry server
pub trait TransportClientFactory: Send + Sync {
    /// Create a client for `service_url`
    fn new_client(
        &self,
        service_url: &str,
        config: &EurekaClientConfig,
    ) -> Result<Box<dyn EurekaHttpClient>>;
}

/// Factory for [`ReqwestEurekaHttpClient`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransportFactory;

impl TransportClientFactory for ReqwestTransportFactory {
    fn new_client(
        &self,
        service_url: &str,
        config: &EurekaClientConfig,
    ) -> Result<Box<dyn EurekaHttpClient>> {
        Ok(Box::new(ReqwestEurekaHttpClient::new(service_url, config)?))
    }
}

/// Blocking JSON client for the Eureka v2 REST API
#[derive(Debug)]
pub struct ReqwestEurekaHttpClient {
    http: Client,
    service_url: String,
}

impl ReqwestEurekaHttpClient {
    /// Create a client for `service_url`
    pub fn new(service_url: &str, config: &EurekaClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout);

        if let Some(proxy) = &config.proxy {
            let mut http_proxy = reqwest::Proxy::all(proxy.url())?;
            if let Some(username) = &proxy.username {
                http_proxy =
                    http_proxy.basic_auth(username, proxy.password.as_deref().unwrap_or_default());
            }
            builder = builder.proxy(http_proxy);
        }

        Ok(Self {
            http: builder.build()?,
            service_url: service_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.service_url, path)
    }

    fn expect_success(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Error::UnexpectedStatus {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

impl EurekaHttpClient for ReqwestEurekaHttpClient {
    fn service_url(&self) -> &str {
        &self.service_url
    }

    fn register(&self, info: &InstanceInfo) -> Result<()> {
        let url = self.url(&format!("apps/{}", info.app));
        debug!("POST {} ({})", url, info.id());

        let response = self
            .http
            .post(&url)
            .json(&InstanceEnvelope {
                instance: info.clone(),
            })
            .send()?;
        Self::expect_success(response)?;
        Ok(())
    }

    fn cancel(&self, app_name: &str, id: &str) -> Result<()> {
        let url = self.url(&format!("apps/{}/{}", app_name, id));
        debug!("DELETE {}", url);

        let response = self.http.delete(&url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Instance {} was not registered at {}", id, self.service_url);
            return Ok(());
        }
        Self::expect_success(response)?;
        Ok(())
    }

    fn send_heartbeat(&self, info: &InstanceInfo) -> Result<HeartbeatOutcome> {
        let url = self.url(&format!("apps/{}/{}", info.app, info.id()));
        trace!("PUT {}", url);

        let response = self
            .http
            .put(&url)
            .query(&[
                ("status", info.status.as_str().to_string()),
                ("lastDirtyTimestamp", info.last_dirty_timestamp.to_string()),
            ])
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(HeartbeatOutcome::NotFound);
        }
        Self::expect_success(response)?;
        Ok(HeartbeatOutcome::Renewed)
    }

    fn get_application(&self, app_name: &str) -> Result<Option<Application>> {
        let url = self.url(&format!("apps/{}", app_name.to_uppercase()));
        trace!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ApplicationEnvelope = Self::expect_success(response)?.json()?;
        Ok(Some(envelope.application))
    }
}
