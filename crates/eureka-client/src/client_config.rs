//! Configuration of the registry client

use crate::error::{Error, Result};
use crate::properties::ConfigProperties;
use std::collections::BTreeMap;
use std::time::Duration;

/// Zone whose service URLs are used when no other zone matches
pub const DEFAULT_ZONE: &str = "default";

/// HTTP proxy used to reach the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional user name
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL understood by the HTTP client
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Registry client settings
#[derive(Debug, Clone, PartialEq)]
pub struct EurekaClientConfig {
    /// Property namespace the settings were read from
    pub namespace: String,
    /// Service URLs per zone
    pub service_urls: BTreeMap<String, Vec<String>>,
    /// Preferred zone, its URLs are tried first
    pub zone: Option<String>,
    /// Whether this client registers the local instance
    pub register_with_eureka: bool,
    /// Whether this client reads the registry
    pub fetch_registry: bool,
    /// Prefer registry servers in the same zone
    pub prefer_same_zone: bool,
    /// Read timeout for registry requests
    pub read_timeout: Duration,
    /// Connect timeout for registry requests
    pub connect_timeout: Duration,
    /// Optional HTTP proxy
    pub proxy: Option<ProxyConfig>,
}

impl Default for EurekaClientConfig {
    fn default() -> Self {
        Self {
            namespace: "eureka".to_string(),
            service_urls: BTreeMap::new(),
            zone: None,
            register_with_eureka: true,
            fetch_registry: true,
            prefer_same_zone: true,
            read_timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
            proxy: None,
        }
    }
}

impl EurekaClientConfig {
    /// Read the settings under `namespace.` from `properties`
    pub fn from_properties(namespace: &str, properties: &ConfigProperties) -> Result<Self> {
        let ns = properties.namespace(namespace);
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            let value = ns.get_i32(key, default.as_secs() as i32)?;
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| Error::invalid_property(ns.key(key), value.to_string()))
        };

        let service_urls = ns
            .with_prefix("serviceUrl")
            .into_iter()
            .map(|(zone, urls)| (zone, split_urls(&urls)))
            .filter(|(_, urls)| !urls.is_empty())
            .collect();

        let proxy = match ns.get("eurekaServer.proxyHost") {
            Some(host) => {
                let port = ns.get_i32("eurekaServer.proxyPort", 80)?;
                Some(ProxyConfig {
                    host: host.to_string(),
                    port: u16::try_from(port).map_err(|_| {
                        Error::invalid_property(ns.key("eurekaServer.proxyPort"), port.to_string())
                    })?,
                    username: ns.get("eurekaServer.proxyUserName").map(str::to_string),
                    password: ns.get("eurekaServer.proxyPassword").map(str::to_string),
                })
            }
            None => None,
        };

        Ok(Self {
            namespace: namespace.to_string(),
            service_urls,
            zone: ns.get("zone").map(str::to_string),
            register_with_eureka: ns.get_bool("registration.enabled", defaults.register_with_eureka)?,
            fetch_registry: ns.get_bool("shouldFetchRegistry", defaults.fetch_registry)?,
            prefer_same_zone: ns.get_bool("preferSameZone", defaults.prefer_same_zone)?,
            read_timeout: secs("eurekaServer.readTimeout", defaults.read_timeout)?,
            connect_timeout: secs("eurekaServer.connectTimeout", defaults.connect_timeout)?,
            proxy,
        })
    }

    /// Override whether the local instance registers
    pub fn with_registration(mut self, enabled: bool) -> Self {
        self.register_with_eureka = enabled;
        self
    }

    /// Add service URLs for a zone
    pub fn with_service_urls(mut self, zone: impl Into<String>, urls: &[&str]) -> Self {
        self.service_urls
            .entry(zone.into())
            .or_default()
            .extend(urls.iter().map(|u| u.to_string()));
        self
    }

    /// Service URLs in the order they are tried.
    ///
    /// The preferred zone comes first when same-zone preference is on,
    /// followed by the default zone and then every other zone. Duplicates
    /// are dropped.
    pub fn ordered_service_urls(&self) -> Vec<String> {
        let mut zones: Vec<&str> = Vec::new();
        if let Some(zone) = self.zone.as_deref().filter(|_| self.prefer_same_zone) {
            zones.push(zone);
        }
        zones.push(DEFAULT_ZONE);
        zones.extend(self.service_urls.keys().map(String::as_str));

        let mut urls: Vec<String> = Vec::new();
        for zone in zones {
            for url in self.service_urls.get(zone).into_iter().flatten() {
                if !urls.contains(url) {
                    urls.push(url.clone());
                }
            }
        }
        urls
    }
}

fn split_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}
