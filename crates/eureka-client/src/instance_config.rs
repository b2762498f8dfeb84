//! Configuration of the locally registered instance
//!
//! [`EurekaInstanceConfig`] describes what this process publishes about
//! itself. Two implementations are provided, selected by data center type:
//! [`DataCenterInstanceConfig`] for generic data centers and
//! [`CloudInstanceConfig`] for Amazon EC2, which additionally reads the EC2
//! instance metadata service.

use crate::error::Result;
use crate::models::{DataCenterInfo, LeaseInfo};
use crate::properties::ConfigProperties;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

/// Properties of the locally registered instance
pub trait EurekaInstanceConfig: Send + Sync + fmt::Debug {
    /// Explicit instance id, `None` lets the registry key on the host name
    fn instance_id(&self) -> Option<String>;
    /// Application name
    fn app_name(&self) -> String;
    /// Application group name
    fn app_group_name(&self) -> Option<String>;
    /// Whether the instance takes traffic as soon as it registers
    fn is_instance_enabled_on_init(&self) -> bool;
    /// Non-secure port
    fn non_secure_port(&self) -> i32;
    /// Secure port
    fn secure_port(&self) -> i32;
    /// Whether the non-secure port is enabled
    fn is_non_secure_port_enabled(&self) -> bool;
    /// Whether the secure port is enabled
    fn is_secure_port_enabled(&self) -> bool;
    /// Heartbeat interval in seconds
    fn lease_renewal_interval_secs(&self) -> i32;
    /// Lease duration in seconds
    fn lease_expiration_duration_secs(&self) -> i32;
    /// Virtual host name (VIP address)
    fn virtual_host_name(&self) -> String;
    /// Secure virtual host name
    fn secure_virtual_host_name(&self) -> String;
    /// Auto scaling group name
    fn asg_name(&self) -> Option<String>;
    /// Host name, re-detected when `refresh` is set
    fn host_name(&self, refresh: bool) -> String;
    /// IP address
    fn ip_address(&self) -> String;
    /// Static metadata published with the instance
    fn metadata_map(&self) -> HashMap<String, String>;
    /// Data center description
    fn data_center_info(&self) -> DataCenterInfo;
    /// Relative status page path
    fn status_page_url_path(&self) -> String;
    /// Absolute status page URL, overrides the path
    fn status_page_url(&self) -> Option<String>;
    /// Relative home page path
    fn home_page_url_path(&self) -> String;
    /// Absolute home page URL, overrides the path
    fn home_page_url(&self) -> Option<String>;
    /// Relative health check path
    fn health_check_url_path(&self) -> String;
    /// Absolute health check URL, overrides the path
    fn health_check_url(&self) -> Option<String>;
    /// Absolute secure health check URL
    fn secure_health_check_url(&self) -> Option<String>;
    /// Property namespace the configuration was read from
    fn namespace(&self) -> String;
}

/// Data center type selecting the instance configuration flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCenterType {
    /// Amazon EC2
    Cloud,
    /// Any other data center
    Generic,
}

impl DataCenterType {
    /// Classify a configured data center name; only `cloud` selects EC2
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("cloud") {
            DataCenterType::Cloud
        } else {
            DataCenterType::Generic
        }
    }

    /// Build the matching instance configuration
    pub fn instance_config(
        self,
        namespace: &str,
        properties: &ConfigProperties,
    ) -> Result<Box<dyn EurekaInstanceConfig>> {
        Ok(match self {
            DataCenterType::Cloud => Box::new(CloudInstanceConfig::new(namespace, properties)?),
            DataCenterType::Generic => {
                Box::new(DataCenterInstanceConfig::new(namespace, properties)?)
            }
        })
    }
}

/// Instance configuration for generic data centers, read from
/// namespace-scoped properties
#[derive(Debug, Clone)]
pub struct DataCenterInstanceConfig {
    namespace: String,
    instance_id: Option<String>,
    app_name: String,
    app_group_name: Option<String>,
    instance_enabled_on_init: bool,
    non_secure_port: i32,
    non_secure_port_enabled: bool,
    secure_port: i32,
    secure_port_enabled: bool,
    lease_renewal_interval_secs: i32,
    lease_expiration_duration_secs: i32,
    virtual_host_name: Option<String>,
    secure_virtual_host_name: Option<String>,
    asg_name: Option<String>,
    host_name: Option<String>,
    ip_address: Option<String>,
    metadata: HashMap<String, String>,
    status_page_url_path: String,
    status_page_url: Option<String>,
    home_page_url_path: String,
    home_page_url: Option<String>,
    health_check_url_path: String,
    health_check_url: Option<String>,
    secure_health_check_url: Option<String>,
}

impl DataCenterInstanceConfig {
    /// Default application name
    pub const DEFAULT_APP_NAME: &'static str = "unknown";

    /// Read the configuration under `namespace.` from `properties`
    pub fn new(namespace: &str, properties: &ConfigProperties) -> Result<Self> {
        let ns = properties.namespace(namespace);
        let owned = |key: &str| ns.get(key).map(str::to_string);

        Ok(Self {
            namespace: namespace.to_string(),
            instance_id: owned("instanceId"),
            app_name: ns.get_string("name", Self::DEFAULT_APP_NAME),
            app_group_name: owned("appGroup"),
            instance_enabled_on_init: ns.get_bool("traffic.enabled", false)?,
            non_secure_port: ns.get_i32("port", 80)?,
            non_secure_port_enabled: ns.get_bool("port.enabled", true)?,
            secure_port: ns.get_i32("securePort", 443)?,
            secure_port_enabled: ns.get_bool("securePort.enabled", false)?,
            lease_renewal_interval_secs: ns
                .get_i32("lease.renewalInterval", LeaseInfo::DEFAULT_RENEWAL_INTERVAL_SECS)?,
            lease_expiration_duration_secs: ns
                .get_i32("lease.duration", LeaseInfo::DEFAULT_DURATION_SECS)?,
            virtual_host_name: owned("vipAddress"),
            secure_virtual_host_name: owned("secureVipAddress"),
            asg_name: owned("asgName"),
            host_name: owned("hostname"),
            ip_address: owned("ipAddress"),
            metadata: ns.with_prefix("metadata").into_iter().collect(),
            status_page_url_path: ns.get_string("statusPageUrlPath", "/Status"),
            status_page_url: owned("statusPageUrl"),
            home_page_url_path: ns.get_string("homePageUrlPath", "/"),
            home_page_url: owned("homePageUrl"),
            health_check_url_path: ns.get_string("healthCheckUrlPath", "/healthcheck"),
            health_check_url: owned("healthCheckUrl"),
            secure_health_check_url: owned("secureHealthCheckUrl"),
        })
    }
}

impl EurekaInstanceConfig for DataCenterInstanceConfig {
    fn instance_id(&self) -> Option<String> {
        self.instance_id.clone()
    }

    fn app_name(&self) -> String {
        self.app_name.clone()
    }

    fn app_group_name(&self) -> Option<String> {
        self.app_group_name.clone()
    }

    fn is_instance_enabled_on_init(&self) -> bool {
        self.instance_enabled_on_init
    }

    fn non_secure_port(&self) -> i32 {
        self.non_secure_port
    }

    fn secure_port(&self) -> i32 {
        self.secure_port
    }

    fn is_non_secure_port_enabled(&self) -> bool {
        self.non_secure_port_enabled
    }

    fn is_secure_port_enabled(&self) -> bool {
        self.secure_port_enabled
    }

    fn lease_renewal_interval_secs(&self) -> i32 {
        self.lease_renewal_interval_secs
    }

    fn lease_expiration_duration_secs(&self) -> i32 {
        self.lease_expiration_duration_secs
    }

    fn virtual_host_name(&self) -> String {
        self.virtual_host_name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host_name(false), self.non_secure_port))
    }

    fn secure_virtual_host_name(&self) -> String {
        self.secure_virtual_host_name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host_name(false), self.secure_port))
    }

    fn asg_name(&self) -> Option<String> {
        self.asg_name.clone()
    }

    fn host_name(&self, _refresh: bool) -> String {
        self.host_name.clone().unwrap_or_else(local_host_name)
    }

    fn ip_address(&self) -> String {
        self.ip_address
            .clone()
            .unwrap_or_else(|| local_ip_address().to_string())
    }

    fn metadata_map(&self) -> HashMap<String, String> {
        self.metadata.clone()
    }

    fn data_center_info(&self) -> DataCenterInfo {
        DataCenterInfo::my_own()
    }

    fn status_page_url_path(&self) -> String {
        self.status_page_url_path.clone()
    }

    fn status_page_url(&self) -> Option<String> {
        self.status_page_url.clone()
    }

    fn home_page_url_path(&self) -> String {
        self.home_page_url_path.clone()
    }

    fn home_page_url(&self) -> Option<String> {
        self.home_page_url.clone()
    }

    fn health_check_url_path(&self) -> String {
        self.health_check_url_path.clone()
    }

    fn health_check_url(&self) -> Option<String> {
        self.health_check_url.clone()
    }

    fn secure_health_check_url(&self) -> Option<String> {
        self.secure_health_check_url.clone()
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }
}

/// Default EC2 instance metadata endpoint
pub const AMAZON_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/";

/// Metadata keys read from the EC2 instance metadata service, paired with
/// the key they are published under
const AMAZON_METADATA_KEYS: [(&str, &str); 8] = [
    ("instance-id", "instance-id"),
    ("ami-id", "ami-id"),
    ("instance-type", "instance-type"),
    ("local-ipv4", "local-ipv4"),
    ("local-hostname", "local-hostname"),
    ("public-hostname", "public-hostname"),
    ("public-ipv4", "public-ipv4"),
    ("placement/availability-zone", "availability-zone"),
];

/// Instance configuration for Amazon EC2
///
/// Identity and addressing come from the EC2 instance metadata service.
/// When the service cannot be reached the generic property values are used.
#[derive(Debug, Clone)]
pub struct CloudInstanceConfig {
    generic: DataCenterInstanceConfig,
    amazon: HashMap<String, String>,
}

impl CloudInstanceConfig {
    /// Read the configuration under `namespace.` and query EC2 metadata
    pub fn new(namespace: &str, properties: &ConfigProperties) -> Result<Self> {
        let generic = DataCenterInstanceConfig::new(namespace, properties)?;
        let url = properties
            .namespace(namespace)
            .get_string("amazon.metadataUrl", AMAZON_METADATA_URL);

        let amazon = match fetch_amazon_metadata(&url) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot read EC2 instance metadata from {}: {}", url, e);
                HashMap::new()
            }
        };

        Ok(Self::with_metadata(generic, amazon))
    }

    /// Combine generic configuration with already known EC2 metadata
    pub fn with_metadata(generic: DataCenterInstanceConfig, amazon: HashMap<String, String>) -> Self {
        Self { generic, amazon }
    }

    fn amazon(&self, key: &str) -> Option<String> {
        self.amazon.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

fn fetch_amazon_metadata(base: &str) -> Result<HashMap<String, String>> {
    let http = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(2))
        .timeout(Duration::from_secs(5))
        .build()?;
    let base = base.trim_end_matches('/');

    let mut metadata = HashMap::new();
    for (path, key) in AMAZON_METADATA_KEYS {
        let response = http.get(format!("{base}/{path}")).send()?;
        if response.status().is_success() {
            metadata.insert(key.to_string(), response.text()?.trim().to_string());
        } else {
            debug!("EC2 metadata {} not available ({})", path, response.status());
        }
    }
    Ok(metadata)
}

impl EurekaInstanceConfig for CloudInstanceConfig {
    fn instance_id(&self) -> Option<String> {
        self.amazon("instance-id").or_else(|| self.generic.instance_id())
    }

    fn app_name(&self) -> String {
        self.generic.app_name()
    }

    fn app_group_name(&self) -> Option<String> {
        self.generic.app_group_name()
    }

    fn is_instance_enabled_on_init(&self) -> bool {
        self.generic.is_instance_enabled_on_init()
    }

    fn non_secure_port(&self) -> i32 {
        self.generic.non_secure_port()
    }

    fn secure_port(&self) -> i32 {
        self.generic.secure_port()
    }

    fn is_non_secure_port_enabled(&self) -> bool {
        self.generic.is_non_secure_port_enabled()
    }

    fn is_secure_port_enabled(&self) -> bool {
        self.generic.is_secure_port_enabled()
    }

    fn lease_renewal_interval_secs(&self) -> i32 {
        self.generic.lease_renewal_interval_secs()
    }

    fn lease_expiration_duration_secs(&self) -> i32 {
        self.generic.lease_expiration_duration_secs()
    }

    fn virtual_host_name(&self) -> String {
        self.generic.virtual_host_name()
    }

    fn secure_virtual_host_name(&self) -> String {
        self.generic.secure_virtual_host_name()
    }

    fn asg_name(&self) -> Option<String> {
        self.generic.asg_name()
    }

    fn host_name(&self, refresh: bool) -> String {
        self.amazon("public-hostname")
            .or_else(|| self.amazon("local-hostname"))
            .unwrap_or_else(|| self.generic.host_name(refresh))
    }

    fn ip_address(&self) -> String {
        self.amazon("local-ipv4")
            .unwrap_or_else(|| self.generic.ip_address())
    }

    fn metadata_map(&self) -> HashMap<String, String> {
        self.generic.metadata_map()
    }

    fn data_center_info(&self) -> DataCenterInfo {
        DataCenterInfo::amazon(self.amazon.clone())
    }

    fn status_page_url_path(&self) -> String {
        self.generic.status_page_url_path()
    }

    fn status_page_url(&self) -> Option<String> {
        self.generic.status_page_url()
    }

    fn home_page_url_path(&self) -> String {
        self.generic.home_page_url_path()
    }

    fn home_page_url(&self) -> Option<String> {
        self.generic.home_page_url()
    }

    fn health_check_url_path(&self) -> String {
        self.generic.health_check_url_path()
    }

    fn health_check_url(&self) -> Option<String> {
        self.generic.health_check_url()
    }

    fn secure_health_check_url(&self) -> Option<String> {
        self.generic.secure_health_check_url()
    }

    fn namespace(&self) -> String {
        self.generic.namespace()
    }
}

/// Best-effort outbound IP of this host.
///
/// Connecting a UDP socket sends no packets but makes the OS pick the
/// interface that routes to a public address.
fn local_ip_address() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Host name of this machine: `/etc/hostname`, else `$HOSTNAME`, else the
/// outbound IP.
///
/// Shells set `HOSTNAME` without exporting it, so the variable mostly helps
/// in containers where the runtime exports it.
fn local_host_name() -> String {
    pick_host_name(
        std::fs::read_to_string("/etc/hostname").ok(),
        std::env::var("HOSTNAME").ok(),
        local_ip_address,
    )
}

fn pick_host_name(
    file: Option<String>,
    env: Option<String>,
    fallback: impl FnOnce() -> IpAddr,
) -> String {
    file.into_iter()
        .chain(env)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| fallback().to_string())
}
