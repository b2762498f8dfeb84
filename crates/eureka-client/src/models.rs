//! Data models for the Eureka registry
//!
//! The serde layout follows the Eureka v2 REST JSON representation,
//! including its quirks: ports are wrapped as `{"$": 5701, "@enabled": "true"}`,
//! booleans and timestamps may arrive as strings, metadata maps may carry a
//! `@class` marker entry, and an application holding a single instance
//! serializes that instance as an object instead of an array.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Registration status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Ready to receive traffic
    Up,
    /// Not healthy, do not send traffic
    Down,
    /// Still initializing
    Starting,
    /// Intentionally taken out of rotation
    OutOfService,
    /// Status not known, also used for unrecognized values
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port number together with its enabled flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortWrapper {
    /// Port number as declared by the instance
    #[serde(rename = "$", deserialize_with = "lenient::i32")]
    pub port: i32,
    /// Whether the port accepts traffic
    #[serde(rename = "@enabled", with = "lenient::string_bool")]
    pub enabled: bool,
}

impl PortWrapper {
    /// Create a port wrapper
    pub fn new(port: i32, enabled: bool) -> Self {
        Self { port, enabled }
    }
}

impl Default for PortWrapper {
    fn default() -> Self {
        Self::new(7001, false)
    }
}

/// Known data center flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataCenterName {
    /// Generic, self-hosted data center
    MyOwn,
    /// Amazon EC2
    Amazon,
    /// Netflix-internal data center
    Netflix,
}

/// Data center an instance runs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCenterInfo {
    /// Java class marker the registry server expects
    #[serde(rename = "@class", default = "DataCenterInfo::default_class")]
    pub class: String,
    /// Data center flavour
    pub name: DataCenterName,
    /// Cloud metadata (instance id, availability zone, ...)
    #[serde(
        default,
        skip_serializing_if = "HashMap::is_empty",
        deserialize_with = "lenient::metadata"
    )]
    pub metadata: HashMap<String, String>,
}

impl DataCenterInfo {
    const DEFAULT_CLASS: &'static str = "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo";
    const AMAZON_CLASS: &'static str = "com.netflix.appinfo.AmazonInfo";

    fn default_class() -> String {
        Self::DEFAULT_CLASS.to_string()
    }

    /// Generic data center
    pub fn my_own() -> Self {
        Self {
            class: Self::default_class(),
            name: DataCenterName::MyOwn,
            metadata: HashMap::new(),
        }
    }

    /// Amazon data center with the given instance metadata
    pub fn amazon(metadata: HashMap<String, String>) -> Self {
        Self {
            class: Self::AMAZON_CLASS.to_string(),
            name: DataCenterName::Amazon,
            metadata,
        }
    }
}

impl Default for DataCenterInfo {
    fn default() -> Self {
        Self::my_own()
    }
}

/// Lease timing of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseInfo {
    /// Heartbeat interval in seconds
    #[serde(default = "LeaseInfo::default_renewal", deserialize_with = "lenient::i32")]
    pub renewal_interval_in_secs: i32,
    /// Seconds without heartbeat before the registry evicts the instance
    #[serde(default = "LeaseInfo::default_duration", deserialize_with = "lenient::i32")]
    pub duration_in_secs: i32,
    /// Registration time (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub registration_timestamp: i64,
    /// Last renewal time (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub last_renewal_timestamp: i64,
    /// Eviction time (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub eviction_timestamp: i64,
    /// Time the instance was first marked UP (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub service_up_timestamp: i64,
}

impl LeaseInfo {
    /// Default heartbeat interval
    pub const DEFAULT_RENEWAL_INTERVAL_SECS: i32 = 30;
    /// Default lease duration
    pub const DEFAULT_DURATION_SECS: i32 = 90;

    fn default_renewal() -> i32 {
        Self::DEFAULT_RENEWAL_INTERVAL_SECS
    }

    fn default_duration() -> i32 {
        Self::DEFAULT_DURATION_SECS
    }

    /// Create lease info with the given timings
    pub fn new(renewal_interval_in_secs: i32, duration_in_secs: i32) -> Self {
        Self {
            renewal_interval_in_secs,
            duration_in_secs,
            registration_timestamp: 0,
            last_renewal_timestamp: 0,
            eviction_timestamp: 0,
            service_up_timestamp: 0,
        }
    }
}

impl Default for LeaseInfo {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_RENEWAL_INTERVAL_SECS,
            Self::DEFAULT_DURATION_SECS,
        )
    }
}

/// Registry-side action that produced an instance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Instance was added
    Added,
    /// Instance was modified
    Modified,
    /// Instance was removed
    Deleted,
}

/// One registered instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    /// Instance identifier, unique within the application
    #[serde(default)]
    pub instance_id: String,
    /// Host name the instance advertises
    #[serde(default)]
    pub host_name: String,
    /// Application name (upper-case by registry convention)
    pub app: String,
    /// Application group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_group_name: Option<String>,
    /// IP address the instance advertises
    #[serde(default)]
    pub ip_addr: String,
    /// Current status
    #[serde(default)]
    pub status: InstanceStatus,
    /// Status override set through the registry
    #[serde(rename = "overriddenstatus", alias = "overriddenStatus", default)]
    pub overridden_status: InstanceStatus,
    /// Non-secure port
    #[serde(default)]
    pub port: PortWrapper,
    /// Secure port
    #[serde(default = "InstanceInfo::default_secure_port")]
    pub secure_port: PortWrapper,
    /// Country id, always 1 in practice
    #[serde(default = "InstanceInfo::default_country_id", deserialize_with = "lenient::i32")]
    pub country_id: i32,
    /// Data center description
    #[serde(default)]
    pub data_center_info: DataCenterInfo,
    /// Lease timing
    #[serde(default)]
    pub lease_info: LeaseInfo,
    /// Free-form metadata
    #[serde(default, deserialize_with = "lenient::metadata")]
    pub metadata: HashMap<String, String>,
    /// Home page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    /// Status page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_page_url: Option<String>,
    /// Health check URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    /// Secure health check URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_health_check_url: Option<String>,
    /// Virtual IP address (logical service name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_address: Option<String>,
    /// Secure virtual IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_vip_address: Option<String>,
    /// Auto scaling group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asg_name: Option<String>,
    /// Whether the instance is a registry server itself
    #[serde(default, with = "lenient::string_bool")]
    pub is_coordinating_discovery_server: bool,
    /// Last update time (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub last_updated_timestamp: i64,
    /// Last local modification time (epoch millis)
    #[serde(default, deserialize_with = "lenient::i64")]
    pub last_dirty_timestamp: i64,
    /// Registry action that produced this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// Local changes not yet pushed to the registry
    #[serde(skip)]
    pub dirty: bool,
}

impl InstanceInfo {
    fn default_secure_port() -> PortWrapper {
        PortWrapper::new(7002, false)
    }

    fn default_country_id() -> i32 {
        1
    }

    /// Create a minimal instance record
    pub fn new(app: impl AsRef<str>, instance_id: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            instance_id: instance_id.into(),
            host_name: String::new(),
            app: app.as_ref().to_uppercase(),
            app_group_name: None,
            ip_addr: String::new(),
            status: InstanceStatus::Up,
            overridden_status: InstanceStatus::Unknown,
            port: PortWrapper::default(),
            secure_port: Self::default_secure_port(),
            country_id: Self::default_country_id(),
            data_center_info: DataCenterInfo::my_own(),
            lease_info: LeaseInfo::default(),
            metadata: HashMap::new(),
            home_page_url: None,
            status_page_url: None,
            health_check_url: None,
            secure_health_check_url: None,
            vip_address: None,
            secure_vip_address: None,
            asg_name: None,
            is_coordinating_discovery_server: false,
            last_updated_timestamp: now,
            last_dirty_timestamp: now,
            action_type: None,
            dirty: false,
        }
    }

    /// Identifier used in registry URLs.
    ///
    /// Falls back to the host name for records published by registries that
    /// predate explicit instance ids.
    pub fn id(&self) -> &str {
        if self.instance_id.is_empty() {
            &self.host_name
        } else {
            &self.instance_id
        }
    }

    /// Set the status, returning the previous one when it changed
    pub fn set_status(&mut self, status: InstanceStatus) -> Option<InstanceStatus> {
        if self.status == status {
            return None;
        }
        let previous = self.status;
        self.status = status;
        self.mark_dirty();
        Some(previous)
    }

    /// Record a local modification
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.last_dirty_timestamp = Utc::now().timestamp_millis();
    }

    /// Clear the dirty flag if nothing changed since `timestamp`
    pub fn unset_dirty(&mut self, timestamp: i64) {
        if self.last_dirty_timestamp <= timestamp {
            self.dirty = false;
        }
    }

    /// Look up a metadata value
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }
}

impl fmt::Display for InstanceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}:{}, {})",
            self.app,
            self.id(),
            self.ip_addr,
            self.port.port,
            self.status
        )
    }
}

/// All registered instances of one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Application name
    pub name: String,
    /// Instances in registry order
    #[serde(rename = "instance", default, deserialize_with = "lenient::one_or_many")]
    pub instances: Vec<InstanceInfo>,
}

impl Application {
    /// Create an empty application
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_uppercase(),
            instances: Vec::new(),
        }
    }

    /// Add or replace an instance, keyed by its id
    pub fn add_instance(&mut self, instance: InstanceInfo) {
        if let Some(existing) = self.instances.iter_mut().find(|i| i.id() == instance.id()) {
            *existing = instance;
        } else {
            self.instances.push(instance);
        }
    }

    /// Remove an instance by id
    pub fn remove_instance(&mut self, id: &str) -> Option<InstanceInfo> {
        let index = self.instances.iter().position(|i| i.id() == id)?;
        Some(self.instances.remove(index))
    }

    /// Get an instance by id
    pub fn instance_by_id(&self, id: &str) -> Option<&InstanceInfo> {
        self.instances.iter().find(|i| i.id() == id)
    }

    /// Instances exactly as the registry returned them
    pub fn instances(&self) -> &[InstanceInfo] {
        &self.instances
    }
}

/// `{"application": {...}}` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationEnvelope {
    /// Wrapped application
    pub application: Application,
}

/// `{"instance": {...}}` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEnvelope {
    /// Wrapped instance
    pub instance: InstanceInfo,
}

mod lenient {
    //! Deserializers tolerant of the registry's stringly-typed JSON

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use std::collections::HashMap;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    pub fn i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }

    pub fn i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        let value = i64(deserializer)?;
        i32::try_from(value).map_err(D::Error::custom)
    }

    pub mod string_bool {
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BoolOrString {
            Bool(bool),
            String(String),
        }

        pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(if *value { "true" } else { "false" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
            match BoolOrString::deserialize(deserializer)? {
                BoolOrString::Bool(b) => Ok(b),
                BoolOrString::String(s) => s.trim().parse().map_err(D::Error::custom),
            }
        }
    }

    pub fn metadata<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<String, String>, D::Error> {
        let raw = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| key != "@class")
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect())
    }

    pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            Many(Vec<T>),
            One(T),
        }

        Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
            Some(OneOrMany::Many(items)) => items,
            Some(OneOrMany::One(item)) => vec![item],
            None => Vec::new(),
        })
    }
}
