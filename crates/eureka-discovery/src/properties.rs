//! Plugin properties
//!
//! The cluster configuration hands the strategy a map of [`PropertyValue`]s.
//! Each recognized option is described by a [`PropertyDefinition`]; lookups
//! go through [`PropertyLookup`], which lets the process environment
//! override the configured value under the [`EUREKA_ONE_SYSTEM_PREFIX`].

use crate::error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Prefix for environment overrides, e.g. `hazelcast.eurekaone.namespace`
/// or `HAZELCAST_EUREKAONE_NAMESPACE`
pub const EUREKA_ONE_SYSTEM_PREFIX: &str = "hazelcast.eurekaone";

/// Plugin properties as supplied by the cluster configuration
pub type Properties = HashMap<String, PropertyValue>;

/// Source of environment overrides
pub type Environment = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The process environment
pub fn process_environment() -> Environment {
    Arc::new(|key| std::env::var(key).ok())
}

/// A configured property value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Free text
    String(String),
}

impl PropertyValue {
    /// Boolean view, accepting `true`/`false` text in any case
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            PropertyValue::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Integer view, accepting decimal text
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::String(s) => s.trim().parse().ok(),
            PropertyValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// Expected type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// `true` or `false`
    Bool,
    /// Decimal integer
    Int,
    /// Any text
    String,
}

/// A recognized plugin property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Property key
    pub key: &'static str,
    /// Expected type
    pub kind: PropertyKind,
    /// Whether the property may be omitted
    pub optional: bool,
}

impl PropertyDefinition {
    /// Define an optional property
    pub const fn optional(key: &'static str, kind: PropertyKind) -> Self {
        Self {
            key,
            kind,
            optional: true,
        }
    }

    /// Check `value` against the expected type, normalizing text values
    pub fn convert(&self, value: &PropertyValue) -> Result<PropertyValue> {
        let converted = match self.kind {
            PropertyKind::Bool => value.as_bool().map(PropertyValue::Bool),
            PropertyKind::Int => value.as_int().map(PropertyValue::Int),
            PropertyKind::String => Some(PropertyValue::String(value.to_string())),
        };
        converted.ok_or_else(|| DiscoveryError::InvalidProperty {
            key: self.key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Read the registry client settings from the configuration resource
/// instead of the plugin properties
pub const USE_CLASSPATH_EUREKA_CLIENT_PROPS: PropertyDefinition =
    PropertyDefinition::optional("use-classpath-eureka-client-props", PropertyKind::Bool);

/// Application name, used when the configuration resource is not
pub const NAME: PropertyDefinition = PropertyDefinition::optional("name", PropertyKind::String);

/// Data center type, used when the configuration resource is not
pub const DATACENTER: PropertyDefinition =
    PropertyDefinition::optional("datacenter", PropertyKind::String);

/// Whether the member registers itself
pub const SELF_REGISTRATION: PropertyDefinition =
    PropertyDefinition::optional("self-registration", PropertyKind::Bool);

/// Namespace of the member's keys in the configuration resource
pub const NAMESPACE: PropertyDefinition =
    PropertyDefinition::optional("namespace", PropertyKind::String);

/// Publish and discover cluster addresses through registry metadata
pub const USE_METADATA_FOR_HOST_AND_PORT: PropertyDefinition =
    PropertyDefinition::optional("use-metadata-for-host-and-port", PropertyKind::Bool);

/// Do not block start-up until the registration is visible
pub const SKIP_EUREKA_REGISTRATION_VERIFICATION: PropertyDefinition =
    PropertyDefinition::optional("skip-eureka-registration-verification", PropertyKind::Bool);

/// Options consumed by the strategy itself
pub const HZ_PROPERTY_DEFINITIONS: [PropertyDefinition; 7] = [
    USE_CLASSPATH_EUREKA_CLIENT_PROPS,
    NAME,
    DATACENTER,
    SELF_REGISTRATION,
    NAMESPACE,
    USE_METADATA_FOR_HOST_AND_PORT,
    SKIP_EUREKA_REGISTRATION_VERIFICATION,
];

/// Registry client settings accepted as plugin properties
pub const EUREKA_CLIENT_PROPERTY_DEFINITIONS: [PropertyDefinition; 11] = [
    PropertyDefinition::optional("serviceUrl.default", PropertyKind::String),
    PropertyDefinition::optional("zone", PropertyKind::String),
    PropertyDefinition::optional("registration.enabled", PropertyKind::Bool),
    PropertyDefinition::optional("shouldFetchRegistry", PropertyKind::Bool),
    PropertyDefinition::optional("preferSameZone", PropertyKind::Bool),
    PropertyDefinition::optional("eurekaServer.readTimeout", PropertyKind::Int),
    PropertyDefinition::optional("eurekaServer.connectTimeout", PropertyKind::Int),
    PropertyDefinition::optional("eurekaServer.proxyHost", PropertyKind::String),
    PropertyDefinition::optional("eurekaServer.proxyPort", PropertyKind::String),
    PropertyDefinition::optional("eurekaServer.proxyUserName", PropertyKind::String),
    PropertyDefinition::optional("eurekaServer.proxyPassword", PropertyKind::String),
];

/// Typed property lookups with environment overrides
#[derive(Clone)]
pub struct PropertyLookup<'a> {
    properties: &'a Properties,
    env: &'a Environment,
}

impl<'a> PropertyLookup<'a> {
    /// Look up values in `properties`, overridden from `env`
    pub fn new(properties: &'a Properties, env: &'a Environment) -> Self {
        Self { properties, env }
    }

    /// Raw value of `definition`, checked against its type.
    ///
    /// The environment is consulted first under `hazelcast.eurekaone.<key>`,
    /// then under the upper-snake form of that name.
    pub fn get(&self, definition: &PropertyDefinition) -> Result<Option<PropertyValue>> {
        let system_key = format!("{}.{}", EUREKA_ONE_SYSTEM_PREFIX, definition.key);
        let non_empty = |v: &String| !v.trim().is_empty();
        let overridden = (self.env)(&system_key)
            .filter(non_empty)
            .or_else(|| (self.env)(&c_identifier(&system_key)).filter(non_empty));

        match overridden {
            Some(raw) => definition.convert(&PropertyValue::String(raw)).map(Some),
            None => self
                .properties
                .get(definition.key)
                .map(|value| definition.convert(value))
                .transpose(),
        }
    }

    /// Boolean value or default
    pub fn get_bool(&self, definition: &PropertyDefinition, default: bool) -> Result<bool> {
        Ok(self
            .get(definition)?
            .and_then(|v| v.as_bool())
            .unwrap_or(default))
    }

    /// String value or default
    pub fn get_string(&self, definition: &PropertyDefinition, default: &str) -> Result<String> {
        Ok(self
            .get(definition)?
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string()))
    }
}

/// `hazelcast.eurekaone.self-registration` -> `HAZELCAST_EUREKAONE_SELF_REGISTRATION`
fn c_identifier(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
