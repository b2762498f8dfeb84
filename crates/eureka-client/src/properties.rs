//! Flat configuration properties
//!
//! Eureka configuration is a flat map of dotted keys (`hazelcast.port`,
//! `hazelcast.serviceUrl.default`, ...). Several products may share one
//! configuration resource, each reading only the keys under its own
//! namespace.
//!
//! The resource is located by base name (environment variable
//! [`CONFIG_NAME_ENV`], default [`DEFAULT_CONFIG_NAME`]) in the directories
//! listed in [`CONFIG_PATH_ENV`] (`:`-separated, default: the current
//! directory). Java-style `.properties`, YAML and JSON files are accepted;
//! nested YAML/JSON mappings are flattened into dotted keys.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration resource base name
pub const CONFIG_NAME_ENV: &str = "EUREKA_CLIENT_PROPS";

/// Environment variable listing directories searched for the resource
pub const CONFIG_PATH_ENV: &str = "EUREKA_CONFIG_PATH";

/// Default configuration resource base name
pub const DEFAULT_CONFIG_NAME: &str = "eureka-client";

const EXTENSIONS: [&str; 4] = ["properties", "yaml", "yml", "json"];

/// A flat set of dotted-key properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigProperties {
    values: BTreeMap<String, String>,
}

impl ConfigProperties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate and load the configuration resource named by the environment
    pub fn locate() -> Result<Self> {
        let name = std::env::var(CONFIG_NAME_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_NAME.to_string());
        let dirs = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => std::env::split_paths(&path).collect(),
            Err(_) => vec![PathBuf::from(".")],
        };
        Self::locate_in(&name, &dirs)
    }

    /// Locate `<name>.<ext>` in the given directories and load the first match
    pub fn locate_in(name: &str, dirs: &[PathBuf]) -> Result<Self> {
        for dir in dirs {
            for ext in EXTENSIONS {
                let candidate = dir.join(format!("{name}.{ext}"));
                if candidate.is_file() {
                    debug!("Loading Eureka configuration from {:?}", candidate);
                    return Self::from_file(&candidate);
                }
            }
        }

        Err(Error::MissingResource {
            name: format!("{name}.{{{}}}", EXTENSIONS.join(",")),
            searched: dirs.to_vec(),
        })
    }

    /// Load properties from a file, picking the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&contents),
            Some("json") => Self::parse_json(&contents),
            _ => Self::parse_properties(&contents),
        }
    }

    /// Parse Java `.properties` text.
    ///
    /// Follows the `java.util.Properties` rules: an odd number of trailing
    /// backslashes continues the line, the key ends at the first unescaped
    /// `=`, `:` or whitespace, and `\uXXXX` plus single-character escapes are
    /// decoded in keys and values. A malformed unicode escape is an error.
    pub fn parse_properties(contents: &str) -> Result<Self> {
        let mut values = BTreeMap::new();
        let mut logical = String::new();
        let mut continuing = false;

        for raw in contents.lines() {
            let line = raw.trim_start_matches(PROPERTY_WHITESPACE);
            if !continuing && (line.is_empty() || line.starts_with(['#', '!'])) {
                continue;
            }

            let backslashes = line.len() - line.trim_end_matches('\\').len();
            if backslashes % 2 == 1 {
                logical.push_str(&line[..line.len() - 1]);
                continuing = true;
                continue;
            }
            logical.push_str(line);
            continuing = false;

            let (key, value) = split_property(&std::mem::take(&mut logical))?;
            values.insert(key, value);
        }

        if continuing {
            let (key, value) = split_property(&logical)?;
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Parse YAML, flattening nested mappings into dotted keys
    pub fn parse_yaml(contents: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut values = BTreeMap::new();
        flatten_yaml(None, &document, &mut values)?;
        Ok(Self { values })
    }

    /// Parse JSON, flattening nested objects into dotted keys
    pub fn parse_json(contents: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(contents)?;
        let mut values = BTreeMap::new();
        flatten_json(None, &document, &mut values);
        Ok(Self { values })
    }

    /// Insert or replace a property
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a property
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Raw property value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over all properties in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// View of the properties under `namespace.`
    pub fn namespace<'a>(&'a self, namespace: &'a str) -> Namespaced<'a> {
        Namespaced {
            properties: self,
            namespace,
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Typed, namespace-scoped lookups over a [`ConfigProperties`]
#[derive(Debug, Clone, Copy)]
pub struct Namespaced<'a> {
    properties: &'a ConfigProperties,
    namespace: &'a str,
}

impl<'a> Namespaced<'a> {
    /// The namespace this view is scoped to
    pub fn name(&self) -> &'a str {
        self.namespace
    }

    /// Fully qualified key for `key`
    pub fn key(&self, key: &str) -> String {
        format!("{}.{}", self.namespace, key)
    }

    /// Raw value, empty values count as absent
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.properties
            .get(&self.key(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// String value or default
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Boolean value or default
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(Error::invalid_property(self.key(key), v)),
        }
    }

    /// Integer value or default
    pub fn get_i32(&self, key: &str, default: i32) -> Result<i32> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|_| Error::invalid_property(self.key(key), v)),
        }
    }

    /// All properties under `namespace.<prefix>.`, keyed by the remaining suffix
    pub fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        let full = format!("{}.{}.", self.namespace, prefix);
        self.properties
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&full)
                    .map(|suffix| (suffix.to_string(), v.to_string()))
            })
            .collect()
    }
}

const PROPERTY_WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Split a logical line into its unescaped key and value
fn split_property(line: &str) -> Result<(String, String)> {
    let mut key_end = line.len();
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let mut value = line[key_end..].trim_start_matches(PROPERTY_WHITESPACE);
    if let Some(rest) = value.strip_prefix(['=', ':']) {
        value = rest.trim_start_matches(PROPERTY_WHITESPACE);
    }
    Ok((unescape(&line[..key_end])?, unescape(value)?))
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    // UTF-16 units from consecutive \u escapes, so surrogate pairs combine
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escape) = chars.next() {
                if escape == 'u' {
                    let hex: String = chars.by_ref().take(4).collect();
                    let unit = (hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()))
                        .then(|| u16::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .ok_or_else(|| Error::config(format!("malformed \\uxxxx escape: \\u{hex}")))?;
                    units.push(unit);
                    continue;
                }
                flush_units(&mut units, &mut out)?;
                out.push(match escape {
                    't' => '\t',
                    'n' => '\n',
                    'r' => '\r',
                    'f' => '\x0c',
                    other => other,
                });
            }
            continue;
        }
        flush_units(&mut units, &mut out)?;
        out.push(c);
    }
    flush_units(&mut units, &mut out)?;
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) -> Result<()> {
    if units.is_empty() {
        return Ok(());
    }
    let decoded = String::from_utf16(units)
        .map_err(|_| Error::config("unpaired surrogate in \\uxxxx escape"))?;
    out.push_str(&decoded);
    units.clear();
    Ok(())
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) => format!("{p}.{key}"),
        None => key.to_string(),
    }
}

fn flatten_yaml(
    prefix: Option<&str>,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<()> {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(Error::config(format!(
                            "unsupported configuration key: {other:?}"
                        )));
                    }
                };
                flatten_yaml(Some(&join_key(prefix, &key)), v, out)?;
            }
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out)?,
        scalar_or_list => {
            if let Some(key) = prefix {
                out.insert(key.to_string(), yaml_scalar(scalar_or_list));
            }
        }
    }
    Ok(())
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items.iter().map(yaml_scalar).collect::<Vec<_>>().join(","),
        Value::Mapping(_) => String::new(),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
    }
}

fn flatten_json(prefix: Option<&str>, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_json(Some(&join_key(prefix, k)), v, out);
            }
        }
        scalar_or_list => {
            if let Some(key) = prefix {
                out.insert(key.to_string(), json_scalar(scalar_or_list));
            }
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null | Value::Object(_) => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(json_scalar).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
