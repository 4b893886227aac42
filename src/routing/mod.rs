//! Per-station routing table
//!
//! Maps entity identifiers (station IDs) to partial configuration overrides.
//! The reserved keys `*`, `default` and `DEFAULT` name the wildcard entry that
//! applies to every station; at most one of them may be present.

pub mod resolver;

pub use resolver::{ConfigResolver, EffectiveConfig, RouteMatch};

use crate::config::{
    ApiKey, RoutingSource, validate_base_url, validate_model, validate_temperature,
    validate_timeout,
};
use crate::error::ConfigLoadError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Keys that mark the wildcard entry
pub const WILDCARD_KEYS: [&str; 3] = ["*", "default", "DEFAULT"];

/// Partial override of the defaults
///
/// Only fields that are present override the layer below. Unknown fields in
/// the routing document are ignored; a JSON `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoutingEntry {
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub force_json: Option<bool>,
}

impl RoutingEntry {
    /// Set the credential override (blank keys are ignored)
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = ApiKey::new(api_key);
        self
    }

    /// Set the endpoint URL override
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model override
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the timeout override in seconds
    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the temperature override
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the force-JSON override
    pub fn with_force_json(mut self, force_json: bool) -> Self {
        self.force_json = Some(force_json);
        self
    }

    /// True when the entry overrides nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check present fields against the same rules as the defaults
    pub fn validate(&self, key: &str) -> Result<(), ConfigLoadError> {
        let invalid = |reason: String| ConfigLoadError::InvalidRoutingEntry {
            key: key.to_string(),
            reason,
        };

        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url).map_err(invalid)?;
        }
        if let Some(model) = &self.model {
            validate_model(model).map_err(invalid)?;
        }
        if let Some(timeout) = self.timeout {
            validate_timeout(timeout).map_err(invalid)?;
        }
        if let Some(temperature) = self.temperature {
            validate_temperature(temperature).map_err(invalid)?;
        }
        Ok(())
    }
}

/// Immutable routing table, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: HashMap<String, RoutingEntry>,
    wildcard: Option<(String, RoutingEntry)>,
}

impl RoutingTable {
    /// Table with no entries; every resolution uses the defaults
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from keyed entries
    ///
    /// # Errors
    ///
    /// - `DuplicateRoutingKey` if a key appears twice
    /// - `AmbiguousWildcard` if more than one wildcard key is present
    /// - `InvalidRoutingEntry` if any entry fails validation
    pub fn new<I>(entries: I) -> Result<Self, ConfigLoadError>
    where
        I: IntoIterator<Item = (String, RoutingEntry)>,
    {
        let mut table = Self::default();
        let mut wildcard_keys = Vec::new();

        for (key, entry) in entries {
            entry.validate(&key)?;
            if entry.is_empty() {
                tracing::debug!(key = %key, "Routing entry overrides nothing");
            }

            if WILDCARD_KEYS.contains(&key.as_str()) {
                if wildcard_keys.contains(&key) {
                    return Err(ConfigLoadError::DuplicateRoutingKey { key });
                }
                wildcard_keys.push(key.clone());
                table.wildcard = Some((key, entry));
                continue;
            }

            if table.entries.contains_key(&key) {
                return Err(ConfigLoadError::DuplicateRoutingKey { key });
            }
            table.entries.insert(key, entry);
        }

        if wildcard_keys.len() > 1 {
            return Err(ConfigLoadError::AmbiguousWildcard {
                keys: wildcard_keys,
            });
        }

        Ok(table)
    }

    /// Parse a routing document
    ///
    /// `origin` names where the JSON came from and appears in error messages.
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        let document: RawDocument =
            serde_json::from_str(json).map_err(|source| ConfigLoadError::RoutingParse {
                origin: origin.to_string(),
                source,
            })?;

        let mut entries = Vec::with_capacity(document.0.len());
        for (key, value) in document.0 {
            let entry = match value {
                Value::Object(_) => serde_json::from_value::<RoutingEntry>(value).map_err(|e| {
                    ConfigLoadError::InvalidRoutingEntry {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?,
                other => {
                    return Err(ConfigLoadError::InvalidRoutingEntry {
                        key,
                        reason: format!("expected a JSON object, got {}", json_type_name(&other)),
                    });
                }
            };
            entries.push((key, entry));
        }

        Self::new(entries)
    }

    /// Read and parse a routing file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            ConfigLoadError::RoutingFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        Self::from_json_str(&content, &path_display)
    }

    /// Load the table from whichever source was configured
    pub fn load(source: &RoutingSource) -> Result<Self, ConfigLoadError> {
        match source {
            RoutingSource::None => {
                tracing::debug!("No routing table configured, using defaults for every station");
                Ok(Self::empty())
            }
            RoutingSource::Inline(json) => {
                Self::from_json_str(json, crate::config::ENV_ROUTING_TABLE)
            }
            RoutingSource::File(path) => Self::from_file(path),
        }
    }

    /// The wildcard entry, if one is configured
    pub fn wildcard(&self) -> Option<&RoutingEntry> {
        self.wildcard.as_ref().map(|(_, entry)| entry)
    }

    /// Which reserved key the wildcard was configured under
    pub fn wildcard_key(&self) -> Option<&str> {
        self.wildcard.as_ref().map(|(key, _)| key.as_str())
    }

    /// The entry keyed by this exact entity identifier
    pub fn entry(&self, entity_id: &str) -> Option<&RoutingEntry> {
        self.entries.get(entity_id)
    }

    /// Number of entries, counting the wildcard
    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.wildcard.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level routing document, keys kept in order with duplicates intact
struct RawDocument(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{MapAccess, Visitor};

        struct RawDocumentVisitor;

        impl<'de> Visitor<'de> for RawDocumentVisitor {
            type Value = RawDocument;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object mapping station identifiers to routing entries")
            }

            fn visit_map<V>(self, mut map: V) -> Result<RawDocument, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(RawDocument(entries))
            }
        }

        deserializer.deserialize_map(RawDocumentVisitor)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
