//! Configuration resolution
//!
//! Layers the routing table over the defaults for one station:
//! defaults, then the wildcard entry, then the station's own entry. Each
//! layer overrides only the fields it sets.

use crate::config::{ApiKey, ConfigDefaults, DEFAULT_TIMEOUT_SECONDS};
use crate::error::ConfigLoadError;
use crate::routing::{RoutingEntry, RoutingTable};
use std::time::Duration;

/// Which routing layers contributed to a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch {
    /// No entry applied
    Defaults,
    /// Only the wildcard entry applied
    Wildcard,
    /// Only the station's own entry applied
    Entity,
    /// The station's entry applied over the wildcard
    WildcardAndEntity,
}

impl RouteMatch {
    /// Convert to string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defaults => "defaults",
            Self::Wildcard => "wildcard",
            Self::Entity => "entity",
            Self::WildcardAndEntity => "wildcard+entity",
        }
    }
}

/// Fully merged configuration for a single request
///
/// Every field is populated. Instances are produced by `ConfigResolver`
/// and live only as long as the request that uses them.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    api_key: Option<ApiKey>,
    base_url: String,
    model: String,
    timeout_seconds: f64,
    temperature: f64,
    force_json: bool,
}

impl EffectiveConfig {
    /// Base layer; only reachable through `ConfigResolver`, which has validated `defaults`
    pub(crate) fn from_defaults(defaults: &ConfigDefaults) -> Self {
        Self {
            api_key: defaults.api_key.clone(),
            base_url: defaults.base_url.clone(),
            model: defaults.model.clone(),
            timeout_seconds: defaults.timeout_seconds,
            temperature: defaults.temperature,
            force_json: defaults.force_json,
        }
    }

    /// Overlay the fields an entry sets, field by field
    fn overlay(&mut self, entry: &RoutingEntry) {
        if let Some(api_key) = &entry.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &entry.base_url {
            self.base_url.clone_from(base_url);
        }
        if let Some(model) = &entry.model {
            self.model.clone_from(model);
        }
        if let Some(timeout) = entry.timeout {
            self.timeout_seconds = timeout;
        }
        if let Some(temperature) = entry.temperature {
            self.temperature = temperature;
        }
        if let Some(force_json) = entry.force_json {
            self.force_json = force_json;
        }
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full chat-completions URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout_seconds
    }

    /// Timeout for the whole completion exchange
    ///
    /// Falls back to the default timeout if the value cannot form a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn force_json(&self) -> bool {
        self.force_json
    }
}

/// Resolves the effective configuration for a station
///
/// Holds the defaults and the routing table by value. Both are immutable
/// after construction, so a shared `ConfigResolver` can be used from any
/// number of tasks without locking.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: ConfigDefaults,
    table: RoutingTable,
}

impl ConfigResolver {
    /// Create a resolver, validating the defaults
    ///
    /// Routing entries are validated when the table is built.
    pub fn new(defaults: ConfigDefaults, table: RoutingTable) -> Result<Self, ConfigLoadError> {
        defaults.validate()?;
        Ok(Self { defaults, table })
    }

    /// Resolver with no routing table
    pub fn with_defaults(defaults: ConfigDefaults) -> Result<Self, ConfigLoadError> {
        Self::new(defaults, RoutingTable::empty())
    }

    /// Merge defaults, wildcard entry and station entry for `entity_id`
    ///
    /// Pure: the same inputs always produce the same `EffectiveConfig`.
    pub fn resolve(&self, entity_id: &str) -> EffectiveConfig {
        let mut effective = EffectiveConfig::from_defaults(&self.defaults);

        if let Some(wildcard) = self.table.wildcard() {
            effective.overlay(wildcard);
        }
        if let Some(entry) = self.table.entry(entity_id) {
            effective.overlay(entry);
        }

        tracing::trace!(
            entity_id = %entity_id,
            route = self.route_match(entity_id).as_str(),
            model = %effective.model,
            "Resolved routing configuration"
        );

        effective
    }

    /// Which layers `resolve` applies for `entity_id`
    pub fn route_match(&self, entity_id: &str) -> RouteMatch {
        match (
            self.table.wildcard().is_some(),
            self.table.entry(entity_id).is_some(),
        ) {
            (false, false) => RouteMatch::Defaults,
            (true, false) => RouteMatch::Wildcard,
            (false, true) => RouteMatch::Entity,
            (true, true) => RouteMatch::WildcardAndEntity,
        }
    }

    pub fn defaults(&self) -> &ConfigDefaults {
        &self.defaults
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }
}
