//! Configuration management for siteroute
//!
//! Reads process-wide defaults from environment-style variables and decides
//! where the routing table comes from. Everything here is loaded once at
//! startup and is read-only afterwards.

use crate::error::{AppResult, ConfigLoadError};
use crate::routing::{ConfigResolver, RoutingTable};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "LLM_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_URL: &str = "LLM_API_URL";
pub const ENV_MODEL: &str = "LLM_MODEL";
pub const ENV_TIMEOUT: &str = "LLM_TIMEOUT";
pub const ENV_TEMPERATURE: &str = "LLM_TEMPERATURE";
pub const ENV_FORCE_JSON: &str = "LLM_FORCE_JSON";
pub const ENV_ROUTING_TABLE: &str = "LLM_ROUTING_TABLE";
pub const ENV_ROUTING_FILE: &str = "LLM_ROUTING_FILE";
pub const ENV_LOG_LEVEL: &str = "LLM_LOG_LEVEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_FORCE_JSON: bool = true;

/// Upper bound on a single completion request
pub const MAX_TIMEOUT_SECONDS: f64 = 300.0;

/// Upstream API credential (sensitive, never logged)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key
    ///
    /// Returns `None` for empty or whitespace-only values, which count as
    /// "no credential configured".
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return None;
        }
        Some(Self(SecretString::new(value)))
    }

    /// Expose the secret value (use sparingly)
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::new(value).ok_or_else(|| serde::de::Error::custom("api_key cannot be empty"))
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Process-wide baseline for every resolution
///
/// Call `validate()` after constructing by hand; `Settings` does it for you.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDefaults {
    pub api_key: Option<ApiKey>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: f64,
    pub temperature: f64,
    pub force_json: bool,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            temperature: DEFAULT_TEMPERATURE,
            force_json: DEFAULT_FORCE_JSON,
        }
    }
}

impl ConfigDefaults {
    /// Whether a credential is configured globally
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validate every field against the shared rules
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let invalid = |field: &'static str| {
            move |reason: String| ConfigLoadError::InvalidDefaults { field, reason }
        };

        validate_base_url(&self.base_url).map_err(invalid("base_url"))?;
        validate_model(&self.model).map_err(invalid("model"))?;
        validate_timeout(self.timeout_seconds).map_err(invalid("timeout"))?;
        validate_temperature(self.temperature).map_err(invalid("temperature"))?;
        Ok(())
    }
}

pub(crate) fn validate_base_url(base_url: &str) -> Result<(), String> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(format!(
            "base_url '{}' must start with 'http://' or 'https://'",
            base_url
        ));
    }
    Ok(())
}

pub(crate) fn validate_model(model: &str) -> Result<(), String> {
    if model.trim().is_empty() {
        return Err("model cannot be empty".to_string());
    }
    Ok(())
}

pub(crate) fn validate_timeout(timeout: f64) -> Result<(), String> {
    if !timeout.is_finite() || timeout <= 0.0 {
        return Err(format!(
            "timeout must be a positive finite number of seconds, got {}",
            timeout
        ));
    }
    if timeout > MAX_TIMEOUT_SECONDS {
        return Err(format!(
            "timeout cannot exceed {} seconds, got {}",
            MAX_TIMEOUT_SECONDS, timeout
        ));
    }
    Ok(())
}

pub(crate) fn validate_temperature(temperature: f64) -> Result<(), String> {
    if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
        return Err(format!(
            "temperature must be a finite number between 0.0 and 2.0, got {}",
            temperature
        ));
    }
    Ok(())
}

/// Where the routing table is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingSource {
    /// No table configured; every resolution uses the defaults
    None,
    /// Inline JSON document
    Inline(String),
    /// Path to a JSON file
    File(PathBuf),
}

impl RoutingSource {
    /// Pick the routing source from the two optional settings
    ///
    /// Inline JSON takes precedence over the file path.
    pub fn select(inline: Option<String>, file: Option<String>) -> Self {
        match (inline, file) {
            (Some(inline), Some(file)) => {
                tracing::warn!(
                    routing_file = %file,
                    "Both {} and {} are set; using the inline table and ignoring the file",
                    ENV_ROUTING_TABLE,
                    ENV_ROUTING_FILE
                );
                Self::Inline(inline)
            }
            (Some(inline), None) => Self::Inline(inline),
            (None, Some(file)) => Self::File(PathBuf::from(shellexpand::tilde(&file).into_owned())),
            (None, None) => Self::None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Everything read from the environment at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub defaults: ConfigDefaults,
    pub routing_source: RoutingSource,
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    ///
    /// Missing optional values take their literal defaults. Values that fail
    /// to parse or fall outside their valid range are logged and replaced by
    /// the default; only a missing credential is remembered for later.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = get(ENV_API_KEY)
            .or_else(|| get(ENV_OPENAI_API_KEY))
            .and_then(ApiKey::new);

        let base_url = checked_or_default(
            ENV_API_URL,
            get(ENV_API_URL),
            DEFAULT_BASE_URL.to_string(),
            |value: &String| validate_base_url(value),
        );
        let model = get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_seconds = parsed_or_default(
            ENV_TIMEOUT,
            get(ENV_TIMEOUT),
            DEFAULT_TIMEOUT_SECONDS,
            validate_timeout,
        );
        let temperature = parsed_or_default(
            ENV_TEMPERATURE,
            get(ENV_TEMPERATURE),
            DEFAULT_TEMPERATURE,
            validate_temperature,
        );
        let force_json = get(ENV_FORCE_JSON)
            .map(|value| parse_flag(&value))
            .unwrap_or(DEFAULT_FORCE_JSON);

        if api_key.is_none() {
            tracing::warn!(
                "No LLM credential configured ({} / {}); reports will use the fallback text \
                 unless a routing entry supplies an api_key",
                ENV_API_KEY,
                ENV_OPENAI_API_KEY
            );
        }

        let observability = ObservabilityConfig {
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
        };

        Self {
            defaults: ConfigDefaults {
                api_key,
                base_url,
                model,
                timeout_seconds,
                temperature,
                force_json,
            },
            routing_source: RoutingSource::select(get(ENV_ROUTING_TABLE), get(ENV_ROUTING_FILE)),
            observability,
        }
    }

    /// Install the tracing subscriber at the configured level
    ///
    /// `RUST_LOG` still takes precedence. Only the first call in a process
    /// has any effect.
    pub fn init_telemetry(&self) {
        crate::telemetry::init(&self.observability.log_level);
    }

    /// Load the routing table and build the immutable resolver
    ///
    /// This is the single startup step that can fail: an unreadable routing
    /// file or an invalid routing document aborts initialisation.
    pub fn build_resolver(&self) -> AppResult<ConfigResolver> {
        let table = RoutingTable::load(&self.routing_source)?;
        tracing::info!(
            entries = table.len(),
            has_wildcard = table.wildcard().is_some(),
            model = %self.defaults.model,
            base_url = %self.defaults.base_url,
            credential_configured = self.defaults.has_credential(),
            "Routing configuration loaded"
        );
        Ok(ConfigResolver::new(self.defaults.clone(), table)?)
    }
}

/// `false`, `0` and `no` (any case) disable a flag; anything else enables it
pub(crate) fn parse_flag(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

fn checked_or_default<T, V>(key: &str, raw: Option<T>, default: T, validate: V) -> T
where
    T: fmt::Display,
    V: Fn(&T) -> Result<(), String>,
{
    match raw {
        Some(value) => match validate(&value) {
            Ok(()) => value,
            Err(reason) => {
                tracing::warn!(
                    variable = key,
                    reason = %reason,
                    default = %default,
                    "Ignoring invalid setting, using default"
                );
                default
            }
        },
        None => default,
    }
}

fn parsed_or_default(
    key: &str,
    raw: Option<String>,
    default: f64,
    validate: fn(f64) -> Result<(), String>,
) -> f64 {
    let parsed = match raw {
        Some(value) => match value.parse::<f64>() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(
                    variable = key,
                    value = %value,
                    error = %e,
                    default = default,
                    "Setting is not a number, using default"
                );
                None
            }
        },
        None => None,
    };

    checked_or_default(key, parsed, default, |value: &f64| validate(*value))
}
