//! Completion client with deterministic fallback
//!
//! Resolves the station's configuration, sends one chat-completion request
//! and returns the model text. Every request-time failure (missing
//! credential, transport error, non-2xx status, timeout, undecodable body)
//! is absorbed here and turned into a fallback result; callers always get
//! text back.

pub mod report_id;
pub mod types;

pub use report_id::ReportId;
pub use types::{ChatCompletionRequest, ChatCompletionResponse};

use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::routing::{ConfigResolver, EffectiveConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Text returned in place of model prose when the model cannot be used
pub const DEFAULT_FALLBACK_TEXT: &str = "Automated analysis is unavailable for this site. \
    Review the station attributes, the recommended reuse options and the nearby parcel \
    statistics in this report, and confirm zoning and permit requirements with a field survey.";

/// Maximum characters of an upstream error body kept for logging
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Why a report fell back to the default text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallbackReason {
    /// No credential configured globally or by any applicable routing entry
    MissingCredential,
    /// Connection failure or non-2xx response
    NetworkError,
    /// The exchange did not finish within the configured timeout
    Timeout,
    /// The response body could not be decoded or held no text
    MalformedResponse,
}

impl FallbackReason {
    /// Convert to metrics label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

/// Where a report's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Model,
    Fallback,
}

impl ReportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

/// Outcome of one report request
///
/// Serializes as `{"source": "model", "text": ...}` or
/// `{"source": "fallback", "text": ..., "reason": "Timeout"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CompletionResult {
    Model { text: String },
    Fallback { text: String, reason: FallbackReason },
}

impl CompletionResult {
    pub fn text(&self) -> &str {
        match self {
            Self::Model { text } | Self::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Model { text } | Self::Fallback { text, .. } => text,
        }
    }

    pub fn source(&self) -> ReportSource {
        match self {
            Self::Model { .. } => ReportSource::Model,
            Self::Fallback { .. } => ReportSource::Fallback,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Model { .. } => None,
            Self::Fallback { reason, .. } => Some(*reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Request-time failures, classified into a `FallbackReason`
#[derive(Debug, thiserror::Error)]
pub(crate) enum CompletionError {
    #[error("No credential configured for this station")]
    MissingCredential,

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Request to {endpoint} timed out after {timeout_seconds}s")]
    Timeout {
        endpoint: String,
        timeout_seconds: f64,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

impl CompletionError {
    pub(crate) fn reason(&self) -> FallbackReason {
        match self {
            Self::MissingCredential => FallbackReason::MissingCredential,
            Self::Transport { source, .. } if source.is_timeout() => FallbackReason::Timeout,
            Self::Transport { source, .. } if source.is_decode() => {
                FallbackReason::MalformedResponse
            }
            Self::Transport { .. } | Self::Status { .. } => FallbackReason::NetworkError,
            Self::Timeout { .. } => FallbackReason::Timeout,
            Self::MalformedResponse { .. } => FallbackReason::MalformedResponse,
        }
    }
}

/// Anything that can turn a prompt payload into report text
///
/// Allows dependency injection of mock generators in report-flow tests.
/// Implementations must never fail: degradation is expressed as
/// `CompletionResult::Fallback`.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate_report(&self, entity_id: &str, prompt_payload: &str) -> CompletionResult;
}

/// Chat-completion client driven by the routing resolver
///
/// Cheap to share behind an `Arc`: the resolver is immutable and the HTTP
/// client pools connections internally.
pub struct CompletionClient {
    resolver: Arc<ConfigResolver>,
    http: reqwest::Client,
    metrics: Arc<Metrics>,
    fallback_text: String,
}

impl CompletionClient {
    /// Create a client over an already-loaded resolver
    pub fn new(resolver: Arc<ConfigResolver>, metrics: Arc<Metrics>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self {
            resolver,
            http,
            metrics,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        })
    }

    /// Replace the default fallback text
    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Generate report text for one station
    ///
    /// Makes at most one network attempt, bounded by the resolved timeout.
    /// Dropping the returned future (caller cancellation) drops the
    /// in-flight request and releases its connection.
    pub async fn generate_report(&self, entity_id: &str, prompt_payload: &str) -> CompletionResult {
        let report_id = ReportId::new();
        let span = tracing::info_span!(
            "generate_report",
            report_id = %report_id,
            entity_id = %entity_id,
        );

        async {
            let config = self.resolver.resolve(entity_id);
            tracing::debug!(
                route = self.resolver.route_match(entity_id).as_str(),
                model = %config.model(),
                endpoint = %config.base_url(),
                timeout_seconds = config.timeout_seconds(),
                force_json = config.force_json(),
                "Resolved completion configuration"
            );

            let result = match self.request_completion(&config, prompt_payload).await {
                Ok(text) => {
                    tracing::info!(
                        model = %config.model(),
                        response_length = text.len(),
                        "Report generated by model"
                    );
                    CompletionResult::Model { text }
                }
                Err(e) => {
                    let reason = e.reason();
                    tracing::warn!(
                        error = %e,
                        reason = reason.as_str(),
                        model = %config.model(),
                        "Completion failed, using fallback report text"
                    );
                    CompletionResult::Fallback {
                        text: self.fallback_text.clone(),
                        reason,
                    }
                }
            };

            if let Err(e) = self
                .metrics
                .record_outcome(result.source(), result.fallback_reason())
            {
                tracing::error!(error = %e, "Failed to record report outcome metric");
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Single attempt against the resolved endpoint
    async fn request_completion(
        &self,
        config: &EffectiveConfig,
        prompt_payload: &str,
    ) -> Result<String, CompletionError> {
        let api_key = config.api_key().ok_or(CompletionError::MissingCredential)?;
        let endpoint = config.base_url();
        let body = ChatCompletionRequest::new(config, prompt_payload);

        let started = Instant::now();

        // The timeout wraps the whole exchange: connect, send and body read.
        let exchange = async {
            let response = self
                .http
                .post(endpoint)
                .bearer_auth(api_key.expose_secret())
                .json(&body)
                .send()
                .await
                .map_err(|source| CompletionError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                return Err(CompletionError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    body: error_body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|source| CompletionError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                })?;

            let parsed: ChatCompletionResponse =
                serde_json::from_slice(&bytes).map_err(|e| CompletionError::MalformedResponse {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

            parsed
                .first_content()
                .map(str::to_string)
                .ok_or_else(|| CompletionError::MalformedResponse {
                    endpoint: endpoint.to_string(),
                    reason: "response contained no message content".to_string(),
                })
        };

        let outcome = tokio::time::timeout(config.timeout(), exchange)
            .await
            .map_err(|_elapsed| CompletionError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_seconds: config.timeout_seconds(),
            })
            .and_then(|inner| inner);

        if let Err(e) = self
            .metrics
            .record_completion_duration(started.elapsed().as_secs_f64())
        {
            tracing::error!(error = %e, "Failed to record completion duration metric");
        }

        outcome
    }
}

#[async_trait]
impl ReportGenerator for CompletionClient {
    async fn generate_report(&self, entity_id: &str, prompt_payload: &str) -> CompletionResult {
        CompletionClient::generate_report(self, entity_id, prompt_payload).await
    }
}
