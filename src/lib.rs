//! Siteroute - LLM routing configuration for station site-analysis reports
//!
//! Resolves, per station, which completion endpoint, model and credential to
//! use by layering a routing table over process-wide defaults, then issues a
//! single chat-completion request that degrades to a deterministic report
//! whenever the model cannot be used.

pub mod completion;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod report;
pub mod routing;
pub mod telemetry;

pub use completion::{CompletionClient, CompletionResult, FallbackReason, ReportGenerator};
pub use config::{ConfigDefaults, Settings};
pub use error::{AppError, AppResult, ConfigLoadError};
pub use routing::{ConfigResolver, EffectiveConfig, RoutingEntry, RoutingTable};
