//! Structured site reports
//!
//! `ReportService` drives one report: assemble the prompt, ask the
//! generator, and parse the model's JSON into a `SiteReport`. Anything short
//! of a usable model answer produces the deterministic report built from
//! the station's own data.

use crate::completion::{CompletionResult, FallbackReason, ReportGenerator, ReportSource};
use crate::prompt::{PromptAssembler, SiteContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const GENERIC_INSIGHTS: [&str; 3] = [
    "Quantify commercial density and transport access nearby to widen the captured demand.",
    "Check alignment with municipal development plans and urban regeneration programmes to secure policy support.",
    "Manage construction time, safety and environmental impact systematically when converting the existing fuel facilities.",
];

const GENERIC_ACTIONS: [&str; 3] = [
    "Confirm zoning, district unit plans and other permit requirements through a site survey.",
    "Compare profitability, investment cost and demand for each recommended use by scenario.",
    "Prepare a cooperation plan with the municipality and nearby stakeholders to build momentum.",
];

/// Report content shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReport {
    pub summary: String,
    pub insights: Vec<String>,
    pub actions: Vec<String>,
    pub source: ReportSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl SiteReport {
    /// Parse model output into a report
    ///
    /// Accepts the JSON object optionally wrapped in a Markdown code fence.
    /// Returns `None` when the text is not a JSON object or holds no
    /// non-blank summary, insight or action.
    pub fn parse(text: &str) -> Option<Self> {
        let data: Value = serde_json::from_str(strip_code_fence(text)).ok()?;
        let object = data.as_object()?;

        let summary = object
            .get("summary")
            .map(text_of)
            .unwrap_or_default();
        let insights = object.get("insights").map(items_of).unwrap_or_default();
        let actions = object.get("actions").map(items_of).unwrap_or_default();

        if summary.is_empty() && insights.is_empty() && actions.is_empty() {
            return None;
        }

        Some(Self {
            summary,
            insights,
            actions,
            source: ReportSource::Model,
            fallback_reason: None,
        })
    }

    /// Deterministic report built from the station's own data
    pub fn fallback(context: &SiteContext, reason: FallbackReason) -> Self {
        let attributes = &context.attributes;
        let address = attributes.address().unwrap_or_else(|| "-".to_string());
        let land_use = attributes
            .land_use()
            .unwrap_or_else(|| "unknown".to_string());

        let mut summary = vec![
            format!(
                "Baseline site assessment for {} ({}).",
                context.display_name(),
                address
            ),
            format!(
                "The main zoning is '{}', so links with the surrounding land use need to be considered.",
                land_use
            ),
        ];
        if let Some(area) = attributes.site_area() {
            summary.push(format!("Recorded site area: {}.", area));
        }
        if let Some(parcels) = context.parcels.as_ref().and_then(|p| p.describe()) {
            summary.push(parcels);
        }

        let mut insights = Vec::with_capacity(GENERIC_INSIGHTS.len() + 1);
        if let Some(top) = context
            .recommendations
            .first()
            .map(|r| r.usage_type.trim())
            .filter(|usage| !usage.is_empty())
        {
            insights.push(format!(
                "The recommendation data suggests reviewing the '{}' use first.",
                top
            ));
        }
        insights.extend(GENERIC_INSIGHTS.iter().map(|s| s.to_string()));

        Self {
            summary: summary.join(" "),
            insights,
            actions: GENERIC_ACTIONS.iter().map(|s| s.to_string()).collect(),
            source: ReportSource::Fallback,
            fallback_reason: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ReportSource::Fallback
    }
}

/// Strip a surrounding Markdown code fence and its language tag
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn items_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Produces site reports from a generator
///
/// Never fails: every degradation ends in `SiteReport::fallback`.
#[derive(Clone)]
pub struct ReportService {
    generator: Arc<dyn ReportGenerator>,
    assembler: PromptAssembler,
}

impl ReportService {
    pub fn new(generator: Arc<dyn ReportGenerator>) -> Self {
        Self {
            generator,
            assembler: PromptAssembler::default(),
        }
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub async fn generate(&self, context: &SiteContext) -> SiteReport {
        let prompt = self.assembler.assemble(context);

        match self
            .generator
            .generate_report(&context.station_id, &prompt)
            .await
        {
            CompletionResult::Model { text } => SiteReport::parse(&text).unwrap_or_else(|| {
                tracing::warn!(
                    station_id = %context.station_id,
                    response_length = text.len(),
                    "Model response is not a usable report, using fallback report"
                );
                SiteReport::fallback(context, FallbackReason::MalformedResponse)
            }),
            CompletionResult::Fallback { reason, .. } => SiteReport::fallback(context, reason),
        }
    }
}
