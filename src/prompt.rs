//! Prompt assembly for site-analysis reports
//!
//! Station attributes arrive as free-form JSON from the station store, so
//! well-known fields are looked up under both their Korean source keys and
//! English aliases. Recommendations and parcel statistics are computed
//! elsewhere; this module only renders them into the user message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of recommendations rendered into a prompt
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Radius of the parcel statistics, in metres
pub const PARCEL_RADIUS_M: u32 = 300;

const NAME_KEYS: &[&str] = &["상호", "name"];
const ADDRESS_KEYS: &[&str] = &["주소", "address"];
const LAND_USE_KEYS: &[&str] = &["용도지역", "토지용도", "지목", "land_use"];
const SITE_AREA_KEYS: &[&str] = &["대지면적", "면적", "AREA", "site_area"];
const LATITUDE_KEYS: &[&str] = &["위도", "latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["경도", "longitude", "lng"];

/// Attributes rendered into the prompt, in order
const PROMPT_ATTRIBUTE_KEYS: &[&[&str]] = &[
    NAME_KEYS,
    ADDRESS_KEYS,
    &["지번주소", "lot_address"],
    &["용도지역", "zoning"],
    &["지목", "land_category"],
    &["대지면적", "site_area"],
    &["연면적", "floor_area"],
    &["주용도", "main_use"],
    &["준공일자", "completed_on"],
    &["폐업일자", "closed_on"],
];

/// Free-form station record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationAttributes(Map<String, Value>);

impl StationAttributes {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Non-empty text form of a scalar attribute
    ///
    /// Strings are trimmed; numbers and booleans are rendered as-is. Nulls,
    /// blanks, arrays and objects count as missing.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// First present key among `keys`, with its value
    fn first_of<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, String)> {
        keys.iter()
            .find_map(|key| self.get(key).map(|value| (*key, value)))
    }

    pub fn name(&self) -> Option<String> {
        self.first_of(NAME_KEYS).map(|(_, value)| value)
    }

    pub fn address(&self) -> Option<String> {
        self.first_of(ADDRESS_KEYS).map(|(_, value)| value)
    }

    pub fn land_use(&self) -> Option<String> {
        self.first_of(LAND_USE_KEYS).map(|(_, value)| value)
    }

    pub fn site_area(&self) -> Option<String> {
        self.first_of(SITE_AREA_KEYS).map(|(_, value)| value)
    }

    /// `(latitude, longitude)` when both are present
    pub fn coordinates(&self) -> Option<(String, String)> {
        let (_, lat) = self.first_of(LATITUDE_KEYS)?;
        let (_, lng) = self.first_of(LONGITUDE_KEYS)?;
        Some((lat, lng))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for StationAttributes {
    fn from(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }
}

/// One ranked reuse option for the station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(alias = "type")]
    pub usage_type: String,
    #[serde(default, alias = "similarity")]
    pub score: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Recommendation {
    pub fn new(usage_type: impl Into<String>) -> Self {
        Self {
            usage_type: usage_type.into(),
            score: None,
            description: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn render(&self) -> String {
        let usage = if self.usage_type.trim().is_empty() {
            "undetermined"
        } else {
            self.usage_type.trim()
        };
        let mut line = usage.to_string();
        if let Some(score) = self.score.filter(|s| s.is_finite()) {
            line.push_str(&format!(" (score: {:.3})", score));
        }
        if let Some(description) = self.description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            line.push_str(" - ");
            line.push_str(description);
        }
        line
    }
}

/// Parcel counts per area class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaBuckets {
    #[serde(default, alias = "소형")]
    pub small: u64,
    #[serde(default, alias = "중형")]
    pub medium: u64,
    #[serde(default, alias = "대형")]
    pub large: u64,
    #[serde(default, alias = "초대형")]
    pub xlarge: u64,
}

impl AreaBuckets {
    /// Non-zero buckets as `(label, count)`, smallest class first
    pub fn non_zero(&self) -> Vec<(&'static str, u64)> {
        [
            ("small", self.small),
            ("medium", self.medium),
            ("large", self.large),
            ("extra-large", self.xlarge),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandUseCount {
    #[serde(rename = "use")]
    pub land_use: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestParcel {
    pub distance_m: f64,
    #[serde(default)]
    pub label: Option<String>,
}

/// Statistics of the parcels around the station
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelSummary {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default, alias = "average_area")]
    pub average_area_m2: f64,
    #[serde(default)]
    pub bucket_counts: AreaBuckets,
    #[serde(default)]
    pub top_land_uses: Vec<LandUseCount>,
    #[serde(default)]
    pub closest: Option<ClosestParcel>,
}

impl ParcelSummary {
    fn closest_with_distance(&self) -> Option<&ClosestParcel> {
        self.closest
            .as_ref()
            .filter(|c| c.distance_m.is_finite() && c.distance_m > 0.0)
    }

    /// First named land use
    pub fn dominant_land_use(&self) -> Option<&str> {
        self.top_land_uses
            .first()
            .map(|lu| lu.land_use.trim())
            .filter(|lu| !lu.is_empty())
    }

    fn distribution(&self) -> Option<String> {
        let buckets = self.bucket_counts.non_zero();
        if buckets.is_empty() {
            return None;
        }
        Some(
            buckets
                .iter()
                .map(|(label, count)| format!("{} {}", label, count))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    /// Multi-line rendering for the prompt
    fn render(&self) -> String {
        let mut lines = vec![format!(
            "{} parcels, average area about {:.0} m2",
            self.total_count, self.average_area_m2
        )];

        if let Some(distribution) = self.distribution() {
            lines.push(format!("Area distribution: {}", distribution));
        }

        let uses = self
            .top_land_uses
            .iter()
            .filter(|lu| !lu.land_use.trim().is_empty())
            .map(|lu| format!("{} {}", lu.land_use.trim(), lu.count))
            .collect::<Vec<_>>();
        if !uses.is_empty() {
            lines.push(format!("Main land uses: {}", uses.join(", ")));
        }

        if let Some(closest) = self.closest_with_distance() {
            lines.push(format!(
                "{} at {:.0} m from the map centre",
                closest.label.as_deref().unwrap_or("Nearest parcel"),
                closest.distance_m
            ));
        }

        lines.join("\n")
    }

    /// One-paragraph description used by the deterministic report
    pub(crate) fn describe(&self) -> Option<String> {
        if self.total_count == 0 {
            return None;
        }

        let mut phrases = vec![format!(
            "Within {} m there are {} parcels with an average area of about {:.0} m2.",
            PARCEL_RADIUS_M, self.total_count, self.average_area_m2
        )];
        if let Some(distribution) = self.distribution() {
            phrases.push(format!("The area distribution is {}.", distribution));
        }
        if let Some(land_use) = self.dominant_land_use() {
            phrases.push(format!("The dominant land use is '{}'.", land_use));
        }
        if let Some(closest) = self.closest_with_distance() {
            phrases.push(format!(
                "The {} about {:.0} m from the map centre could serve as an anchor.",
                closest.label.as_deref().unwrap_or("adjacent parcel"),
                closest.distance_m
            ));
        }
        Some(phrases.join(" "))
    }
}

/// Everything known about one station when its report is requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteContext {
    pub station_id: String,
    #[serde(default)]
    pub attributes: StationAttributes,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub parcels: Option<ParcelSummary>,
}

impl SiteContext {
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            ..Self::default()
        }
    }

    /// Station name, or a generic label
    pub fn display_name(&self) -> String {
        self.attributes
            .name()
            .unwrap_or_else(|| "the station".to_string())
    }
}

/// Renders a `SiteContext` into the user message of a completion request
#[derive(Debug, Clone, Copy)]
pub struct PromptAssembler {
    max_recommendations: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            max_recommendations: MAX_RECOMMENDATIONS,
        }
    }
}

impl PromptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assemble(&self, context: &SiteContext) -> String {
        let identifier = format!("ID {} - {}", context.station_id, context.display_name());

        format!(
            "Analyse the fuel station below and respond in JSON only with a site summary \
             (2-3 sentences), 3 insights and 3 recommended actions.\n\
             JSON keys are summary (string), insights (list of strings) and actions (list of strings).\n\
             Write every sentence in a business report tone and include no other explanation or markdown.\n\n\
             [Target station] {}\n\
             [Station details]\n{}\n\n\
             [Recommended uses]\n{}\n\
             [Parcel statistics within {} m]\n{}\n",
            identifier,
            self.station_details(&context.attributes),
            self.recommendations(&context.recommendations),
            PARCEL_RADIUS_M,
            context
                .parcels
                .as_ref()
                .filter(|p| p.total_count > 0)
                .map(ParcelSummary::render)
                .unwrap_or_else(|| "Not enough parcel data within the radius.".to_string()),
        )
    }

    fn station_details(&self, attributes: &StationAttributes) -> String {
        let mut parts = PROMPT_ATTRIBUTE_KEYS
            .iter()
            .filter_map(|keys| attributes.first_of(keys))
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>();

        if let Some((lat, lng)) = attributes.coordinates() {
            parts.push(format!("Location: latitude {}, longitude {}", lat, lng));
        }

        if parts.is_empty() {
            "Few details were provided.".to_string()
        } else {
            parts.join(" | ")
        }
    }

    fn recommendations(&self, recommendations: &[Recommendation]) -> String {
        if recommendations.is_empty() {
            return "No recommendations".to_string();
        }
        recommendations
            .iter()
            .take(self.max_recommendations)
            .map(Recommendation::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
