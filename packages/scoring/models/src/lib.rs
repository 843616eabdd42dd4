#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Candidate, layer, and score record types for energy-storage siting.
//!
//! These types carry the inputs of an evaluation run (candidate sites and
//! the weighted infrastructure, census, and critical-zone layers) and its
//! outputs (one [`ScoreRecord`] per candidate plus a [`RunSummary`]). They
//! hold no scoring logic; see `storage_siting_scoring` for that.

use std::collections::BTreeMap;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Tolerance applied when checking that a weight vector sums to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

// ── Configuration enums ─────────────────────────────────────────────

/// Which siting model a run uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    /// Fixed installations scored against a buffer (service area) around
    /// each candidate.
    Static,
    /// Mobile units scored by travel from the candidate to infrastructure
    /// inside a shared coverage area.
    Mobile,
}

/// How distances between two points are measured.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistanceMode {
    /// Great-circle (Haversine) distance.
    #[default]
    StraightLine,
    /// Distance and travel time from the routing oracle.
    RoadNetwork,
}

/// How a raw category or attribute score is mapped into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Normalization {
    /// `raw / value`, clamped to `[0, 1]`.
    Reference {
        /// Raw value that maps to a normalized score of 1.0.
        value: f64,
    },
    /// `(raw - min) / (max - min)` across the scored candidates of a run.
    ///
    /// When every candidate has the same raw value the normalized score
    /// is 1.0 for a positive raw value and 0.0 otherwise.
    MinMax,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::Reference { value: 1.0 }
    }
}

/// The travel quantity mobile infrastructure scoring decays over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MobileMetric {
    /// Route (or straight-line) distance in meters.
    Distance,
    /// Travel time (ETA) in seconds.
    #[default]
    Duration,
}

/// How per-feature decay scores are combined into a category score in
/// the mobile model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MobileAggregation {
    /// Score of the closest feature only.
    #[default]
    Nearest,
    /// Sum of every feature's decay score.
    Sum,
}

/// Which geometry is tested against critical-zone polygons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneContext {
    /// The candidate location itself.
    #[default]
    Point,
    /// The candidate's service area (the buffer in the static model, the
    /// point in the mobile model).
    ServiceArea,
}

// ── Model parameters ────────────────────────────────────────────────

/// Parameters specific to the static (buffer-based) model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticParams {
    /// Buffer (service area) radius in meters.
    pub buffer_m: f64,
    /// How candidate-to-infrastructure distances are measured.
    #[serde(default)]
    pub distance_mode: DistanceMode,
    /// Number of vertices used to approximate the buffer circle.
    #[serde(default = "default_buffer_segments")]
    pub buffer_segments: usize,
    /// Outage-cost savings estimation. Omitted means no estimate.
    #[serde(default)]
    pub economic: Option<EconomicParams>,
}

/// Inputs of the outage-cost savings estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicParams {
    /// Census attribute holding the population or load exposed to an
    /// outage (e.g. `"population"`).
    pub exposure_attribute: String,
    /// Cost of one hour of outage per unit of exposure.
    #[serde(default)]
    pub cost_per_unit: f64,
    /// Outage duration the storage installation would bridge, in hours.
    #[serde(default = "default_outage_hours")]
    pub outage_hours: f64,
}

/// Parameters specific to the mobile (coverage-based) model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileParams {
    /// How candidate-to-infrastructure travel is measured.
    #[serde(default = "default_mobile_distance_mode")]
    pub distance_mode: DistanceMode,
    /// Whether scores decay over distance or travel time.
    #[serde(default)]
    pub metric: MobileMetric,
    /// How feature scores combine within a category.
    #[serde(default)]
    pub aggregation: MobileAggregation,
    /// Distance (meters) or duration (seconds) at which a feature scores
    /// exactly 0.5.
    #[serde(default = "default_decay_scale")]
    pub decay_scale: f64,
    /// Speed used to estimate travel time when no route duration is
    /// available, in meters per second.
    #[serde(default = "default_fallback_speed_mps")]
    pub fallback_speed_mps: f64,
}

impl Default for MobileParams {
    fn default() -> Self {
        Self {
            distance_mode: default_mobile_distance_mode(),
            metric: MobileMetric::default(),
            aggregation: MobileAggregation::default(),
            decay_scale: default_decay_scale(),
            fallback_speed_mps: default_fallback_speed_mps(),
        }
    }
}

const fn default_buffer_segments() -> usize {
    36
}

const fn default_outage_hours() -> f64 {
    1.0
}

const fn default_mobile_distance_mode() -> DistanceMode {
    DistanceMode::RoadNetwork
}

/// Ten minutes, matching the default duration metric.
const fn default_decay_scale() -> f64 {
    600.0
}

/// Roughly 50 km/h.
const fn default_fallback_speed_mps() -> f64 {
    13.9
}

// ── Input layers ────────────────────────────────────────────────────

/// A location under evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stable identifier, unique within a run.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Input geometry. Points are used as-is; polygons are reduced to
    /// their centroid. `None` marks a feature without geometry.
    pub geometry: Option<Geometry<f64>>,
}

/// A single critical-infrastructure facility.
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureFeature {
    /// Source identifier, if the layer provided one.
    pub id: Option<String>,
    /// Facility location.
    pub geometry: Option<Geometry<f64>>,
    /// Cost of one hour of outage at this facility.
    pub outage_cost: Option<f64>,
}

/// One infrastructure category (e.g. hospitals).
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureLayer {
    /// Category name, used as the record key.
    pub name: String,
    /// Facilities in this category.
    pub features: Vec<InfrastructureFeature>,
    /// Mapping from raw category score to `[0, 1]`.
    pub normalization: Normalization,
}

/// A census polygon with its numeric attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusPolygon {
    /// Polygon boundary.
    pub geometry: Option<Geometry<f64>>,
    /// Attribute name → value.
    pub attributes: BTreeMap<String, f64>,
}

/// A layer of census polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusLayer {
    /// Layer name.
    pub name: String,
    /// Polygons in this layer.
    pub features: Vec<CensusPolygon>,
}

/// A census attribute that contributes to the demographic score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusAttribute {
    /// Attribute name as it appears on the census polygons.
    pub name: String,
    /// Mapping from sampled value to `[0, 1]`.
    #[serde(default)]
    pub normalization: Normalization,
}

/// A polygon of a critical-zone layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFeature {
    /// Zone boundary.
    pub geometry: Option<Geometry<f64>>,
}

/// A critical-zone layer (e.g. flood zones, industrial parks).
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalZoneLayer {
    /// Layer name, used as the record key.
    pub name: String,
    /// Zone polygons.
    pub features: Vec<ZoneFeature>,
}

/// Every layer and weight vector shared by both models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitingInputs {
    /// Infrastructure categories.
    pub infrastructure: Vec<InfrastructureLayer>,
    /// One weight per infrastructure layer, in layer order.
    pub infrastructure_weights: Vec<f64>,
    /// Census polygon layers, merged for sampling.
    pub census_layers: Vec<CensusLayer>,
    /// Attributes sampled from the census layers.
    pub census_attributes: Vec<CensusAttribute>,
    /// One weight per census attribute, in attribute order.
    pub census_weights: Vec<f64>,
    /// Critical-zone layers.
    pub zones: Vec<CriticalZoneLayer>,
    /// One additive modifier per zone layer, in layer order.
    pub zone_modifiers: Vec<f64>,
    /// Geometry tested against zone polygons.
    pub zone_context: ZoneContext,
}

// ── Output records ──────────────────────────────────────────────────

/// Outcome of scoring one candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    /// Every component was scored.
    Ok,
    /// The candidate could not be scored; all sub-scores are zero.
    PartialFailure,
    /// The candidate lies outside the mobile coverage area.
    Excluded,
}

/// Score detail for one infrastructure category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureScore {
    /// Category name.
    pub category: String,
    /// Facilities within the service or coverage area.
    pub count: u32,
    /// Aggregated decay score before normalization.
    pub raw: f64,
    /// Score in `[0, 1]`.
    pub normalized: f64,
    /// Category weight.
    pub weight: f64,
    /// `normalized × weight`.
    pub weighted: f64,
    /// Distance to the closest counted facility, in meters.
    pub nearest_meters: Option<f64>,
    /// Travel time to the closest counted facility, in seconds.
    pub nearest_seconds: Option<f64>,
    /// Summed hourly outage cost of facilities that contributed.
    pub outage_cost: f64,
    /// Distance queries answered by the routing oracle.
    pub network_queries: u32,
    /// Distance queries that fell back to straight-line distance.
    pub fallback_queries: u32,
    /// Facilities skipped because their distance could not be computed.
    pub invalid_features: u32,
}

impl InfrastructureScore {
    /// A zeroed entry for `category`.
    #[must_use]
    pub fn empty(category: &str, weight: f64) -> Self {
        Self {
            category: category.to_string(),
            count: 0,
            raw: 0.0,
            normalized: 0.0,
            weight,
            weighted: 0.0,
            nearest_meters: None,
            nearest_seconds: None,
            outage_cost: 0.0,
            network_queries: 0,
            fallback_queries: 0,
            invalid_features: 0,
        }
    }
}

/// Score detail for one census attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CensusScore {
    /// Attribute name.
    pub attribute: String,
    /// Sampled (area-weighted) attribute value.
    pub value: f64,
    /// Score in `[0, 1]`.
    pub normalized: f64,
    /// Attribute weight.
    pub weight: f64,
    /// `normalized × weight`.
    pub weighted: f64,
}

impl CensusScore {
    /// A zeroed entry for `attribute`.
    #[must_use]
    pub fn empty(attribute: &str, weight: f64) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: 0.0,
            normalized: 0.0,
            weight,
            weighted: 0.0,
        }
    }
}

/// Critical-zone detail for one zone layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneScore {
    /// Zone layer name.
    pub zone: String,
    /// Whether the candidate falls in any polygon of the layer.
    pub inside: bool,
    /// Modifier applied (the layer modifier when inside, else 0).
    pub applied: f64,
}

/// The per-candidate result of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Candidate identifier.
    pub candidate_id: String,
    /// Candidate display name.
    pub name: String,
    /// Scoring outcome.
    pub status: RecordStatus,
    /// Why the candidate could not be scored.
    pub failure: Option<String>,
    /// Per-category infrastructure detail, in layer order.
    pub infrastructure: Vec<InfrastructureScore>,
    /// Per-attribute census detail, in attribute order.
    pub census: Vec<CensusScore>,
    /// `false` when no census polygon matched the candidate ("no data"),
    /// as opposed to a genuine zero.
    pub census_available: bool,
    /// Per-layer zone detail, in layer order.
    pub zones: Vec<ZoneScore>,
    /// Sum of weighted infrastructure scores.
    pub infrastructure_total: f64,
    /// Sum of weighted census scores.
    pub census_total: f64,
    /// Sum of applied zone modifiers.
    pub zone_total: f64,
    /// `infrastructure_total + census_total + zone_total`.
    pub final_score: f64,
    /// 1-based rank among successfully scored candidates.
    pub rank: Option<u32>,
    /// Estimated outage-cost savings (static model only).
    pub outage_savings: Option<f64>,
}

impl ScoreRecord {
    /// Total fallback distance queries across all categories.
    #[must_use]
    pub fn fallback_queries(&self) -> u64 {
        self.infrastructure
            .iter()
            .map(|s| u64::from(s.fallback_queries))
            .sum()
    }

    /// Total routed distance queries across all categories.
    #[must_use]
    pub fn network_queries(&self) -> u64 {
        self.infrastructure
            .iter()
            .map(|s| u64::from(s.network_queries))
            .sum()
    }

    /// Looks up the infrastructure detail for `category`.
    #[must_use]
    pub fn infrastructure_score(&self, category: &str) -> Option<&InfrastructureScore> {
        self.infrastructure.iter().find(|s| s.category == category)
    }

    /// Looks up the census detail for `attribute`.
    #[must_use]
    pub fn census_score(&self, attribute: &str) -> Option<&CensusScore> {
        self.census.iter().find(|s| s.attribute == attribute)
    }
}

/// Aggregate counters for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Model used.
    pub model: ModelKind,
    /// Candidates supplied.
    pub candidates: usize,
    /// Records emitted (ok + partial failure).
    pub scored: usize,
    /// Candidates excluded by the mobile coverage area.
    pub excluded: usize,
    /// Records with [`RecordStatus::PartialFailure`].
    pub partial_failures: usize,
    /// Distance queries answered by the routing oracle.
    pub network_queries: u64,
    /// Distance queries that fell back to straight-line distance.
    pub fallback_queries: u64,
    /// Layer features dropped during validation for unusable geometry.
    pub invalid_features: usize,
}

/// Everything an evaluation run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// One record per scored candidate, in input order.
    pub records: Vec<ScoreRecord>,
    /// Identifiers of candidates excluded by coverage, in input order.
    pub excluded: Vec<String>,
    /// Aggregate counters.
    pub summary: RunSummary,
}
