//! Writes scored records as `GeoJSON` and the run summary as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use geo::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use storage_siting_scoring_models::{Candidate, RecordStatus, RunReport, ScoreRecord};
use storage_siting_spatial::{geodesic_buffer, point_of};
use strum::{AsRefStr, Display, EnumString};

use crate::LayerError;

/// Which geometry each output feature carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputGeometry {
    /// The candidate's input geometry.
    #[default]
    Candidate,
    /// The static-model buffer around the candidate.
    ServiceArea,
}

/// Output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputOptions {
    pub geometry: OutputGeometry,
    /// Emit features for candidates excluded by coverage.
    pub include_excluded: bool,
    /// Buffer radius and segment count, for [`OutputGeometry::ServiceArea`].
    pub buffer: Option<(f64, usize)>,
}

/// Builds the output `FeatureCollection`.
///
/// Features follow the candidate input order. Each carries flat
/// properties for every sub-score plus totals, rank, and `status`.
#[must_use]
pub fn to_feature_collection(
    report: &RunReport,
    candidates: &[Candidate],
    options: &OutputOptions,
) -> FeatureCollection {
    let records: BTreeMap<&str, &ScoreRecord> = report
        .records
        .iter()
        .map(|r| (r.candidate_id.as_str(), r))
        .collect();

    let features = candidates
        .iter()
        .filter_map(|candidate| {
            let properties = match records.get(candidate.id.as_str()) {
                Some(record) => record_properties(record),
                None if options.include_excluded
                    && report.excluded.contains(&candidate.id) =>
                {
                    excluded_properties(candidate)
                }
                None => return None,
            };

            Some(Feature {
                bbox: None,
                geometry: output_geometry(candidate, options)
                    .map(|g| geojson::Geometry::new(geojson::Value::from(&g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn output_geometry(candidate: &Candidate, options: &OutputOptions) -> Option<Geometry<f64>> {
    if let (OutputGeometry::ServiceArea, Some((radius_m, segments))) =
        (options.geometry, options.buffer)
    {
        if let Some(buffer) = point_of(candidate.geometry.as_ref())
            .and_then(|point| geodesic_buffer(point, radius_m, segments))
            .ok()
        {
            return Some(Geometry::MultiPolygon(buffer));
        }
    }
    candidate.geometry.clone()
}

fn number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

fn optional_number(value: Option<f64>) -> JsonValue {
    value.map_or(JsonValue::Null, number)
}

fn record_properties(record: &ScoreRecord) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("candidate_id".into(), record.candidate_id.clone().into());
    props.insert("name".into(), record.name.clone().into());
    props.insert("status".into(), record.status.as_ref().into());
    if let Some(failure) = &record.failure {
        props.insert("failure".into(), failure.clone().into());
    }
    props.insert("rank".into(), record.rank.map_or(JsonValue::Null, Into::into));
    props.insert("final_score".into(), number(record.final_score));
    props.insert("infrastructure_total".into(), number(record.infrastructure_total));
    props.insert("census_total".into(), number(record.census_total));
    props.insert("zone_total".into(), number(record.zone_total));
    props.insert("census_available".into(), record.census_available.into());
    props.insert("outage_savings".into(), optional_number(record.outage_savings));

    for s in &record.infrastructure {
        let key = |suffix: &str| format!("infra_{}_{suffix}", s.category);
        props.insert(key("count"), s.count.into());
        props.insert(key("raw"), number(s.raw));
        props.insert(key("score"), number(s.normalized));
        props.insert(key("weighted"), number(s.weighted));
        props.insert(key("nearest_m"), optional_number(s.nearest_meters));
        props.insert(key("nearest_s"), optional_number(s.nearest_seconds));
        props.insert(key("fallback"), s.fallback_queries.into());
    }

    for s in &record.census {
        let key = |suffix: &str| format!("census_{}_{suffix}", s.attribute);
        props.insert(key("value"), number(s.value));
        props.insert(key("score"), number(s.normalized));
        props.insert(key("weighted"), number(s.weighted));
    }

    for z in &record.zones {
        props.insert(format!("zone_{}", z.zone), number(z.applied));
        props.insert(format!("zone_{}_inside", z.zone), z.inside.into());
    }

    props
}

fn excluded_properties(candidate: &Candidate) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("candidate_id".into(), candidate.id.clone().into());
    props.insert("name".into(), candidate.name.clone().into());
    props.insert("status".into(), RecordStatus::Excluded.as_ref().into());
    props
}

fn write_json(path: &Path, json: &str) -> Result<(), LayerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LayerError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| LayerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the scored candidates as a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`LayerError::Io`] or [`LayerError::Json`].
pub fn write_records(
    path: &Path,
    report: &RunReport,
    candidates: &[Candidate],
    options: &OutputOptions,
) -> Result<(), LayerError> {
    let collection = to_feature_collection(report, candidates, options);
    let count = collection.features.len();
    write_json(path, &serde_json::to_string_pretty(&collection)?)?;
    log::info!("Wrote {count} features to {}", path.display());
    Ok(())
}

/// Writes the run summary and excluded ids as JSON.
///
/// # Errors
///
/// Returns [`LayerError::Io`] or [`LayerError::Json`].
pub fn write_summary(path: &Path, report: &RunReport) -> Result<(), LayerError> {
    let body = serde_json::json!({
        "summary": report.summary,
        "excluded": report.excluded,
    });
    write_json(path, &serde_json::to_string_pretty(&body)?)?;
    log::info!("Wrote run summary to {}", path.display());
    Ok(())
}
