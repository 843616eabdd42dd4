//! Loads `GeoJSON` layer files into scoring inputs.
//!
//! Geometry that `geo` cannot represent is kept as `None` so the runner can
//! drop and count it like any other unusable feature.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson, feature::Id};
use serde_json::Value;
use storage_siting_scoring_models::{
    Candidate, CensusLayer, CensusPolygon, CriticalZoneLayer, InfrastructureFeature,
    InfrastructureLayer, Normalization, ZoneFeature,
};

use crate::LayerError;

const ID_KEYS: &[&str] = &["id", "Id", "ID"];
const NAME_KEYS: &[&str] = &["name", "Name", "NAME"];
const OUTAGE_COST_KEYS: &[&str] = &["outage_cost", "outage_cos"];

/// Reads the features of a `GeoJSON` file.
///
/// A `FeatureCollection` yields its features, a single `Feature` yields
/// itself, and a bare geometry becomes one feature without properties.
///
/// # Errors
///
/// Returns [`LayerError::Io`] or [`LayerError::GeoJson`].
pub fn read_features(path: &Path) -> Result<Vec<Feature>, LayerError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let geojson: GeoJson = text.parse().map_err(|e| LayerError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    log::debug!("Read {} features from {}", features.len(), path.display());

    Ok(features)
}

/// Converts a feature's geometry, `None` if absent or unrepresentable.
fn geometry_of(path: &Path, index: usize, feature: &Feature) -> Option<Geometry<f64>> {
    let geometry = feature.geometry.clone()?;
    Geometry::<f64>::try_from(geometry)
        .inspect_err(|e| {
            log::warn!("{}: feature {index} has unusable geometry: {e}", path.display());
        })
        .ok()
}

/// First present, non-null property among `keys`.
fn first_property<'a>(feature: &'a Feature, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| feature.property(key))
        .find(|value| !value.is_null())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a numeric property value; numeric strings are accepted.
fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn feature_id(feature: &Feature) -> Option<String> {
    first_property(feature, ID_KEYS)
        .and_then(text_of)
        .or_else(|| match &feature.id {
            Some(Id::String(s)) => Some(s.clone()),
            Some(Id::Number(n)) => Some(n.to_string()),
            None => None,
        })
}

fn required_number(
    path: &Path,
    index: usize,
    property: &str,
    value: &Value,
) -> Result<f64, LayerError> {
    number_of(value).ok_or_else(|| LayerError::Property {
        path: path.to_path_buf(),
        feature: index,
        property: property.to_string(),
        value: value.to_string(),
    })
}

/// Loads candidate sites.
///
/// The id comes from an `id`/`Id`/`ID` property or the feature id,
/// falling back to the 1-based position in the file. The name comes from
/// a `name`/`Name`/`NAME` property, falling back to `"Candidate {id}"`.
///
/// # Errors
///
/// Returns [`LayerError`] if the file cannot be read or parsed.
pub fn read_candidates(path: &Path) -> Result<Vec<Candidate>, LayerError> {
    let features = read_features(path)?;

    let candidates: Vec<Candidate> = features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let id = feature_id(feature).unwrap_or_else(|| (i + 1).to_string());
            let name = first_property(feature, NAME_KEYS)
                .and_then(text_of)
                .unwrap_or_else(|| format!("Candidate {id}"));

            Candidate {
                geometry: geometry_of(path, i, feature),
                id,
                name,
            }
        })
        .collect();

    log::info!("Loaded {} candidates from {}", candidates.len(), path.display());

    Ok(candidates)
}

/// Loads one infrastructure category.
///
/// # Errors
///
/// Returns [`LayerError::Property`] if an outage cost is present but not
/// numeric, or a read/parse error.
pub fn read_infrastructure(
    path: &Path,
    name: &str,
    normalization: Normalization,
) -> Result<InfrastructureLayer, LayerError> {
    let features = read_features(path)?;

    let features = features
        .iter()
        .enumerate()
        .map(|(i, feature)| -> Result<InfrastructureFeature, LayerError> {
            let outage_cost = OUTAGE_COST_KEYS
                .iter()
                .find_map(|key| {
                    feature
                        .property(key)
                        .filter(|v| !v.is_null())
                        .map(|v| (key, v))
                })
                .map(|(key, value)| required_number(path, i, key, value))
                .transpose()?;

            Ok(InfrastructureFeature {
                id: feature_id(feature),
                geometry: geometry_of(path, i, feature),
                outage_cost,
            })
        })
        .collect::<Result<Vec<_>, LayerError>>()?;

    log::info!(
        "Loaded {} {name} features from {}",
        features.len(),
        path.display()
    );

    Ok(InfrastructureLayer {
        name: name.to_string(),
        features,
        normalization,
    })
}

/// Loads a census polygon layer.
///
/// Every numeric property is kept as an attribute. The attributes named in
/// `required` must be numeric wherever they are present.
///
/// # Errors
///
/// Returns [`LayerError::Property`] if a required attribute holds a
/// non-numeric value, or a read/parse error.
pub fn read_census(path: &Path, required: &[&str]) -> Result<CensusLayer, LayerError> {
    let features = read_features(path)?;

    let features = features
        .iter()
        .enumerate()
        .map(|(i, feature)| -> Result<CensusPolygon, LayerError> {
            let mut attributes = BTreeMap::new();

            for (key, value) in feature.properties_iter() {
                if value.is_null() {
                    continue;
                }
                if required.contains(&key.as_str()) {
                    attributes.insert(key.clone(), required_number(path, i, key, value)?);
                } else if let Some(number) = number_of(value) {
                    attributes.insert(key.clone(), number);
                }
            }

            Ok(CensusPolygon {
                geometry: geometry_of(path, i, feature),
                attributes,
            })
        })
        .collect::<Result<Vec<_>, LayerError>>()?;

    log::info!(
        "Loaded {} census polygons from {}",
        features.len(),
        path.display()
    );

    Ok(CensusLayer {
        name: layer_name(path),
        features,
    })
}

/// Loads a critical-zone layer.
///
/// # Errors
///
/// Returns a read/parse [`LayerError`].
pub fn read_zone(path: &Path, name: &str) -> Result<CriticalZoneLayer, LayerError> {
    let features: Vec<ZoneFeature> = read_features(path)?
        .iter()
        .enumerate()
        .map(|(i, feature)| ZoneFeature {
            geometry: geometry_of(path, i, feature),
        })
        .collect();

    log::info!(
        "Loaded {} {name} zone polygons from {}",
        features.len(),
        path.display()
    );

    Ok(CriticalZoneLayer {
        name: name.to_string(),
        features,
    })
}

/// Loads the mobile coverage area, merging every polygon in the file.
///
/// Returns `None` when the file has no polygonal geometry, which the
/// runner reports as a missing coverage area.
///
/// # Errors
///
/// Returns a read/parse [`LayerError`].
pub fn read_coverage(path: &Path) -> Result<Option<Geometry<f64>>, LayerError> {
    let features = read_features(path)?;

    let mut polygons = Vec::new();
    for (i, feature) in features.iter().enumerate() {
        match geometry_of(path, i, feature) {
            Some(Geometry::Polygon(polygon)) => polygons.push(polygon),
            Some(Geometry::MultiPolygon(multi)) => polygons.extend(multi.0),
            Some(_) => log::warn!(
                "{}: ignoring non-polygon coverage feature {i}",
                path.display()
            ),
            None => {}
        }
    }

    Ok(match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon(polygons))),
    })
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_layer(dir: &str, file: &str, body: &serde_json::Value) -> PathBuf {
        let dir = std::env::temp_dir().join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file);
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn point_feature(properties: serde_json::Value, lon: f64, lat: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": properties
        })
    }

    fn square_feature(properties: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
            },
            "properties": properties
        })
    }

    fn collection(features: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({ "type": "FeatureCollection", "features": features })
    }

    #[test]
    fn candidates_fall_back_to_position_and_default_name() {
        let path = write_layer(
            "storage_siting_reader_candidates",
            "candidates.geojson",
            &collection(vec![
                point_feature(serde_json::json!({ "ID": 42, "Name": "Pier" }), -66.1, 18.4),
                point_feature(serde_json::json!({}), -66.2, 18.5),
                serde_json::json!({
                    "type": "Feature",
                    "geometry": null,
                    "properties": { "name": "Nowhere" }
                }),
            ]),
        );

        let candidates = read_candidates(&path).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].id, "42");
        assert_eq!(candidates[0].name, "Pier");
        assert_eq!(candidates[1].id, "2");
        assert_eq!(candidates[1].name, "Candidate 2");
        assert!(candidates[2].geometry.is_none());
        assert_eq!(candidates[2].name, "Nowhere");
    }

    #[test]
    fn infrastructure_reads_truncated_outage_cost_key() {
        let path = write_layer(
            "storage_siting_reader_infra",
            "hospitals.geojson",
            &collection(vec![
                point_feature(serde_json::json!({ "outage_cos": 1200.5 }), -66.1, 18.4),
                point_feature(serde_json::json!({ "outage_cost": "300" }), -66.1, 18.4),
                point_feature(serde_json::json!({ "outage_cost": null }), -66.1, 18.4),
            ]),
        );

        let layer = read_infrastructure(&path, "hospitals", Normalization::default()).unwrap();
        let costs: Vec<_> = layer.features.iter().map(|f| f.outage_cost).collect();
        assert_eq!(costs, vec![Some(1200.5), Some(300.0), None]);
    }

    #[test]
    fn infrastructure_rejects_non_numeric_outage_cost() {
        let path = write_layer(
            "storage_siting_reader_infra_bad",
            "hospitals.geojson",
            &collection(vec![point_feature(
                serde_json::json!({ "outage_cost": "expensive" }),
                -66.1,
                18.4,
            )]),
        );

        let err = read_infrastructure(&path, "hospitals", Normalization::default()).unwrap_err();
        assert!(matches!(err, LayerError::Property { feature: 0, .. }), "{err}");
    }

    #[test]
    fn census_keeps_numeric_attributes() {
        let path = write_layer(
            "storage_siting_reader_census",
            "tracts.geojson",
            &collection(vec![square_feature(serde_json::json!({
                "GEOID": "72127",
                "population": 5000,
                "median_income": "31000.5",
                "notes": "coastal"
            }))]),
        );

        let layer = read_census(&path, &["population"]).unwrap();
        assert_eq!(layer.name, "tracts");
        let attributes = &layer.features[0].attributes;
        assert_eq!(attributes.get("population"), Some(&5_000.0));
        assert_eq!(attributes.get("median_income"), Some(&31_000.5));
        assert_eq!(attributes.get("GEOID"), Some(&72_127.0));
        assert!(!attributes.contains_key("notes"));
    }

    #[test]
    fn census_rejects_non_numeric_required_attribute() {
        let path = write_layer(
            "storage_siting_reader_census_bad",
            "tracts.geojson",
            &collection(vec![square_feature(serde_json::json!({ "population": "many" }))]),
        );

        assert!(matches!(
            read_census(&path, &["population"]),
            Err(LayerError::Property { .. })
        ));
    }

    #[test]
    fn coverage_merges_polygons() {
        let path = write_layer(
            "storage_siting_reader_coverage",
            "coverage.geojson",
            &collection(vec![
                square_feature(serde_json::json!({})),
                square_feature(serde_json::json!({})),
                point_feature(serde_json::json!({}), 0.5, 0.5),
            ]),
        );

        let coverage = read_coverage(&path).unwrap();
        assert!(matches!(coverage, Some(Geometry::MultiPolygon(ref mp)) if mp.0.len() == 2));
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = std::env::temp_dir().join("storage_siting_reader_malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.geojson");
        std::fs::write(&path, "{ not geojson").unwrap();

        assert!(matches!(read_features(&path), Err(LayerError::GeoJson { .. })));
        assert!(matches!(
            read_features(&dir.join("missing.geojson")),
            Err(LayerError::Io { .. })
        ));
    }
}
