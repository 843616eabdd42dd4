//! Run-scoped layer indexes and per-candidate geometry.

use std::collections::BTreeMap;

use geo::{MultiPolygon, Point};
use storage_siting_scoring_models::{Candidate, Normalization, SitingInputs, ZoneContext};
use storage_siting_spatial::{
    GeometryError, PointIndex, PolygonIndex, geodesic_buffer, multipolygon_of, point_of,
};

/// Data kept for each indexed infrastructure facility.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    /// Source identifier, if any.
    pub id: Option<String>,
    /// Hourly outage cost (0 when the layer gave none).
    pub outage_cost: f64,
}

/// One infrastructure category ready for queries.
pub struct CompiledCategory {
    pub name: String,
    pub weight: f64,
    pub normalization: Normalization,
    pub facilities: PointIndex<Facility>,
}

/// One census attribute with its validated weight.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAttribute {
    pub name: String,
    pub weight: f64,
    pub normalization: Normalization,
}

/// One critical-zone layer ready for queries.
pub struct CompiledZone {
    pub name: String,
    pub modifier: f64,
    pub polygons: PolygonIndex<()>,
}

/// Every layer of a run, validated and indexed.
///
/// Built once per run; read-only while candidates are scored.
pub struct CompiledLayers {
    pub categories: Vec<CompiledCategory>,
    /// Census polygons of every census layer, merged in layer order.
    pub census: PolygonIndex<BTreeMap<String, f64>>,
    pub attributes: Vec<CompiledAttribute>,
    pub zones: Vec<CompiledZone>,
    pub zone_context: ZoneContext,
    /// Layer features dropped because their geometry was unusable.
    pub invalid_features: usize,
}

impl CompiledLayers {
    /// Indexes `inputs` using already validated weight vectors.
    ///
    /// Features whose geometry cannot be used are dropped with a warning
    /// and counted in [`Self::invalid_features`].
    #[must_use]
    pub fn compile(
        inputs: &SitingInputs,
        infrastructure_weights: &[f64],
        census_weights: &[f64],
    ) -> Self {
        let mut invalid_features = 0;

        let categories = inputs
            .infrastructure
            .iter()
            .zip(infrastructure_weights)
            .map(|(layer, &weight)| {
                let mut points = Vec::with_capacity(layer.features.len());
                for (i, feature) in layer.features.iter().enumerate() {
                    match point_of(feature.geometry.as_ref()) {
                        Ok(point) => points.push((
                            point,
                            Facility {
                                id: feature.id.clone(),
                                outage_cost: feature
                                    .outage_cost
                                    .filter(|c| c.is_finite() && *c >= 0.0)
                                    .unwrap_or(0.0),
                            },
                        )),
                        Err(e) => {
                            log::warn!("Dropping {} feature {i}: {e}", layer.name);
                            invalid_features += 1;
                        }
                    }
                }

                log::debug!("Category {}: {} facilities", layer.name, points.len());

                CompiledCategory {
                    name: layer.name.clone(),
                    weight,
                    normalization: layer.normalization,
                    facilities: PointIndex::build(points),
                }
            })
            .collect();

        let mut census_polygons = Vec::new();
        for layer in &inputs.census_layers {
            for (i, feature) in layer.features.iter().enumerate() {
                match multipolygon_of(feature.geometry.as_ref()) {
                    Ok(polygon) => census_polygons.push((polygon, feature.attributes.clone())),
                    Err(e) => {
                        log::warn!("Dropping census polygon {i} of {}: {e}", layer.name);
                        invalid_features += 1;
                    }
                }
            }
        }

        let attributes = inputs
            .census_attributes
            .iter()
            .zip(census_weights)
            .map(|(attribute, &weight)| CompiledAttribute {
                name: attribute.name.clone(),
                weight,
                normalization: attribute.normalization,
            })
            .collect();

        let zones = inputs
            .zones
            .iter()
            .zip(&inputs.zone_modifiers)
            .map(|(layer, &modifier)| {
                let polygons: Vec<_> = layer
                    .features
                    .iter()
                    .enumerate()
                    .filter_map(|(i, feature)| {
                        multipolygon_of(feature.geometry.as_ref())
                            .inspect_err(|e| {
                                log::warn!("Dropping zone polygon {i} of {}: {e}", layer.name);
                                invalid_features += 1;
                            })
                            .ok()
                            .map(|polygon| (polygon, ()))
                    })
                    .collect();

                CompiledZone {
                    name: layer.name.clone(),
                    modifier,
                    polygons: PolygonIndex::build(polygons),
                }
            })
            .collect();

        Self {
            categories,
            census: PolygonIndex::build(census_polygons),
            attributes,
            zones,
            zone_context: inputs.zone_context,
            invalid_features,
        }
    }
}

/// The geometry a candidate is scored with.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteContext {
    /// Candidate location.
    pub point: Point<f64>,
    /// Service-area buffer (static model only).
    pub service_area: Option<MultiPolygon<f64>>,
}

impl SiteContext {
    /// A point-only context (mobile model).
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] if the candidate geometry is unusable.
    pub fn at_point(candidate: &Candidate) -> Result<Self, GeometryError> {
        Ok(Self {
            point: point_of(candidate.geometry.as_ref())?,
            service_area: None,
        })
    }

    /// A point plus a geodesic buffer of `radius_m` (static model).
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] if the candidate geometry is unusable or
    /// the buffer cannot be built.
    pub fn buffered(
        candidate: &Candidate,
        radius_m: f64,
        segments: usize,
    ) -> Result<Self, GeometryError> {
        let point = point_of(candidate.geometry.as_ref())?;
        let buffer = geodesic_buffer(point, radius_m, segments)?;
        Ok(Self {
            point,
            service_area: Some(buffer),
        })
    }
}
