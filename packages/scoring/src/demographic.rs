//! Census attribute sampling.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, MultiPolygon, Point};
use storage_siting_spatial::{PolygonHit, PolygonIndex};

/// Census attribute values sampled for one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusSample {
    /// Whether any census polygon matched the candidate.
    pub available: bool,
    /// Attribute name → sampled value (0 when no matched polygon has it).
    pub values: BTreeMap<String, f64>,
}

impl CensusSample {
    /// Sampled value of `attribute`, 0 if it was not requested.
    #[must_use]
    pub fn value(&self, attribute: &str) -> f64 {
        self.values.get(attribute).copied().unwrap_or(0.0)
    }
}

/// Samples attributes from indexed census polygons.
pub struct DemographicScorer<'a> {
    census: &'a PolygonIndex<BTreeMap<String, f64>>,
}

impl<'a> DemographicScorer<'a> {
    #[must_use]
    pub const fn new(census: &'a PolygonIndex<BTreeMap<String, f64>>) -> Self {
        Self { census }
    }

    /// Area-weighted average of each attribute over the polygons that
    /// overlap `area`.
    ///
    /// Each polygon weighs by the area of its intersection with `area`.
    /// When every overlap has zero area (the buffer only touches polygon
    /// edges) the polygons containing `point` are averaged instead.
    #[must_use]
    pub fn sample_area<'n>(
        &self,
        point: Point<f64>,
        area: &MultiPolygon<f64>,
        attributes: impl IntoIterator<Item = &'n str>,
    ) -> CensusSample {
        let hits = self.census.intersecting(area);
        let weighted: Vec<_> = hits
            .into_iter()
            .map(|hit| {
                let overlap = hit.polygon.intersection(area).unsigned_area();
                (hit, overlap)
            })
            .filter(|(_, overlap)| overlap.is_finite() && *overlap > 0.0)
            .collect();

        if weighted.is_empty() {
            return self.sample_point(point, attributes);
        }

        average(&weighted, attributes)
    }

    /// Equal-weight average of each attribute over the polygons containing
    /// `point` (boundary included).
    #[must_use]
    pub fn sample_point<'n>(
        &self,
        point: Point<f64>,
        attributes: impl IntoIterator<Item = &'n str>,
    ) -> CensusSample {
        let weighted: Vec<_> = self
            .census
            .touching(point)
            .into_iter()
            .map(|hit| (hit, 1.0))
            .collect();

        average(&weighted, attributes)
    }
}

fn average<'n>(
    weighted: &[(PolygonHit<'_, BTreeMap<String, f64>>, f64)],
    attributes: impl IntoIterator<Item = &'n str>,
) -> CensusSample {
    let values = attributes
        .into_iter()
        .map(|attribute| {
            let (sum, total) = weighted
                .iter()
                .filter_map(|(hit, weight)| {
                    hit.payload
                        .get(attribute)
                        .filter(|v| v.is_finite())
                        .map(|v| (v * weight, *weight))
                })
                .fold((0.0, 0.0), |(sum, total), (v, w)| (sum + v, total + w));

            let value = if total > 0.0 { sum / total } else { 0.0 };
            (attribute.to_string(), value)
        })
        .collect();

    CensusSample {
        available: !weighted.is_empty(),
        values,
    }
}
