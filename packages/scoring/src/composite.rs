//! Combines the component scores into one record per candidate.
//!
//! Scoring is split in two phases. [`CompositeEvaluator::score_raw`]
//! measures one candidate in isolation; [`CompositeEvaluator::finalize`]
//! then normalizes every component across the batch (min-max needs the
//! whole column), applies weights, totals, estimates savings, and ranks.

use geo::MultiPolygon;
use storage_siting_routing::DistanceProvider;
use storage_siting_scoring_models::{
    Candidate, CensusScore, InfrastructureScore, RecordStatus, ScoreRecord, ZoneScore,
};
use storage_siting_spatial::GeometryError;

use crate::context::{CompiledLayers, SiteContext};
use crate::demographic::DemographicScorer;
use crate::infrastructure::InfrastructureScorer;
use crate::normalize::normalize_column;
use crate::runner::ModelPlan;
use crate::zone::{score_zones, zone_total};

/// A record whose components are measured but not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    record: ScoreRecord,
    exposure: f64,
}

impl PendingRecord {
    /// Status the record will be emitted with.
    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        self.record.status
    }
}

/// Scores candidates against compiled layers under one model.
pub struct CompositeEvaluator<'a> {
    plan: &'a ModelPlan,
    layers: &'a CompiledLayers,
    distances: &'a DistanceProvider,
}

impl<'a> CompositeEvaluator<'a> {
    #[must_use]
    pub const fn new(
        plan: &'a ModelPlan,
        layers: &'a CompiledLayers,
        distances: &'a DistanceProvider,
    ) -> Self {
        Self {
            plan,
            layers,
            distances,
        }
    }

    /// Scores a single candidate on its own.
    ///
    /// Min-max normalization then sees a one-record batch, so every
    /// positive raw value normalizes to 1.0.
    pub async fn evaluate(&self, candidate: &Candidate) -> ScoreRecord {
        let pending = self.score_raw(candidate).await;
        self.finalize(vec![pending])
            .pop()
            .unwrap_or_else(|| self.failed(candidate, "candidate produced no record"))
    }

    /// Measures raw infrastructure, census, and zone components.
    ///
    /// A candidate whose geometry is unusable becomes a
    /// [`RecordStatus::PartialFailure`] record instead of an error.
    pub async fn score_raw(&self, candidate: &Candidate) -> PendingRecord {
        match self.measure(candidate).await {
            Ok(pending) => pending,
            Err(e) => {
                log::warn!("Candidate {} could not be scored: {e}", candidate.id);
                PendingRecord {
                    record: self.failed(candidate, &e.to_string()),
                    exposure: 0.0,
                }
            }
        }
    }

    async fn measure(&self, candidate: &Candidate) -> Result<PendingRecord, GeometryError> {
        let infrastructure = InfrastructureScorer::new(self.distances);
        let demographic = DemographicScorer::new(&self.layers.census);

        let mut attributes: Vec<&str> = self
            .layers
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        if let Some(analyzer) = self.plan.economic() {
            attributes.push(analyzer.exposure_attribute());
        }

        let (site, infra, sample) = match self.plan {
            ModelPlan::Static { params, .. } => {
                let site =
                    SiteContext::buffered(candidate, params.buffer_m, params.buffer_segments)?;
                let empty = MultiPolygon(Vec::new());
                let buffer = site.service_area.as_ref().unwrap_or(&empty);

                let infra = infrastructure
                    .score_static(site.point, buffer, params, &self.layers.categories)
                    .await;
                let sample = demographic.sample_area(site.point, buffer, attributes);
                (site, infra, sample)
            }
            ModelPlan::Mobile { params, coverage } => {
                let site = SiteContext::at_point(candidate)?;

                let infra = infrastructure
                    .score_mobile(site.point, coverage, params, &self.layers.categories)
                    .await;
                let sample = demographic.sample_point(site.point, attributes);
                (site, infra, sample)
            }
        };

        let zones = score_zones(&site, &self.layers.zones, self.layers.zone_context);
        let census = self
            .layers
            .attributes
            .iter()
            .map(|a| CensusScore {
                value: sample.value(&a.name),
                ..CensusScore::empty(&a.name, a.weight)
            })
            .collect();
        let exposure = self
            .plan
            .economic()
            .map_or(0.0, |analyzer| sample.value(analyzer.exposure_attribute()));

        log::debug!(
            "Candidate {}: {} facilities in range, census {}",
            candidate.id,
            infra.iter().map(|s| s.count).sum::<u32>(),
            if sample.available { "available" } else { "missing" },
        );

        Ok(PendingRecord {
            record: ScoreRecord {
                candidate_id: candidate.id.clone(),
                name: candidate.name.clone(),
                status: RecordStatus::Ok,
                failure: None,
                infrastructure: infra,
                census,
                census_available: sample.available,
                zones,
                infrastructure_total: 0.0,
                census_total: 0.0,
                zone_total: 0.0,
                final_score: 0.0,
                rank: None,
                outage_savings: None,
            },
            exposure,
        })
    }

    fn failed(&self, candidate: &Candidate, message: &str) -> ScoreRecord {
        ScoreRecord {
            candidate_id: candidate.id.clone(),
            name: candidate.name.clone(),
            status: RecordStatus::PartialFailure,
            failure: Some(message.to_string()),
            infrastructure: self
                .layers
                .categories
                .iter()
                .map(|c| InfrastructureScore::empty(&c.name, c.weight))
                .collect(),
            census: self
                .layers
                .attributes
                .iter()
                .map(|a| CensusScore::empty(&a.name, a.weight))
                .collect(),
            census_available: false,
            zones: self
                .layers
                .zones
                .iter()
                .map(|z| ZoneScore {
                    zone: z.name.clone(),
                    inside: false,
                    applied: 0.0,
                })
                .collect(),
            infrastructure_total: 0.0,
            census_total: 0.0,
            zone_total: 0.0,
            final_score: 0.0,
            rank: None,
            outage_savings: None,
        }
    }

    /// Normalizes, weights, totals, and ranks a batch of raw records.
    ///
    /// Only [`RecordStatus::Ok`] records take part in normalization and
    /// ranking; failed records keep their zeroed scores. Output order
    /// matches input order.
    #[must_use]
    pub fn finalize(&self, pending: Vec<PendingRecord>) -> Vec<ScoreRecord> {
        let (mut records, exposures): (Vec<_>, Vec<_>) =
            pending.into_iter().map(|p| (p.record, p.exposure)).unzip();

        let ok: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status == RecordStatus::Ok)
            .map(|(i, _)| i)
            .collect();

        for (c, category) in self.layers.categories.iter().enumerate() {
            let raws: Vec<f64> = ok.iter().map(|&i| records[i].infrastructure[c].raw).collect();
            let normalized = normalize_column(&raws, category.normalization);
            for (&i, n) in ok.iter().zip(normalized) {
                let score = &mut records[i].infrastructure[c];
                score.normalized = n;
                score.weighted = n * score.weight;
            }
        }

        // Records without census data stay at zero and do not stretch the
        // min-max range.
        let with_census: Vec<usize> = ok
            .iter()
            .copied()
            .filter(|&i| records[i].census_available)
            .collect();
        for (a, attribute) in self.layers.attributes.iter().enumerate() {
            let values: Vec<f64> = with_census
                .iter()
                .map(|&i| records[i].census[a].value)
                .collect();
            let normalized = normalize_column(&values, attribute.normalization);
            for (&i, n) in with_census.iter().zip(normalized) {
                let score = &mut records[i].census[a];
                score.normalized = n;
                score.weighted = n * score.weight;
            }
        }

        for &i in &ok {
            let record = &mut records[i];
            record.infrastructure_total = record.infrastructure.iter().map(|s| s.weighted).sum();
            record.census_total = record.census.iter().map(|s| s.weighted).sum();
            record.zone_total = zone_total(&record.zones);
            record.final_score =
                record.infrastructure_total + record.census_total + record.zone_total;

            if let Some(analyzer) = self.plan.economic() {
                record.outage_savings =
                    Some(analyzer.savings(exposures[i], &record.infrastructure));
            }
        }

        let mut ranked = ok;
        ranked.sort_by(|&a, &b| {
            records[b]
                .final_score
                .total_cmp(&records[a].final_score)
                .then(a.cmp(&b))
        });
        for (position, &i) in ranked.iter().enumerate() {
            records[i].rank = u32::try_from(position + 1).ok();
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geo::{Geometry, Point, polygon};
    use storage_siting_scoring_models::{
        CensusAttribute, CensusLayer, CensusPolygon, DistanceMode, InfrastructureFeature,
        InfrastructureLayer, Normalization, SitingInputs, StaticParams,
    };
    use storage_siting_spatial::destination;

    use super::*;

    fn origin() -> Point<f64> {
        Point::new(-66.1057, 18.4655)
    }

    fn candidate(id: &str, point: Point<f64>) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: format!("Candidate {id}"),
            geometry: Some(Geometry::Point(point)),
        }
    }

    fn plan() -> ModelPlan {
        ModelPlan::Static {
            params: StaticParams {
                buffer_m: 500.0,
                distance_mode: DistanceMode::StraightLine,
                buffer_segments: 36,
                economic: None,
            },
            economic: None,
        }
    }

    fn inputs(normalization: Normalization) -> SitingInputs {
        let tract = polygon![
            (x: -67.0, y: 18.0),
            (x: -65.0, y: 18.0),
            (x: -65.0, y: 19.0),
            (x: -67.0, y: 19.0),
            (x: -67.0, y: 18.0),
        ];

        SitingInputs {
            infrastructure: vec![InfrastructureLayer {
                name: "hospitals".to_string(),
                features: vec![InfrastructureFeature {
                    id: Some("h1".to_string()),
                    geometry: Some(Geometry::Point(destination(origin(), 30.0, 200.0))),
                    outage_cost: None,
                }],
                normalization,
            }],
            infrastructure_weights: vec![1.0],
            census_layers: vec![CensusLayer {
                name: "tracts".to_string(),
                features: vec![CensusPolygon {
                    geometry: Some(Geometry::Polygon(tract)),
                    attributes: BTreeMap::from([("population".to_string(), 5_000.0)]),
                }],
            }],
            census_attributes: vec![CensusAttribute {
                name: "population".to_string(),
                normalization: Normalization::Reference { value: 10_000.0 },
            }],
            census_weights: vec![1.0],
            ..SitingInputs::default()
        }
    }

    #[tokio::test]
    async fn evaluate_combines_components() {
        let inputs = inputs(Normalization::default());
        let layers = CompiledLayers::compile(&inputs, &[1.0], &[1.0]);
        let plan = plan();
        let provider = DistanceProvider::straight_line_only();
        let evaluator = CompositeEvaluator::new(&plan, &layers, &provider);

        let record = evaluator.evaluate(&candidate("1", origin())).await;

        assert_eq!(record.status, RecordStatus::Ok);
        assert!((record.infrastructure_total - 0.6).abs() < 1e-6);
        assert!((record.census_total - 0.5).abs() < 1e-6);
        assert!(record.zone_total.abs() < f64::EPSILON);
        assert!((record.final_score - 1.1).abs() < 1e-6);
        assert_eq!(record.rank, Some(1));
        assert!(record.outage_savings.is_none());
    }

    #[tokio::test]
    async fn unusable_geometry_yields_partial_failure() {
        let inputs = inputs(Normalization::default());
        let layers = CompiledLayers::compile(&inputs, &[1.0], &[1.0]);
        let plan = plan();
        let provider = DistanceProvider::straight_line_only();
        let evaluator = CompositeEvaluator::new(&plan, &layers, &provider);

        let broken = Candidate {
            geometry: None,
            ..candidate("2", origin())
        };
        let record = evaluator.evaluate(&broken).await;

        assert_eq!(record.status, RecordStatus::PartialFailure);
        assert_eq!(record.failure.as_deref(), Some("geometry is missing"));
        assert!(record.final_score.abs() < f64::EPSILON);
        assert_eq!(record.rank, None);
        assert_eq!(record.infrastructure.len(), 1);
        assert_eq!(record.census.len(), 1);
    }

    #[tokio::test]
    async fn finalize_applies_min_max_and_ranks_with_ties() {
        let inputs = inputs(Normalization::MinMax);
        let layers = CompiledLayers::compile(&inputs, &[1.0], &[1.0]);
        let plan = plan();
        let provider = DistanceProvider::straight_line_only();
        let evaluator = CompositeEvaluator::new(&plan, &layers, &provider);

        let far = destination(origin(), 210.0, 5_000.0);
        let candidates = [
            candidate("far-a", far),
            candidate("near", origin()),
            Candidate {
                geometry: None,
                ..candidate("broken", origin())
            },
            candidate("far-b", far),
        ];

        let mut pending = Vec::new();
        for c in &candidates {
            pending.push(evaluator.score_raw(c).await);
        }
        assert_eq!(pending[2].status(), RecordStatus::PartialFailure);

        let records = evaluator.finalize(pending);
        let ids: Vec<_> = records.iter().map(|r| r.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["far-a", "near", "broken", "far-b"]);

        assert!((records[1].infrastructure[0].normalized - 1.0).abs() < f64::EPSILON);
        assert!(records[0].infrastructure[0].normalized.abs() < f64::EPSILON);
        assert_eq!(records[1].rank, Some(1));
        assert_eq!(records[0].rank, Some(2));
        assert_eq!(records[3].rank, Some(3));
        assert_eq!(records[2].rank, None);
    }
}
