//! Proximity scoring against weighted infrastructure categories.
//!
//! Both models turn each facility's distance from the candidate into a
//! decay score and aggregate those per category. Only raw scores are
//! produced here; normalization needs the whole batch and happens in
//! [`crate::composite`].

use geo::{MultiPolygon, Point};
use storage_siting_routing::{DistanceOutcome, DistanceProvider, MethodUsed};
use storage_siting_scoring_models::{
    DistanceMode, InfrastructureScore, MobileAggregation, MobileMetric, MobileParams,
    StaticParams,
};

use crate::context::CompiledCategory;

/// Linear decay inside the static buffer: 1 at the candidate, 0 at the
/// buffer edge and beyond.
#[must_use]
pub fn linear_decay(meters: f64, buffer_m: f64) -> f64 {
    (1.0 - meters / buffer_m).max(0.0)
}

/// Hyperbolic decay used by the mobile model: `scale / (scale + value)`,
/// so a facility exactly `scale` away scores 0.5.
#[must_use]
pub fn hyperbolic_decay(value: f64, scale: f64) -> f64 {
    scale / (scale + value.max(0.0))
}

/// A facility with its measured distance.
struct Measured {
    meters: f64,
    seconds: Option<f64>,
    outage_cost: f64,
}

/// Counts one distance query against `score`, returning the measured
/// meters and seconds when the query produced a distance.
fn record_outcome(
    score: &mut InfrastructureScore,
    outcome: &DistanceOutcome,
    facility: Option<&str>,
) -> Option<(f64, Option<f64>)> {
    let Some(distance) = outcome.distance() else {
        if let DistanceOutcome::Error(e) = outcome {
            log::debug!(
                "Skipping {} facility {}: {e}",
                score.category,
                facility.unwrap_or("?")
            );
        }
        score.invalid_features += 1;
        return None;
    };

    match distance.method_used {
        MethodUsed::RoadNetwork => score.network_queries += 1,
        MethodUsed::Fallback => score.fallback_queries += 1,
        MethodUsed::StraightLine => {}
    }
    score.count += 1;

    if score
        .nearest_meters
        .is_none_or(|nearest| distance.meters < nearest)
    {
        score.nearest_meters = Some(distance.meters);
        score.nearest_seconds = distance.seconds;
    }

    Some((distance.meters, distance.seconds))
}

/// Scores candidates against infrastructure categories.
pub struct InfrastructureScorer<'a> {
    distances: &'a DistanceProvider,
}

impl<'a> InfrastructureScorer<'a> {
    #[must_use]
    pub const fn new(distances: &'a DistanceProvider) -> Self {
        Self { distances }
    }

    async fn measure(
        &self,
        score: &mut InfrastructureScore,
        origin: Point<f64>,
        category: &CompiledCategory,
        area: &MultiPolygon<f64>,
        mode: DistanceMode,
    ) -> Vec<Measured> {
        let hits = category.facilities.within(area);
        let mut measured = Vec::with_capacity(hits.len());

        for hit in hits {
            let outcome = self.distances.distance(origin, hit.point, mode).await;
            if let Some((meters, seconds)) =
                record_outcome(score, &outcome, hit.payload.id.as_deref())
            {
                measured.push(Measured {
                    meters,
                    seconds,
                    outage_cost: hit.payload.outage_cost,
                });
            }
        }

        measured
    }

    /// Static model: every facility inside `buffer` contributes
    /// [`linear_decay`] of its distance from `origin`.
    ///
    /// Outage costs are summed over facilities with a positive decay.
    pub async fn score_static(
        &self,
        origin: Point<f64>,
        buffer: &MultiPolygon<f64>,
        params: &StaticParams,
        categories: &[CompiledCategory],
    ) -> Vec<InfrastructureScore> {
        let mut scores = Vec::with_capacity(categories.len());

        for category in categories {
            let mut score = InfrastructureScore::empty(&category.name, category.weight);
            let measured = self
                .measure(&mut score, origin, category, buffer, params.distance_mode)
                .await;

            for m in &measured {
                let decay = linear_decay(m.meters, params.buffer_m);
                score.raw += decay;
                if decay > 0.0 {
                    score.outage_cost += m.outage_cost;
                }
            }

            scores.push(score);
        }

        scores
    }

    /// Mobile model: every facility inside `coverage` contributes
    /// [`hyperbolic_decay`] of its travel distance or time from `origin`.
    ///
    /// Travel time missing from a query (straight-line or fallback) is
    /// estimated from the configured fallback speed.
    pub async fn score_mobile(
        &self,
        origin: Point<f64>,
        coverage: &MultiPolygon<f64>,
        params: &MobileParams,
        categories: &[CompiledCategory],
    ) -> Vec<InfrastructureScore> {
        let mut scores = Vec::with_capacity(categories.len());

        for category in categories {
            let mut score = InfrastructureScore::empty(&category.name, category.weight);
            let measured = self
                .measure(&mut score, origin, category, coverage, params.distance_mode)
                .await;

            let decays = measured.iter().map(|m| {
                let value = match params.metric {
                    MobileMetric::Distance => m.meters,
                    MobileMetric::Duration => m
                        .seconds
                        .unwrap_or(m.meters / params.fallback_speed_mps),
                };
                (hyperbolic_decay(value, params.decay_scale), m.outage_cost)
            });

            match params.aggregation {
                MobileAggregation::Nearest => {
                    if let Some((decay, cost)) = decays.max_by(|a, b| a.0.total_cmp(&b.0)) {
                        score.raw = decay;
                        score.outage_cost = cost;
                    }
                }
                MobileAggregation::Sum => {
                    for (decay, cost) in decays {
                        score.raw += decay;
                        score.outage_cost += cost;
                    }
                }
            }

            scores.push(score);
        }

        scores
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use storage_siting_routing::{Route, RoutingError, RoutingOracle};
    use storage_siting_scoring_models::Normalization;
    use storage_siting_spatial::{PointIndex, destination, geodesic_buffer, haversine_m};

    use super::*;
    use crate::context::Facility;

    /// Answers every route with 1.5x the straight-line distance at 10 m/s.
    struct DetourOracle {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RoutingOracle for DetourOracle {
        async fn route(&self, from: Point<f64>, to: Point<f64>) -> Result<Route, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let meters = haversine_m(from, to) * 1.5;
            Ok(Route {
                meters,
                seconds: meters / 10.0,
            })
        }
    }

    fn origin() -> Point<f64> {
        Point::new(-66.1057, 18.4655)
    }

    fn category(name: &str, facilities: Vec<(Point<f64>, f64)>) -> CompiledCategory {
        CompiledCategory {
            name: name.to_string(),
            weight: 1.0,
            normalization: Normalization::default(),
            facilities: PointIndex::build(facilities.into_iter().enumerate().map(
                |(i, (point, outage_cost))| {
                    (
                        point,
                        Facility {
                            id: Some(format!("{name}-{i}")),
                            outage_cost,
                        },
                    )
                },
            )),
        }
    }

    fn static_params(buffer_m: f64, distance_mode: DistanceMode) -> StaticParams {
        StaticParams {
            buffer_m,
            distance_mode,
            buffer_segments: 36,
            economic: None,
        }
    }

    fn buffer(radius_m: f64) -> MultiPolygon<f64> {
        geodesic_buffer(origin(), radius_m, 36).unwrap()
    }

    #[test]
    fn decay_functions_hit_their_anchor_points() {
        assert!((linear_decay(200.0, 500.0) - 0.6).abs() < 1e-12);
        assert!(linear_decay(700.0, 500.0).abs() < f64::EPSILON);
        assert!((hyperbolic_decay(1_000.0, 1_000.0) - 0.5).abs() < f64::EPSILON);
        assert!((hyperbolic_decay(0.0, 1_000.0) - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn static_facility_inside_buffer_decays_linearly() {
        let provider = DistanceProvider::straight_line_only();
        let hospitals = category(
            "hospitals",
            vec![
                (destination(origin(), 45.0, 200.0), 900.0),
                (destination(origin(), 90.0, 2_000.0), 5_000.0),
            ],
        );

        let scores = InfrastructureScorer::new(&provider)
            .score_static(
                origin(),
                &buffer(500.0),
                &static_params(500.0, DistanceMode::StraightLine),
                &[hospitals],
            )
            .await;

        let score = &scores[0];
        assert_eq!(score.count, 1);
        assert!((score.raw - 0.6).abs() < 1e-6, "raw {}", score.raw);
        assert!((score.outage_cost - 900.0).abs() < f64::EPSILON);
        assert!((score.nearest_meters.unwrap() - 200.0).abs() < 1e-6);
        assert_eq!(score.network_queries, 0);
    }

    #[tokio::test]
    async fn empty_buffer_scores_exactly_zero() {
        let provider = DistanceProvider::straight_line_only();
        let far = category("schools", vec![(destination(origin(), 0.0, 5_000.0), 0.0)]);
        let none = category("fire_stations", vec![]);

        let scores = InfrastructureScorer::new(&provider)
            .score_static(
                origin(),
                &buffer(500.0),
                &static_params(500.0, DistanceMode::StraightLine),
                &[far, none],
            )
            .await;

        for score in &scores {
            assert_eq!(score.count, 0);
            assert!(score.raw.abs() < f64::EPSILON);
            assert!(score.nearest_meters.is_none());
        }
    }

    #[tokio::test]
    async fn static_road_network_counts_routed_queries() {
        let oracle = Arc::new(DetourOracle {
            calls: AtomicUsize::new(0),
        });
        let provider = DistanceProvider::with_oracle(oracle.clone());
        let hospitals = category(
            "hospitals",
            vec![
                (destination(origin(), 10.0, 100.0), 100.0),
                (destination(origin(), 200.0, 400.0), 300.0),
            ],
        );

        let scores = InfrastructureScorer::new(&provider)
            .score_static(
                origin(),
                &buffer(500.0),
                &static_params(500.0, DistanceMode::RoadNetwork),
                &[hospitals],
            )
            .await;

        let score = &scores[0];
        assert_eq!(score.count, 2);
        assert_eq!(score.network_queries, 2);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
        // 150 m routed → 0.7; 600 m routed → beyond the buffer, no cost.
        assert!((score.raw - 0.7).abs() < 1e-6, "raw {}", score.raw);
        assert!((score.outage_cost - 100.0).abs() < f64::EPSILON);
        assert!((score.nearest_seconds.unwrap() - 15.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn static_road_network_without_oracle_falls_back() {
        let provider = DistanceProvider::straight_line_only();
        let hospitals = category("hospitals", vec![(destination(origin(), 10.0, 250.0), 0.0)]);

        let scores = InfrastructureScorer::new(&provider)
            .score_static(
                origin(),
                &buffer(500.0),
                &static_params(500.0, DistanceMode::RoadNetwork),
                &[hospitals],
            )
            .await;

        assert_eq!(scores[0].fallback_queries, 1);
        assert_eq!(scores[0].network_queries, 0);
        assert!((scores[0].raw - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn mobile_nearest_takes_the_closest_facility() {
        let provider = DistanceProvider::straight_line_only();
        let shelters = category(
            "shelters",
            vec![
                (destination(origin(), 0.0, 3_000.0), 10.0),
                (destination(origin(), 90.0, 1_000.0), 20.0),
            ],
        );
        let params = MobileParams {
            distance_mode: DistanceMode::StraightLine,
            metric: MobileMetric::Distance,
            decay_scale: 1_000.0,
            ..MobileParams::default()
        };

        let scores = InfrastructureScorer::new(&provider)
            .score_mobile(origin(), &buffer(10_000.0), &params, &[shelters])
            .await;

        let score = &scores[0];
        assert_eq!(score.count, 2);
        assert!((score.raw - 0.5).abs() < 1e-6, "raw {}", score.raw);
        assert!((score.outage_cost - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn mobile_sum_adds_every_facility() {
        let provider = DistanceProvider::straight_line_only();
        let shelters = category(
            "shelters",
            vec![
                (destination(origin(), 0.0, 3_000.0), 0.0),
                (destination(origin(), 90.0, 1_000.0), 0.0),
                (destination(origin(), 90.0, 50_000.0), 0.0),
            ],
        );
        let params = MobileParams {
            distance_mode: DistanceMode::StraightLine,
            metric: MobileMetric::Distance,
            aggregation: MobileAggregation::Sum,
            decay_scale: 1_000.0,
            ..MobileParams::default()
        };

        let scores = InfrastructureScorer::new(&provider)
            .score_mobile(origin(), &buffer(10_000.0), &params, &[shelters])
            .await;

        // The 50 km facility lies outside coverage.
        assert_eq!(scores[0].count, 2);
        assert!((scores[0].raw - 0.75).abs() < 1e-6, "raw {}", scores[0].raw);
    }

    #[tokio::test]
    async fn mobile_duration_estimates_missing_travel_time() {
        let provider = DistanceProvider::straight_line_only();
        let shelters = category("shelters", vec![(destination(origin(), 0.0, 1_000.0), 0.0)]);
        let params = MobileParams {
            distance_mode: DistanceMode::StraightLine,
            metric: MobileMetric::Duration,
            decay_scale: 100.0,
            fallback_speed_mps: 10.0,
            ..MobileParams::default()
        };

        let scores = InfrastructureScorer::new(&provider)
            .score_mobile(origin(), &buffer(10_000.0), &params, &[shelters])
            .await;

        // 1000 m at 10 m/s → 100 s → 100 / (100 + 100).
        assert!((scores[0].raw - 0.5).abs() < 1e-6, "raw {}", scores[0].raw);
    }

    #[tokio::test]
    async fn mobile_duration_prefers_routed_time() {
        let oracle = Arc::new(DetourOracle {
            calls: AtomicUsize::new(0),
        });
        let provider = DistanceProvider::with_oracle(oracle);
        let shelters = category("shelters", vec![(destination(origin(), 0.0, 2_000.0), 0.0)]);
        let params = MobileParams {
            metric: MobileMetric::Duration,
            decay_scale: 300.0,
            ..MobileParams::default()
        };

        let scores = InfrastructureScorer::new(&provider)
            .score_mobile(origin(), &buffer(10_000.0), &params, &[shelters])
            .await;

        // 3000 m routed at 10 m/s → 300 s.
        assert!((scores[0].raw - 0.5).abs() < 1e-6, "raw {}", scores[0].raw);
        assert_eq!(scores[0].network_queries, 1);
    }
}
