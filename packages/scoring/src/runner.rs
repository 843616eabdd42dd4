//! Run orchestration: validation, coverage exclusion, and batch scoring.

use std::sync::Arc;

use geo::{Geometry, Intersects, MultiPolygon};
use storage_siting_routing::DistanceProvider;
use storage_siting_scoring_models::{
    Candidate, MobileParams, ModelKind, RecordStatus, RunReport, RunSummary, SitingInputs,
    StaticParams,
};
use storage_siting_spatial::{GeometryError, multipolygon_of, point_of};

use crate::composite::CompositeEvaluator;
use crate::context::CompiledLayers;
use crate::economic::EconomicAnalyzer;
use crate::progress::{ProgressCallback, null_progress};
use crate::validation::{
    ensure_unique, validate_mobile, validate_normalization, validate_static, validate_weights,
};
use crate::{ConfigurationError, WeightKind};

/// The siting model a run evaluates candidates under.
#[derive(Debug, Clone, PartialEq)]
pub enum SitingModel {
    /// Fixed installations scored within a buffer around each candidate.
    Static(StaticParams),
    /// Mobile units scored by travel to facilities inside a coverage area.
    Mobile {
        params: MobileParams,
        /// Area the mobile units serve. Required.
        coverage: Option<Geometry<f64>>,
    },
}

impl SitingModel {
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Static(_) => ModelKind::Static,
            Self::Mobile { .. } => ModelKind::Mobile,
        }
    }
}

/// A validated model ready to score candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelPlan {
    Static {
        params: StaticParams,
        economic: Option<EconomicAnalyzer>,
    },
    Mobile {
        params: MobileParams,
        coverage: MultiPolygon<f64>,
    },
}

impl ModelPlan {
    /// The savings estimator, when the static model configures one.
    #[must_use]
    pub const fn economic(&self) -> Option<&EconomicAnalyzer> {
        match self {
            Self::Static { economic, .. } => economic.as_ref(),
            Self::Mobile { .. } => None,
        }
    }
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Inputs are set; nothing has been checked yet.
    Configured,
    /// Weights, parameters, and layers are being checked.
    Validating,
    /// Candidate `index` of `total` is being scored.
    Scoring { index: usize, total: usize },
    /// Every candidate has a record.
    Completed,
    /// Validation failed; no candidate was scored.
    Rejected,
}

/// What validation accepted, with weights rescaled to sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub model: ModelKind,
    pub infrastructure_weights: Vec<(String, f64)>,
    pub census_weights: Vec<(String, f64)>,
    pub zone_modifiers: Vec<(String, f64)>,
    /// Layer features that will be dropped for unusable geometry.
    pub invalid_features: usize,
}

/// Validates a run configuration and scores candidates with it.
pub struct ModelRunner {
    model: SitingModel,
    inputs: SitingInputs,
    distances: DistanceProvider,
    progress: Arc<dyn ProgressCallback>,
    state: RunState,
}

impl ModelRunner {
    #[must_use]
    pub fn new(model: SitingModel, inputs: SitingInputs, distances: DistanceProvider) -> Self {
        Self {
            model,
            inputs,
            distances,
            progress: null_progress(),
            state: RunState::Configured,
        }
    }

    /// Reports scoring progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Checks the configuration without scoring anything.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] describing the first problem found.
    pub fn validate(&self) -> Result<ValidationReport, ConfigurationError> {
        let (_, layers) = self.prepare()?;

        Ok(ValidationReport {
            model: self.model.kind(),
            infrastructure_weights: layers
                .categories
                .iter()
                .map(|c| (c.name.clone(), c.weight))
                .collect(),
            census_weights: layers
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.weight))
                .collect(),
            zone_modifiers: layers
                .zones
                .iter()
                .map(|z| (z.name.clone(), z.modifier))
                .collect(),
            invalid_features: layers.invalid_features,
        })
    }

    fn prepare(&self) -> Result<(ModelPlan, CompiledLayers), ConfigurationError> {
        let inputs = &self.inputs;

        ensure_unique(
            "infrastructure category",
            inputs.infrastructure.iter().map(|l| l.name.as_str()),
        )?;
        ensure_unique(
            "census attribute",
            inputs.census_attributes.iter().map(|a| a.name.as_str()),
        )?;
        ensure_unique("zone layer", inputs.zones.iter().map(|z| z.name.as_str()))?;

        let infrastructure_weights = validate_weights(
            WeightKind::Infrastructure,
            &inputs.infrastructure_weights,
            inputs.infrastructure.len(),
        )?;
        let census_weights = validate_weights(
            WeightKind::Census,
            &inputs.census_weights,
            inputs.census_attributes.len(),
        )?;

        if !inputs.census_attributes.is_empty() && inputs.census_layers.is_empty() {
            return Err(ConfigurationError::MissingLayer {
                layer: "census layer (census attributes are configured)".to_string(),
            });
        }

        if inputs.zone_modifiers.len() != inputs.zones.len() {
            return Err(ConfigurationError::ZoneModifierCount {
                expected: inputs.zones.len(),
                actual: inputs.zone_modifiers.len(),
            });
        }
        if let Some((zone, modifier)) = inputs
            .zones
            .iter()
            .zip(&inputs.zone_modifiers)
            .find(|(_, m)| !m.is_finite())
        {
            return Err(ConfigurationError::parameter(
                format!("zone_modifiers.{}", zone.name),
                format!("must be a finite number, got {modifier}"),
            ));
        }

        for layer in &inputs.infrastructure {
            validate_normalization(&layer.name, layer.normalization)?;
        }
        for attribute in &inputs.census_attributes {
            validate_normalization(&attribute.name, attribute.normalization)?;
        }

        let plan = match &self.model {
            SitingModel::Static(params) => {
                validate_static(params)?;
                ModelPlan::Static {
                    params: params.clone(),
                    economic: params.economic.clone().map(EconomicAnalyzer::new),
                }
            }
            SitingModel::Mobile { params, coverage } => {
                validate_mobile(params)?;
                let coverage = multipolygon_of(coverage.as_ref()).map_err(|e| match e {
                    GeometryError::Missing => ConfigurationError::MissingLayer {
                        layer: "mobile coverage area".to_string(),
                    },
                    source => ConfigurationError::InvalidLayer {
                        layer: "mobile coverage area".to_string(),
                        source,
                    },
                })?;
                ModelPlan::Mobile {
                    params: params.clone(),
                    coverage,
                }
            }
        };

        let layers = CompiledLayers::compile(inputs, &infrastructure_weights, &census_weights);
        if layers.invalid_features > 0 {
            log::warn!(
                "Dropped {} layer features with unusable geometry",
                layers.invalid_features
            );
        }

        Ok((plan, layers))
    }

    /// Validates the configuration, then scores every candidate.
    ///
    /// In the mobile model, candidates located outside the coverage area
    /// are excluded before scoring and reported by id. Candidates whose
    /// geometry cannot be read still get a record, marked
    /// [`RecordStatus::PartialFailure`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if validation fails or two
    /// candidates share an id. No candidate is scored in that case and the runner ends in
    /// [`RunState::Rejected`].
    pub async fn run(&mut self, candidates: &[Candidate]) -> Result<RunReport, ConfigurationError> {
        self.state = RunState::Validating;

        let prepared = self.prepare().and_then(|prepared| {
            ensure_unique("candidate", candidates.iter().map(|c| c.id.as_str()))?;
            Ok(prepared)
        });
        let (plan, layers) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("Run configuration rejected: {e}");
                self.state = RunState::Rejected;
                return Err(e);
            }
        };

        let (to_score, excluded) = partition_by_coverage(&plan, candidates);
        if !excluded.is_empty() {
            log::info!(
                "Excluded {} of {} candidates outside the coverage area",
                excluded.len(),
                candidates.len()
            );
        }

        log::info!(
            "Scoring {} candidates ({} model, {} categories, {} census attributes, {} zone layers)",
            to_score.len(),
            self.model.kind(),
            layers.categories.len(),
            layers.attributes.len(),
            layers.zones.len(),
        );

        if self.distances.has_oracle() {
            log::debug!("Network distances via routing oracle");
        } else {
            log::debug!("Network distances unavailable, using straight-line distances");
        }

        let evaluator = CompositeEvaluator::new(&plan, &layers, &self.distances);
        let total = to_score.len();
        self.progress.set_total(total as u64);

        let mut pending = Vec::with_capacity(total);
        for (index, candidate) in to_score.into_iter().enumerate() {
            self.state = RunState::Scoring { index, total };
            self.progress.set_message(candidate.name.clone());
            pending.push(evaluator.score_raw(candidate).await);
            self.progress.inc(1);
        }

        let records = evaluator.finalize(pending);

        let summary = RunSummary {
            model: self.model.kind(),
            candidates: candidates.len(),
            scored: records.len(),
            excluded: excluded.len(),
            partial_failures: records
                .iter()
                .filter(|r| r.status == RecordStatus::PartialFailure)
                .count(),
            network_queries: records.iter().map(|r| r.network_queries()).sum(),
            fallback_queries: records.iter().map(|r| r.fallback_queries()).sum(),
            invalid_features: layers.invalid_features,
        };

        if summary.fallback_queries > 0 {
            log::warn!(
                "{} distance queries fell back to straight-line distance",
                summary.fallback_queries
            );
        }
        if summary.partial_failures > 0 {
            log::warn!("{} candidates could not be scored", summary.partial_failures);
        }

        self.progress.finish(format!(
            "Scored {} candidates ({} excluded)",
            summary.scored, summary.excluded
        ));
        self.state = RunState::Completed;

        Ok(RunReport {
            records,
            excluded,
            summary,
        })
    }
}

/// Splits candidates into those to score and the ids of those outside the
/// mobile coverage area.
fn partition_by_coverage<'c>(
    plan: &ModelPlan,
    candidates: &'c [Candidate],
) -> (Vec<&'c Candidate>, Vec<String>) {
    let ModelPlan::Mobile { coverage, .. } = plan else {
        return (candidates.iter().collect(), Vec::new());
    };

    let mut to_score = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();

    for candidate in candidates {
        match point_of(candidate.geometry.as_ref()) {
            Ok(point) if !coverage.intersects(&point) => {
                log::debug!("Candidate {} is outside the coverage area", candidate.id);
                excluded.push(candidate.id.clone());
            }
            _ => to_score.push(candidate),
        }
    }

    (to_score, excluded)
}
