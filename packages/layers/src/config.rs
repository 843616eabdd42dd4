//! TOML run configuration.
//!
//! ```toml
//! model = "static"
//! candidates = "candidates.geojson"
//! infrastructure_weights = [0.6, 0.4]
//!
//! [[infrastructure]]
//! name = "hospitals"
//! path = "hospitals.geojson"
//! normalization = { type = "reference", value = 2.0 }
//!
//! [[infrastructure]]
//! name = "schools"
//! path = "schools.geojson"
//!
//! [static]
//! buffer_m = 500.0
//! ```
//!
//! Relative paths resolve against the directory holding the configuration
//! file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use storage_siting_routing::RoutingConfig;
use storage_siting_scoring::SitingModel;
use storage_siting_scoring_models::{
    Candidate, CensusAttribute, MobileParams, ModelKind, Normalization, SitingInputs,
    StaticParams, ZoneContext,
};

use crate::LayerError;
use crate::reader::{
    read_candidates, read_census, read_coverage, read_infrastructure, read_zone,
};

/// An infrastructure category file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InfrastructureSource {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub normalization: Normalization,
}

/// A critical-zone layer file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneSource {
    pub name: String,
    pub path: PathBuf,
}

/// The `[mobile]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MobileSection {
    /// Coverage area file.
    #[serde(default)]
    pub coverage: Option<PathBuf>,
    #[serde(flatten)]
    pub params: MobileParams,
}

/// A complete run configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub model: ModelKind,
    /// Candidate sites file.
    pub candidates: PathBuf,
    #[serde(default)]
    pub infrastructure: Vec<InfrastructureSource>,
    #[serde(default)]
    pub infrastructure_weights: Vec<f64>,
    /// Census polygon files, merged for sampling.
    #[serde(default)]
    pub census_layers: Vec<PathBuf>,
    #[serde(default)]
    pub census_attributes: Vec<CensusAttribute>,
    #[serde(default)]
    pub census_weights: Vec<f64>,
    #[serde(default)]
    pub zones: Vec<ZoneSource>,
    #[serde(default)]
    pub zone_modifiers: Vec<f64>,
    #[serde(default)]
    pub zone_context: ZoneContext,
    #[serde(default, rename = "static")]
    pub static_params: Option<StaticParams>,
    #[serde(default)]
    pub mobile: Option<MobileSection>,
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl RunConfig {
    /// Parses a configuration file and resolves its relative paths.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Io`] or [`LayerError::Toml`].
    pub fn load(path: &Path) -> Result<Self, LayerError> {
        let text = std::fs::read_to_string(path).map_err(|source| LayerError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&text).map_err(|source| LayerError::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);

        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.candidates);
        self.infrastructure
            .iter_mut()
            .for_each(|source| resolve(&mut source.path));
        self.census_layers.iter_mut().for_each(resolve);
        self.zones.iter_mut().for_each(|zone| resolve(&mut zone.path));
        if let Some(coverage) = self
            .mobile
            .as_mut()
            .and_then(|mobile| mobile.coverage.as_mut())
        {
            resolve(coverage);
        }
    }

    /// Builds the siting model, loading the coverage area for the mobile
    /// model.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Config`] if the static model has no `[static]`
    /// section, or a read error for the coverage file.
    pub fn siting_model(&self) -> Result<SitingModel, LayerError> {
        match self.model {
            ModelKind::Static => self
                .static_params
                .clone()
                .map(SitingModel::Static)
                .ok_or_else(|| LayerError::Config {
                    message: "model = \"static\" requires a [static] section with buffer_m"
                        .to_string(),
                }),
            ModelKind::Mobile => {
                let (params, coverage_path) = self.mobile.as_ref().map_or_else(
                    || (MobileParams::default(), None),
                    |section| (section.params.clone(), section.coverage.as_deref()),
                );
                let coverage = match coverage_path {
                    Some(path) => read_coverage(path)?,
                    None => None,
                };
                Ok(SitingModel::Mobile { params, coverage })
            }
        }
    }

    /// Loads every layer file into scoring inputs.
    ///
    /// # Errors
    ///
    /// Returns a [`LayerError`] for the first file that cannot be loaded.
    pub fn siting_inputs(&self) -> Result<SitingInputs, LayerError> {
        let infrastructure = self
            .infrastructure
            .iter()
            .map(|source| read_infrastructure(&source.path, &source.name, source.normalization))
            .collect::<Result<Vec<_>, _>>()?;

        let mut required: Vec<&str> = self
            .census_attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        if let Some(economic) = self
            .static_params
            .as_ref()
            .and_then(|params| params.economic.as_ref())
        {
            required.push(&economic.exposure_attribute);
        }

        let census_layers = self
            .census_layers
            .iter()
            .map(|path| read_census(path, &required))
            .collect::<Result<Vec<_>, _>>()?;

        let zones = self
            .zones
            .iter()
            .map(|zone| read_zone(&zone.path, &zone.name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SitingInputs {
            infrastructure,
            infrastructure_weights: self.infrastructure_weights.clone(),
            census_layers,
            census_attributes: self.census_attributes.clone(),
            census_weights: self.census_weights.clone(),
            zones,
            zone_modifiers: self.zone_modifiers.clone(),
            zone_context: self.zone_context,
        })
    }
}

/// A configuration with every file it references loaded.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub config: RunConfig,
    pub model: SitingModel,
    pub inputs: SitingInputs,
    pub candidates: Vec<Candidate>,
}

/// Loads a run configuration and all of its layer files.
///
/// # Errors
///
/// Returns a [`LayerError`] if the configuration or any layer cannot be
/// read.
pub fn load_run(path: &Path) -> Result<LoadedRun, LayerError> {
    let config = RunConfig::load(path)?;
    log::info!("Loaded {} run configuration from {}", config.model, path.display());

    let model = config.siting_model()?;
    let inputs = config.siting_inputs()?;
    let candidates = read_candidates(&config.candidates)?;

    Ok(LoadedRun {
        config,
        model,
        inputs,
        candidates,
    })
}
