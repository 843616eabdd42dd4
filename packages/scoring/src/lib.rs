#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scoring engine for energy-storage candidate sites.
//!
//! A run takes a set of candidate locations and a [`SitingModel`] and
//! produces one [`ScoreRecord`](storage_siting_scoring_models::ScoreRecord)
//! per candidate. Every record combines three independent components:
//!
//! - **Infrastructure** ([`infrastructure`]): distance-decayed proximity to
//!   weighted categories of critical facilities.
//! - **Census** ([`demographic`]): weighted, normalized attributes sampled
//!   from census polygons.
//! - **Zones** ([`zone`]): additive modifiers for critical-zone layers the
//!   candidate falls in.
//!
//! The static model also estimates outage-cost savings ([`economic`]).
//! [`ModelRunner`] validates the configuration, compiles the layers into
//! spatial indexes, and drives the [`CompositeEvaluator`] over the
//! candidates.

pub mod composite;
pub mod context;
pub mod demographic;
pub mod economic;
pub mod error;
pub mod infrastructure;
pub mod normalize;
pub mod progress;
pub mod runner;
pub mod validation;
pub mod zone;

pub use composite::CompositeEvaluator;
pub use context::{CompiledLayers, SiteContext};
pub use error::{ConfigurationError, WeightKind};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use runner::{ModelPlan, ModelRunner, RunState, SitingModel, ValidationReport};
