//! Configuration errors that reject a run before any candidate is scored.

use storage_siting_spatial::GeometryError;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// The weight vector a [`ConfigurationError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum WeightKind {
    /// One weight per infrastructure category.
    Infrastructure,
    /// One weight per census attribute.
    Census,
}

/// Why a run configuration was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A weight vector does not have one weight per layer or attribute.
    #[error("{kind} weights: expected {expected} weights, got {actual}")]
    WeightCount {
        /// Which vector.
        kind: WeightKind,
        /// Number of layers or attributes.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// A weight is outside `[0, 1]` or not finite.
    #[error("{kind} weights: weight {index} is {value}, must be within [0, 1]")]
    WeightRange {
        /// Which vector.
        kind: WeightKind,
        /// Position of the offending weight.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// A weight vector does not sum to 1.0.
    #[error("{kind} weights sum to {sum}, expected 1.0")]
    WeightSum {
        /// Which vector.
        kind: WeightKind,
        /// Actual sum.
        sum: f64,
    },

    /// The zone modifier list does not match the zone layers.
    #[error("expected {expected} zone modifiers (one per zone layer), got {actual}")]
    ZoneModifierCount {
        /// Number of zone layers.
        expected: usize,
        /// Number of modifiers supplied.
        actual: usize,
    },

    /// A layer the model needs was not provided.
    #[error("missing required layer: {layer}")]
    MissingLayer {
        /// Layer description.
        layer: String,
    },

    /// A layer is present but its geometry cannot be used.
    #[error("layer '{layer}' is unusable: {source}")]
    InvalidLayer {
        /// Layer description.
        layer: String,
        /// Underlying geometry problem.
        source: GeometryError,
    },

    /// Two layers or attributes share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// What kind of entry is duplicated.
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// A model or normalization parameter is out of range.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigurationError {
    pub(crate) fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}
