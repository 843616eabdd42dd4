#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File-facing side of a siting run.
//!
//! Reads the TOML run configuration ([`config`]), loads candidate and layer
//! `GeoJSON` files into the scoring input types ([`reader`]), and writes
//! scored records back out as a `GeoJSON` `FeatureCollection` plus an
//! optional JSON run summary ([`writer`]).

pub mod config;
pub mod reader;
pub mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use config::{LoadedRun, RunConfig, load_run};
pub use writer::{OutputGeometry, OutputOptions};

/// Errors reading or writing run files.
#[derive(Debug, Error)]
pub enum LayerError {
    /// A file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A layer file is not valid `GeoJSON`.
    #[error("Invalid GeoJSON in {path}: {source}")]
    GeoJson {
        /// Layer file.
        path: PathBuf,
        /// Parser error.
        source: Box<geojson::Error>,
    },

    /// The run configuration is not valid TOML for a run.
    #[error("Invalid run configuration {path}: {source}")]
    Toml {
        /// Configuration file.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A feature property that must be numeric is not.
    #[error("{path}: feature {feature} has non-numeric '{property}': {value}")]
    Property {
        /// Layer file.
        path: PathBuf,
        /// 0-based feature position.
        feature: usize,
        /// Property name.
        property: String,
        /// Offending value as JSON.
        value: String,
    },

    /// The configuration is well-formed TOML but incomplete.
    #[error("Run configuration error: {message}")]
    Config {
        /// Description of what is missing.
        message: String,
    },
}
