#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Distance measurement between candidate sites and infrastructure.
//!
//! [`DistanceProvider`] answers point-to-point queries either with the
//! Haversine great-circle distance or by asking a road-network routing
//! oracle (an OSRM-compatible HTTP service, see [`osrm`]). Oracle failures
//! never surface as errors: the query degrades to straight-line distance
//! and the returned [`DistanceOutcome::Fallback`] records why, so callers
//! can tell routed answers from fallback answers.
//!
//! Each query makes exactly one oracle attempt, bounded by the configured
//! request timeout.

pub mod osrm;

use std::sync::Arc;

use geo::Point;
use serde::{Deserialize, Serialize};
use storage_siting_scoring_models::DistanceMode;
use storage_siting_spatial::{GeometryError, haversine_m, validate_point};
use thiserror::Error;

pub use osrm::OsrmClient;

/// Errors talking to the routing oracle.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The oracle did not answer within the request timeout.
    #[error("Routing oracle timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The oracle answered with a non-success HTTP status.
    #[error("Routing oracle returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be interpreted.
    #[error("Malformed routing response: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },

    /// The oracle reported that no route exists.
    #[error("No route between points ({code})")]
    NoRoute {
        /// Oracle status code (e.g. `"NoRoute"`).
        code: String,
    },

    /// Road-network distance was requested but no oracle is configured.
    #[error("No routing oracle configured")]
    Unavailable,
}

/// Connection settings for the routing oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Base URL of the OSRM-compatible service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Routing profile segment of the request path.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            profile: default_profile(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_profile() -> String {
    "driving".to_string()
}

const fn default_timeout_ms() -> u64 {
    5_000
}

/// A route returned by the oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    /// Network distance in meters.
    pub meters: f64,
    /// Travel time in seconds.
    pub seconds: f64,
}

/// Point-to-point road-network query interface.
#[async_trait::async_trait]
pub trait RoutingOracle: Send + Sync {
    /// Routes from `from` to `to` (lon/lat).
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the oracle is unreachable, times out,
    /// or cannot produce a route.
    async fn route(&self, from: Point<f64>, to: Point<f64>) -> Result<Route, RoutingError>;
}

/// Which path produced a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodUsed {
    /// Haversine distance was requested.
    StraightLine,
    /// The routing oracle answered.
    RoadNetwork,
    /// Road-network distance was requested but the oracle failed.
    Fallback,
}

/// A measured distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    /// Distance in meters.
    pub meters: f64,
    /// Travel time in seconds, when the oracle provided one.
    pub seconds: Option<f64>,
    /// How the distance was obtained.
    pub method_used: MethodUsed,
}

/// Result of a distance query.
#[derive(Debug)]
pub enum DistanceOutcome {
    /// The requested method succeeded.
    Ok(Distance),
    /// The oracle failed; `distance` is the straight-line fallback.
    Fallback {
        /// Straight-line distance with `method_used = Fallback`.
        distance: Distance,
        /// Why the oracle query failed.
        cause: RoutingError,
    },
    /// One of the points is unusable; no distance exists.
    Error(GeometryError),
}

impl DistanceOutcome {
    /// The measured distance, if any.
    #[must_use]
    pub const fn distance(&self) -> Option<&Distance> {
        match self {
            Self::Ok(distance) | Self::Fallback { distance, .. } => Some(distance),
            Self::Error(_) => None,
        }
    }

    /// Whether the result came from the straight-line fallback.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Measures distances, routing through the oracle when asked to.
#[derive(Clone)]
pub struct DistanceProvider {
    oracle: Option<Arc<dyn RoutingOracle>>,
}

impl DistanceProvider {
    /// A provider without an oracle. Road-network queries always fall
    /// back.
    #[must_use]
    pub fn straight_line_only() -> Self {
        Self { oracle: None }
    }

    /// A provider using the given oracle for road-network queries.
    #[must_use]
    pub fn with_oracle(oracle: Arc<dyn RoutingOracle>) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    /// A provider backed by an [`OsrmClient`] built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let client = OsrmClient::new(config)?;
        Ok(Self::with_oracle(Arc::new(client)))
    }

    /// Whether an oracle is attached.
    #[must_use]
    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Measures the distance from `origin` to `destination`.
    ///
    /// Never fails because of the oracle; see [`DistanceOutcome`].
    pub async fn distance(
        &self,
        origin: Point<f64>,
        destination: Point<f64>,
        mode: DistanceMode,
    ) -> DistanceOutcome {
        if let Err(e) = validate_point(origin).and_then(|()| validate_point(destination)) {
            return DistanceOutcome::Error(e);
        }

        match mode {
            DistanceMode::StraightLine => DistanceOutcome::Ok(straight_line(
                origin,
                destination,
                MethodUsed::StraightLine,
            )),
            DistanceMode::RoadNetwork => {
                let result = match &self.oracle {
                    Some(oracle) => oracle.route(origin, destination).await,
                    None => Err(RoutingError::Unavailable),
                };

                match result {
                    Ok(route) => DistanceOutcome::Ok(Distance {
                        meters: route.meters,
                        seconds: Some(route.seconds),
                        method_used: MethodUsed::RoadNetwork,
                    }),
                    Err(cause) => {
                        log::debug!(
                            "Routing ({}, {}) -> ({}, {}) failed, using straight line: {cause}",
                            origin.x(),
                            origin.y(),
                            destination.x(),
                            destination.y(),
                        );
                        DistanceOutcome::Fallback {
                            distance: straight_line(origin, destination, MethodUsed::Fallback),
                            cause,
                        }
                    }
                }
            }
        }
    }
}

fn straight_line(origin: Point<f64>, destination: Point<f64>, method_used: MethodUsed) -> Distance {
    Distance {
        meters: haversine_m(origin, destination),
        seconds: None,
        method_used,
    }
}
