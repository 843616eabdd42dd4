#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes for candidate site evaluation.
//!
//! Census polygons, critical-zone polygons, and infrastructure points are
//! loaded once per run into R-trees, and every candidate is answered with
//! envelope queries refined by exact `geo` predicates. Results are always
//! returned in insertion order so that downstream aggregation does not
//! depend on R-tree traversal order.

pub mod geometry;

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use geometry::{
    EARTH_RADIUS_M, destination, geodesic_buffer, haversine_m, multipolygon_of, point_of,
    validate_point,
};

/// Why a geometry cannot be used for scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The feature has no geometry at all.
    #[error("geometry is missing")]
    Missing,

    /// The geometry has no coordinates.
    #[error("geometry is empty")]
    Empty,

    /// A coordinate is NaN or infinite.
    #[error("geometry has non-finite coordinates")]
    NonFinite,

    /// A coordinate lies outside longitude/latitude bounds.
    #[error("coordinate ({lon}, {lat}) is outside WGS84 bounds")]
    OutOfRange {
        /// Offending longitude.
        lon: f64,
        /// Offending latitude.
        lat: f64,
    },

    /// The geometry type cannot serve this purpose.
    #[error("unsupported geometry type: {kind}")]
    Unsupported {
        /// Geometry type name.
        kind: String,
    },

    /// The geometry collapses to nothing usable.
    #[error("degenerate geometry: {message}")]
    Degenerate {
        /// Description of what is wrong.
        message: String,
    },
}

/// A polygon stored in the R-tree with its payload.
struct PolygonEntry<T> {
    slot: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
    payload: T,
}

impl<T> RTreeObject for PolygonEntry<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A polygon matched by a query.
#[derive(Debug)]
pub struct PolygonHit<'a, T> {
    /// Insertion position of the polygon.
    pub slot: usize,
    /// The matched polygon.
    pub polygon: &'a MultiPolygon<f64>,
    /// Data attached to the polygon.
    pub payload: &'a T,
}

/// R-tree of polygons for containment and overlap lookups.
pub struct PolygonIndex<T> {
    tree: RTree<PolygonEntry<T>>,
}

impl<T> PolygonIndex<T> {
    /// Builds the index, remembering each polygon's insertion position.
    #[must_use]
    pub fn build(polygons: impl IntoIterator<Item = (MultiPolygon<f64>, T)>) -> Self {
        let entries: Vec<_> = polygons
            .into_iter()
            .enumerate()
            .map(|(slot, (polygon, payload))| PolygonEntry {
                slot,
                envelope: compute_envelope(&polygon),
                polygon,
                payload,
            })
            .collect();

        log::debug!("Indexed {} polygons", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Polygons that contain `point`, in insertion order.
    #[must_use]
    pub fn containing(&self, point: Point<f64>) -> Vec<PolygonHit<'_, T>> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut hits: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(PolygonEntry::hit)
            .collect();
        hits.sort_by_key(|hit| hit.slot);
        hits
    }

    /// Polygons that intersect `point` (boundary included), in insertion
    /// order.
    #[must_use]
    pub fn touching(&self, point: Point<f64>) -> Vec<PolygonHit<'_, T>> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut hits: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .map(PolygonEntry::hit)
            .collect();
        hits.sort_by_key(|hit| hit.slot);
        hits
    }

    /// Polygons that intersect `area`, in insertion order.
    #[must_use]
    pub fn intersecting(&self, area: &MultiPolygon<f64>) -> Vec<PolygonHit<'_, T>> {
        let query_env = compute_envelope(area);

        let mut hits: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(area))
            .map(PolygonEntry::hit)
            .collect();
        hits.sort_by_key(|hit| hit.slot);
        hits
    }
}

impl<T> PolygonEntry<T> {
    const fn hit(&self) -> PolygonHit<'_, T> {
        PolygonHit {
            slot: self.slot,
            polygon: &self.polygon,
            payload: &self.payload,
        }
    }
}

/// A point stored in the R-tree with its payload.
struct PointEntry<T> {
    slot: usize,
    point: Point<f64>,
    payload: T,
}

impl<T> RTreeObject for PointEntry<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x(), self.point.y()])
    }
}

/// A point matched by a query.
#[derive(Debug)]
pub struct PointHit<'a, T> {
    /// Insertion position of the point.
    pub slot: usize,
    /// The matched location.
    pub point: Point<f64>,
    /// Data attached to the point.
    pub payload: &'a T,
}

/// R-tree of points for "which features fall inside this area" lookups.
pub struct PointIndex<T> {
    tree: RTree<PointEntry<T>>,
}

impl<T> PointIndex<T> {
    /// Builds the index, remembering each point's insertion position.
    #[must_use]
    pub fn build(points: impl IntoIterator<Item = (Point<f64>, T)>) -> Self {
        let entries: Vec<_> = points
            .into_iter()
            .enumerate()
            .map(|(slot, (point, payload))| PointEntry {
                slot,
                point,
                payload,
            })
            .collect();

        log::debug!("Indexed {} points", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Points inside or on the boundary of `area`, in insertion order.
    #[must_use]
    pub fn within(&self, area: &MultiPolygon<f64>) -> Vec<PointHit<'_, T>> {
        let query_env = compute_envelope(area);

        let mut hits: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| area.intersects(&entry.point))
            .map(|entry| PointHit {
                slot: entry.slot,
                point: entry.point,
                payload: &entry.payload,
            })
            .collect();
        hits.sort_by_key(|hit| hit.slot);
        hits
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
