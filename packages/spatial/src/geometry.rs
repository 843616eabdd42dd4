//! Geodesic math and geometry validation on WGS84 longitude/latitude
//! coordinates.
//!
//! All distances are meters on a sphere of radius [`EARTH_RADIUS_M`].

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, CoordsIter, Geometry, LineString, MultiPolygon,
    Point, Polygon, Rect, Translate, coord,
};

use crate::GeometryError;

/// Mean Earth radius (IUGG) in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two lon/lat points, in meters.
#[must_use]
pub fn haversine_m(from: Point<f64>, to: Point<f64>) -> f64 {
    let lat1 = from.y().to_radians();
    let lat2 = to.y().to_radians();
    let dlat = (to.y() - from.y()).to_radians();
    let dlon = (to.x() - from.x()).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Point reached by travelling `distance_m` from `origin` along the
/// initial bearing `bearing_deg` (clockwise from north).
#[must_use]
pub fn destination(origin: Point<f64>, bearing_deg: f64, distance_m: f64) -> Point<f64> {
    let lat1 = origin.y().to_radians();
    let lon1 = origin.x().to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Point::new(normalize_longitude(lon2.to_degrees()), lat2.to_degrees())
}

fn normalize_longitude(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

/// Approximates the circle of radius `radius_m` around `center` with a
/// `segments`-vertex polygon.
///
/// A circle crossing the antimeridian is split into two parts, one on
/// each side of ±180° longitude.
///
/// # Errors
///
/// Returns [`GeometryError::Degenerate`] if the radius is not a positive
/// finite number or fewer than three segments are requested, and the
/// [`validate_point`] errors for an unusable center.
pub fn geodesic_buffer(
    center: Point<f64>,
    radius_m: f64,
    segments: usize,
) -> Result<MultiPolygon<f64>, GeometryError> {
    validate_point(center)?;

    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(GeometryError::Degenerate {
            message: format!("buffer radius must be positive, got {radius_m}"),
        });
    }
    if segments < 3 {
        return Err(GeometryError::Degenerate {
            message: format!("buffer needs at least 3 segments, got {segments}"),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let step = 360.0 / segments as f64;

    // Longitudes stay continuous around the center, possibly past ±180.
    #[allow(clippy::cast_precision_loss)]
    let mut ring: Vec<(f64, f64)> = (0..segments)
        .map(|i| {
            let p = destination(center, step * i as f64, radius_m);
            (center.x() + normalize_longitude(p.x() - center.x()), p.y())
        })
        .collect();
    ring.push(ring[0]);

    Ok(split_at_antimeridian(Polygon::new(
        LineString::from(ring),
        vec![],
    )))
}

fn split_at_antimeridian(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    let Some(rect) = polygon.bounding_rect() else {
        return MultiPolygon(vec![polygon]);
    };
    if rect.min().x >= -180.0 && rect.max().x <= 180.0 {
        return MultiPolygon(vec![polygon]);
    }

    let world = Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 })
        .to_polygon();
    let shift = if rect.max().x > 180.0 { -360.0 } else { 360.0 };
    let wrapped = polygon.translate(shift, 0.0);

    let mut parts = polygon.intersection(&world).0;
    parts.extend(wrapped.intersection(&world).0);
    MultiPolygon(parts)
}

/// Checks that a point has finite coordinates within WGS84 bounds.
///
/// # Errors
///
/// Returns [`GeometryError::NonFinite`] or [`GeometryError::OutOfRange`].
pub fn validate_point(point: Point<f64>) -> Result<(), GeometryError> {
    let (lon, lat) = (point.x(), point.y());
    if !lon.is_finite() || !lat.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(GeometryError::OutOfRange { lon, lat });
    }
    Ok(())
}

/// Reduces a geometry to a single location.
///
/// Points are returned as-is; any other geometry is reduced to its
/// centroid.
///
/// # Errors
///
/// Returns a [`GeometryError`] if the geometry is missing, empty, has
/// non-finite coordinates, or lies outside WGS84 bounds.
pub fn point_of(geometry: Option<&Geometry<f64>>) -> Result<Point<f64>, GeometryError> {
    let geometry = geometry.ok_or(GeometryError::Missing)?;
    check_coords(geometry)?;

    let point = match geometry {
        Geometry::Point(p) => *p,
        other => other.centroid().ok_or(GeometryError::Empty)?,
    };

    validate_point(point)?;
    Ok(point)
}

/// Converts an areal geometry into a [`MultiPolygon`].
///
/// # Errors
///
/// Returns a [`GeometryError`] if the geometry is missing, empty, not a
/// polygon/multipolygon, has non-finite coordinates, or contains a
/// polygon with fewer than four ring coordinates or zero area.
pub fn multipolygon_of(
    geometry: Option<&Geometry<f64>>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let geometry = geometry.ok_or(GeometryError::Missing)?;
    check_coords(geometry)?;

    let multi = match geometry {
        Geometry::Polygon(p) => MultiPolygon(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        other => {
            return Err(GeometryError::Unsupported {
                kind: geometry_kind(other).to_string(),
            });
        }
    };

    for polygon in &multi.0 {
        let ring_len = polygon.exterior().0.len();
        if ring_len < 4 {
            return Err(GeometryError::Degenerate {
                message: format!("exterior ring has {ring_len} coordinates"),
            });
        }
        if polygon.unsigned_area() <= 0.0 {
            return Err(GeometryError::Degenerate {
                message: "polygon has zero area".to_string(),
            });
        }
    }

    Ok(multi)
}

fn check_coords(geometry: &Geometry<f64>) -> Result<(), GeometryError> {
    if geometry.coords_count() == 0 {
        return Err(GeometryError::Empty);
    }
    if geometry
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(GeometryError::NonFinite);
    }
    Ok(())
}

/// Human-readable geometry type name.
#[must_use]
pub const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Intersects, polygon};

    use super::*;

    #[test]
    fn haversine_matches_known_distance() {
        // One degree of latitude on the mean-radius sphere.
        let d = haversine_m(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((d - 111_195.08).abs() < 1.0, "got {d}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        let p = Point::new(-66.1, 18.4);
        assert!(haversine_m(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn destination_inverts_haversine() {
        let origin = Point::new(-66.1057, 18.4655);
        for bearing in [0.0, 45.0, 137.0, 270.0] {
            let dest = destination(origin, bearing, 1_234.5);
            let back = haversine_m(origin, dest);
            assert!((back - 1_234.5).abs() < 1e-6, "bearing {bearing}: {back}");
        }
    }

    #[test]
    fn destination_wraps_antimeridian() {
        let dest = destination(Point::new(179.999, 0.0), 90.0, 1_000.0);
        assert!(dest.x() < -179.0, "got {}", dest.x());
    }

    #[test]
    fn buffer_contains_near_points_only() {
        let center = Point::new(-66.1057, 18.4655);
        let buffer = geodesic_buffer(center, 500.0, 36).unwrap();

        assert_eq!(buffer.0.len(), 1);
        assert_eq!(buffer.0[0].exterior().0.len(), 37);
        assert!(buffer.contains(&destination(center, 10.0, 200.0)));
        assert!(!buffer.contains(&destination(center, 10.0, 600.0)));
    }

    #[test]
    fn buffer_splits_at_antimeridian() {
        let center = Point::new(179.9999, 0.0);
        let buffer = geodesic_buffer(center, 500.0, 36).unwrap();

        assert_eq!(buffer.0.len(), 2);
        assert!(buffer.intersects(&center));
        assert!(buffer.contains(&Point::new(-179.999, 0.0)));
        assert!(!buffer.intersects(&Point::new(0.0, 0.0)));
        assert!(!buffer.intersects(&Point::new(-179.9, 0.0)));

        let west = geodesic_buffer(Point::new(-179.9999, 10.0), 500.0, 36).unwrap();
        assert_eq!(west.0.len(), 2);
        assert!(west.contains(&Point::new(179.999, 10.0)));
        assert!(!west.intersects(&Point::new(0.0, 10.0)));
    }

    #[test]
    fn buffer_rejects_bad_radius_and_segments() {
        let center = Point::new(0.0, 0.0);
        assert!(matches!(
            geodesic_buffer(center, 0.0, 36),
            Err(GeometryError::Degenerate { .. })
        ));
        assert!(matches!(
            geodesic_buffer(center, 100.0, 2),
            Err(GeometryError::Degenerate { .. })
        ));
    }

    #[test]
    fn point_of_reduces_polygons_to_centroid() {
        let square = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]);
        let p = point_of(Some(&square)).unwrap();
        assert!((p.x() - 1.0).abs() < 1e-9);
        assert!((p.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_of_rejects_unusable_geometry() {
        assert!(matches!(point_of(None), Err(GeometryError::Missing)));

        let nan = Geometry::Point(Point::new(f64::NAN, 1.0));
        assert!(matches!(point_of(Some(&nan)), Err(GeometryError::NonFinite)));

        let far = Geometry::Point(Point::new(200.0, 1.0));
        assert!(matches!(
            point_of(Some(&far)),
            Err(GeometryError::OutOfRange { .. })
        ));

        let empty = Geometry::MultiPoint(geo::MultiPoint(vec![]));
        assert!(matches!(point_of(Some(&empty)), Err(GeometryError::Empty)));
    }

    #[test]
    fn multipolygon_of_rejects_points_and_slivers() {
        let point = Geometry::Point(Point::new(1.0, 1.0));
        assert!(matches!(
            multipolygon_of(Some(&point)),
            Err(GeometryError::Unsupported { .. })
        ));

        let sliver = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ]);
        assert!(matches!(
            multipolygon_of(Some(&sliver)),
            Err(GeometryError::Degenerate { .. })
        ));
    }
}
