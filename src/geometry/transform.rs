//! Longitude and projection transforms for footprint polygons

use super::types::{Point, Polygon};
use crate::projection::Projection;

/// East longitude <-> west longitude
pub fn flip_longitude(x: f64) -> f64 {
    360.0 - x
}

pub fn flip_point(p: Point) -> Point {
    Point::new(flip_longitude(p.x), p.y)
}

pub fn flip_polygon(polygon: &Polygon) -> Polygon {
    polygon.map_points(flip_point)
}

/// Longitude in [0, 360)
pub fn normalize_longitude(lon: f64) -> f64 {
    let lon = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if lon >= 360.0 { 0.0 } else { lon }
}

pub fn spatial_to_world(polygon: &Polygon, projection: &dyn Projection) -> Polygon {
    polygon.map_points(|p| projection.spatial_to_world(p.x, p.y))
}

pub fn world_to_spatial(polygon: &Polygon, projection: &dyn Projection) -> Polygon {
    polygon.map_points(|p| projection.world_to_spatial(p.x, p.y))
}

/// Shift vertices by a full turn so none is more than 180 degrees of world x
/// away from the polygon's first vertex. Keeps seam-crossing footprints
/// from turning into bands across the whole world.
pub fn anchor_to_seam(polygon: &Polygon) -> Polygon {
    let Some(anchor) = polygon.first_point() else {
        return polygon.clone();
    };
    polygon.map_points(|p| {
        let dx = p.x - anchor.x;
        if dx > 180.0 {
            p.translate_x(-360.0)
        } else if dx < -180.0 {
            p.translate_x(360.0)
        } else {
            p
        }
    })
}

/// Spatial polygon to world space, seam-anchored, ready for rendering or
/// world-space hit tests
pub fn to_world_anchored(polygon: &Polygon, projection: &dyn Projection) -> Polygon {
    anchor_to_seam(&spatial_to_world(polygon, projection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::types::Rect;
    use crate::projection::Equirectangular;

    #[test]
    fn flip_is_an_involution() {
        let p = Point::new(12.5, -3.0);
        assert_eq!(flip_point(p), Point::new(347.5, -3.0));
        assert_eq!(flip_point(flip_point(p)), p);
    }

    #[test]
    fn normalizes_into_half_open_range() {
        assert_eq!(normalize_longitude(360.0), 0.0);
        assert_eq!(normalize_longitude(-1.0), 359.0);
        assert_eq!(normalize_longitude(725.0), 5.0);
    }

    #[test]
    fn anchor_pulls_far_vertices_next_to_first() {
        let polygon = Polygon::from_exterior(vec![
            Point::new(358.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 3.0),
            Point::new(358.0, 3.0),
        ]);
        let anchored = anchor_to_seam(&polygon);
        assert_eq!(anchored.bounds(), Some(Rect::new(358.0, 0.0, 362.0, 3.0)));
    }

    #[test]
    fn anchor_shifts_down_when_first_vertex_is_small() {
        let polygon = Polygon::from_exterior(vec![
            Point::new(1.0, 0.0),
            Point::new(359.0, 0.0),
            Point::new(359.0, 1.0),
        ]);
        let anchored = anchor_to_seam(&polygon);
        assert_eq!(anchored.rings()[0].points()[1], Point::new(-1.0, 0.0));
    }

    #[test]
    fn world_round_trip_through_equirectangular() {
        let proj = Equirectangular::default();
        let polygon = Polygon::from_rect(&Rect::new(10.0, 10.0, 20.0, 20.0));
        let back = world_to_spatial(&spatial_to_world(&polygon, &proj), &proj);
        assert_eq!(back, polygon);
    }
}
