//! Projection collaborator
//!
//! Spatial coordinates are (east longitude, latitude) in degrees. World
//! coordinates are the projected plane, periodic in x with a 360 degree
//! period. Screen coordinates are pixels with y growing downwards.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Coordinate conversions used for one draw/fetch cycle.
/// Implementations must be pure.
pub trait Projection: Send + Sync {
    fn spatial_to_world(&self, lon: f64, lat: f64) -> Point;
    fn world_to_spatial(&self, x: f64, y: f64) -> Point;
    fn screen_to_world(&self, px: f64, py: f64) -> Point;
}

/// Maps screen pixels onto world degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenTransform {
    /// World coordinate of the top-left pixel
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixels_per_degree: f64,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 90.0,
            pixels_per_degree: 4.0,
        }
    }
}

/// Plate carree: world x is east longitude, world y is latitude.
///
/// `spatial_to_world` does not wrap longitudes, so a polygon given as
/// 355..365 stays contiguous in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Equirectangular {
    pub screen: ScreenTransform,
}

impl Equirectangular {
    pub fn new(screen: ScreenTransform) -> Self {
        Self { screen }
    }
}

impl Projection for Equirectangular {
    fn spatial_to_world(&self, lon: f64, lat: f64) -> Point {
        Point::new(lon, lat)
    }

    fn world_to_spatial(&self, x: f64, y: f64) -> Point {
        Point::new(x.rem_euclid(360.0), y.clamp(-90.0, 90.0))
    }

    fn screen_to_world(&self, px: f64, py: f64) -> Point {
        let scale = self.screen.pixels_per_degree;
        Point::new(
            self.screen.origin_x + px / scale,
            self.screen.origin_y - py / scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_to_world_scales_and_flips_y() {
        let proj = Equirectangular::new(ScreenTransform {
            origin_x: 350.0,
            origin_y: 10.0,
            pixels_per_degree: 2.0,
        });
        assert_eq!(proj.screen_to_world(20.0, 4.0), Point::new(360.0, 8.0));
    }

    #[test]
    fn world_to_spatial_wraps_longitude() {
        let proj = Equirectangular::default();
        assert_eq!(proj.world_to_spatial(362.0, 1.0), Point::new(2.0, 1.0));
        assert_eq!(proj.world_to_spatial(-5.0, 1.0), Point::new(355.0, 1.0));
    }
}
