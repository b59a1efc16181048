//! Geometry module for instrument footprints
//!
//! # Submodules
//! - `types` - Core primitives (Point, Rect, Ring, Polygon, Path, Geometry)
//! - `binary` - Binary wire codec (WKB-like)
//! - `transform` - Longitude flips, projection and seam-anchor transforms
//! - `hit_test` - Exact point/rectangle tests for selection filtering

mod binary;
mod transform;
mod types;

pub use types::{
    Geometry,
    Path,
    PathSegment,
    Point,
    Polygon,
    Rect,
    Ring,
    RingBuilder,
};

pub use binary::{
    decode,
    decode_polygon,
    encode_geometry,
    encode_line,
    encode_point,
    encode_polygon,
    RingLayout,
    BIG_ENDIAN_FLAG,
    LITTLE_ENDIAN_FLAG,
    WKB_LINE_STRING,
    WKB_POINT,
    WKB_POLYGON,
    WKB_RESERVED,
};

pub use transform::{
    anchor_to_seam,
    flip_longitude,
    flip_point,
    flip_polygon,
    normalize_longitude,
    spatial_to_world,
    to_world_anchored,
    world_to_spatial,
};

pub use hit_test::{
    polygon_contains,
    polygon_intersects_rect,
    polygon_intersects_rect_wrapped,
};
