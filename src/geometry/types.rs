//! Core geometric primitives for instrument footprints
//!
//! All coordinates are `f64` degrees. Whether a value is in spatial
//! (east longitude / latitude) or world space is decided by the caller;
//! the types themselves carry no projection.

use rstar::AABB;
use serde::{Deserialize, Serialize};

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate_x(self, dx: f64) -> Self {
        Self::new(self.x + dx, self.y)
    }
}

/// Axis-aligned rectangle: [min_x, max_x] x [min_y, max_y]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Build a rectangle from any two opposite corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// A rectangle with no interior (zero or negative extent)
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn translate_x(&self, dx: f64) -> Self {
        Self::new(self.min_x + dx, self.min_y, self.max_x + dx, self.max_y)
    }

    /// True when the interiors of both rectangles overlap.
    /// Touching edges and empty rectangles never intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Half-open containment: min edges inclusive, max edges exclusive
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x < self.max_x && p.y >= self.min_y && p.y < self.max_y
    }

    /// Strict interior containment, used by the polygon/rectangle test
    pub fn contains_strictly(&self, p: Point) -> bool {
        p.x > self.min_x && p.x < self.max_x && p.y > self.min_y && p.y < self.max_y
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }

    pub fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// A closed ring: the last point always repeats the first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    points: Vec<Point>,
}

impl Ring {
    /// Build a ring from vertices, appending the first vertex when the
    /// input is not already closed
    pub fn closed(points: Vec<Point>) -> Self {
        let mut builder = RingBuilder::with_capacity(points.len() + 1);
        for p in points {
            builder.push(p);
        }
        builder.finish()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Vertices without the closing duplicate
    pub fn open_points(&self) -> &[Point] {
        match self.points.len() {
            0 => &self.points,
            n => &self.points[..n - 1],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn map_points(&self, f: &mut impl FnMut(Point) -> Point) -> Ring {
        Ring {
            points: self.points.iter().map(|&p| f(p)).collect(),
        }
    }
}

/// Accumulates ring vertices and closes the ring on `finish`
#[derive(Debug, Default)]
pub struct RingBuilder {
    points: Vec<Point>,
}

impl RingBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, p: Point) {
        self.points.push(p);
    }

    pub fn finish(mut self) -> Ring {
        if let (Some(&first), Some(&last)) = (self.points.first(), self.points.last()) {
            if self.points.len() == 1 || first != last {
                self.points.push(first);
            }
        }
        Ring { points: self.points }
    }
}

/// Polygon with an ordered list of closed rings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    /// Single-ring polygon from open or closed vertices
    pub fn from_exterior(points: Vec<Point>) -> Self {
        Self::new(vec![Ring::closed(points)])
    }

    /// Axis-aligned rectangle as a counter-clockwise polygon
    pub fn from_rect(rect: &Rect) -> Self {
        Self::from_exterior(rect.corners().to_vec())
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(Ring::is_empty)
    }

    /// First vertex of the first ring
    pub fn first_point(&self) -> Option<Point> {
        self.rings.iter().find_map(|r| r.points.first().copied())
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.rings.iter().flat_map(|r| r.points.iter().copied())
    }

    /// Bounding box over all rings, `None` for an empty polygon
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.points();
        let first = points.next()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in points {
            rect.min_x = rect.min_x.min(p.x);
            rect.min_y = rect.min_y.min(p.y);
            rect.max_x = rect.max_x.max(p.x);
            rect.max_y = rect.max_y.max(p.y);
        }
        Some(rect)
    }

    /// Apply `f` to every vertex, ring structure unchanged
    pub fn map_points(&self, mut f: impl FnMut(Point) -> Point) -> Polygon {
        Polygon {
            rings: self.rings.iter().map(|r| r.map_points(&mut f)).collect(),
        }
    }

    /// Path form of the polygon, one MoveTo/LineTo.../Close run per ring.
    /// The closing duplicate is left out; `Close` carries that meaning.
    pub fn to_path(&self) -> Path {
        let mut path = Path::new();
        for ring in &self.rings {
            let mut vertices = ring.open_points().iter();
            let Some(&first) = vertices.next() else {
                continue;
            };
            path.move_to(first);
            for &p in vertices {
                path.line_to(p);
            }
            path.close();
        }
        path
    }
}

/// A single drawing instruction of a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    Close,
}

/// Sequence of move/line/close instructions describing one or more rings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.segments.push(PathSegment::MoveTo(p));
        self
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.segments.push(PathSegment::LineTo(p));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.segments.push(PathSegment::Close);
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

/// Decoded wire geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    /// Two-point line string
    Line(Point, Point),
    /// Any other line string
    LineString(Vec<Point>),
    Polygon(Polygon),
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "point",
            Geometry::Line(..) => "line",
            Geometry::LineString(_) => "line_string",
            Geometry::Polygon(_) => "polygon",
        }
    }

    pub fn into_polygon(self) -> Option<Polygon> {
        match self {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_closes_open_input() {
        let ring = Ring::closed(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.points()[0], ring.points()[3]);
        assert_eq!(ring.open_points().len(), 3);
    }

    #[test]
    fn ring_keeps_already_closed_input() {
        let ring = Ring::closed(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        ]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn rect_intersection_requires_interior_overlap() {
        let a = Rect::new(0.0, 0.0, 5.0, 5.0);
        assert!(a.intersects(&Rect::new(4.0, 4.0, 6.0, 6.0)));
        assert!(!a.intersects(&Rect::new(5.0, 0.0, 10.0, 5.0)));
        assert!(!a.intersects(&Rect::new(1.0, 1.0, 1.0, 3.0)));
    }

    #[test]
    fn polygon_bounds_and_path() {
        let poly = Polygon::from_rect(&Rect::new(10.0, -5.0, 15.0, 0.0));
        assert_eq!(poly.bounds(), Some(Rect::new(10.0, -5.0, 15.0, 0.0)));

        let path = poly.to_path();
        assert_eq!(path.segments().len(), 5);
        assert_eq!(path.segments()[0], PathSegment::MoveTo(Point::new(10.0, -5.0)));
        assert_eq!(path.segments()[4], PathSegment::Close);
    }
}
