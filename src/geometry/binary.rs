//! Binary wire codec for footprint geometry
//!
//! The format is modeled on Well-Known Binary:
//! `[order: u8][type: i32][payload]` where order 0 is big-endian and
//! order 1 is little-endian. Payloads:
//! - point: `x: f64, y: f64`
//! - line string: `count: i32` then `count` (x, y) pairs
//! - polygon: `rings: i32` then per ring `count: i32` and (x, y) pairs
//!
//! Encoding is intentionally asymmetric: points and lines are written
//! little-endian, polygons big-endian. Readers downstream rely on this.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::marker::PhantomData;
use std::ops::RangeInclusive;

use super::types::{Geometry, Path, PathSegment, Point, Polygon, RingBuilder};
use crate::error::GeometryError;

pub const BIG_ENDIAN_FLAG: u8 = 0;
pub const LITTLE_ENDIAN_FLAG: u8 = 1;

pub const WKB_POINT: i32 = 1;
pub const WKB_LINE_STRING: i32 = 2;
pub const WKB_POLYGON: i32 = 3;

/// Multi-point, multi-line, multi-polygon and collection tags
pub const WKB_RESERVED: RangeInclusive<i32> = 4..=7;

const HEADER_LEN: usize = 1 + 4;
const COUNT_LEN: usize = 4;
const POINT_LEN: usize = 16;

/// Decode a geometry from wire bytes. Trailing bytes are ignored.
pub fn decode(bytes: &[u8]) -> Result<Geometry, GeometryError> {
    let Some((&flag, payload)) = bytes.split_first() else {
        return Err(GeometryError::Truncated { needed: 1, remaining: 0 });
    };
    match flag {
        BIG_ENDIAN_FLAG => decode_payload::<BigEndian>(payload),
        LITTLE_ENDIAN_FLAG => decode_payload::<LittleEndian>(payload),
        other => Err(GeometryError::ByteOrder(other)),
    }
}

/// Decode and require a polygon
pub fn decode_polygon(bytes: &[u8]) -> Result<Polygon, GeometryError> {
    match decode(bytes)? {
        Geometry::Polygon(polygon) => Ok(polygon),
        other => Err(GeometryError::UnexpectedType {
            expected: "polygon",
            found: other.kind(),
        }),
    }
}

fn decode_payload<B: ByteOrder>(payload: &[u8]) -> Result<Geometry, GeometryError> {
    let mut reader = WireReader::<B>::new(payload);
    match reader.read_i32()? {
        WKB_POINT => Ok(Geometry::Point(reader.read_point()?)),
        WKB_LINE_STRING => {
            let count = reader.read_count("point")?;
            reader.require(count * POINT_LEN)?;
            let points = (0..count)
                .map(|_| reader.read_point())
                .collect::<Result<Vec<_>, _>>()?;
            match points.as_slice() {
                [a, b] => Ok(Geometry::Line(*a, *b)),
                _ => Ok(Geometry::LineString(points)),
            }
        }
        WKB_POLYGON => {
            let ring_count = reader.read_count("ring")?;
            reader.require(ring_count * COUNT_LEN)?;
            let mut rings = Vec::with_capacity(ring_count);
            for _ in 0..ring_count {
                let count = reader.read_count("point")?;
                reader.require(count * POINT_LEN)?;
                let mut ring = RingBuilder::with_capacity(count + 1);
                for _ in 0..count {
                    ring.push(reader.read_point()?);
                }
                rings.push(ring.finish());
            }
            Ok(Geometry::Polygon(Polygon::new(rings)))
        }
        tag if WKB_RESERVED.contains(&tag) => Err(GeometryError::UnsupportedType(tag)),
        tag => Err(GeometryError::UnknownType(tag)),
    }
}

/// Bounds-checked cursor over a wire payload
struct WireReader<'a, B> {
    buf: &'a [u8],
    pos: usize,
    _order: PhantomData<B>,
}

impl<'a, B: ByteOrder> WireReader<'a, B> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, _order: PhantomData }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn require(&self, needed: usize) -> Result<(), GeometryError> {
        if needed > self.remaining() {
            return Err(GeometryError::Truncated { needed, remaining: self.remaining() });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], GeometryError> {
        self.require(len)?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_i32(&mut self) -> Result<i32, GeometryError> {
        Ok(B::read_i32(self.take(4)?))
    }

    fn read_f64(&mut self) -> Result<f64, GeometryError> {
        Ok(B::read_f64(self.take(8)?))
    }

    fn read_point(&mut self) -> Result<Point, GeometryError> {
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        Ok(Point::new(x, y))
    }

    fn read_count(&mut self, what: &'static str) -> Result<usize, GeometryError> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| GeometryError::NegativeCount { what, count })
    }
}

/// Writer over a buffer allocated at its exact final size
struct WireWriter<B> {
    buf: Vec<u8>,
    pos: usize,
    _order: PhantomData<B>,
}

impl<B: ByteOrder> WireWriter<B> {
    fn with_len(len: usize) -> Self {
        Self { buf: vec![0; len], pos: 0, _order: PhantomData }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn put_i32(&mut self, v: i32) {
        B::write_i32(&mut self.buf[self.pos..self.pos + 4], v);
        self.pos += 4;
    }

    fn put_count(&mut self, count: usize) {
        self.put_i32(i32::try_from(count).unwrap_or(i32::MAX));
    }

    fn put_point(&mut self, p: Point) {
        B::write_f64(&mut self.buf[self.pos..self.pos + 8], p.x);
        B::write_f64(&mut self.buf[self.pos + 8..self.pos + 16], p.y);
        self.pos += POINT_LEN;
    }

    fn finish(self) -> Vec<u8> {
        debug_assert_eq!(self.pos, self.buf.len(), "wire buffer size mismatch");
        self.buf
    }
}

/// Encode a point (little-endian)
pub fn encode_point(p: Point) -> Vec<u8> {
    let mut w = WireWriter::<LittleEndian>::with_len(HEADER_LEN + POINT_LEN);
    w.put_u8(LITTLE_ENDIAN_FLAG);
    w.put_i32(WKB_POINT);
    w.put_point(p);
    w.finish()
}

/// Encode a line string (little-endian)
pub fn encode_line(points: &[Point]) -> Vec<u8> {
    let mut w = WireWriter::<LittleEndian>::with_len(HEADER_LEN + COUNT_LEN + points.len() * POINT_LEN);
    w.put_u8(LITTLE_ENDIAN_FLAG);
    w.put_i32(WKB_LINE_STRING);
    w.put_count(points.len());
    for &p in points {
        w.put_point(p);
    }
    w.finish()
}

/// Encode a polygon path (big-endian).
///
/// The first pass lays out ring sizes so the buffer is allocated once;
/// the second pass writes coordinates and closes every ring by repeating
/// its first point.
pub fn encode_polygon(path: &Path) -> Vec<u8> {
    let layout = RingLayout::scan(path);

    let mut w = WireWriter::<BigEndian>::with_len(layout.wire_len());
    w.put_u8(BIG_ENDIAN_FLAG);
    w.put_i32(WKB_POLYGON);
    w.put_count(layout.ring_count());

    let mut ring_index = 0;
    let mut at_ring_start = true;
    walk_rings(path, |event| match event {
        RingEvent::Vertex(p) => {
            if at_ring_start {
                w.put_count(layout.lengths[ring_index]);
                at_ring_start = false;
            }
            w.put_point(p);
        }
        RingEvent::Close { first } => {
            w.put_point(first);
            ring_index += 1;
            at_ring_start = true;
        }
    });

    w.finish()
}

/// Encode any decoded geometry with the primitive's own byte order
pub fn encode_geometry(geometry: &Geometry) -> Vec<u8> {
    match geometry {
        Geometry::Point(p) => encode_point(*p),
        Geometry::Line(a, b) => encode_line(&[*a, *b]),
        Geometry::LineString(points) => encode_line(points),
        Geometry::Polygon(polygon) => encode_polygon(&polygon.to_path()),
    }
}

/// Ring sizes of a polygon path as they will appear on the wire
/// (closing point included)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RingLayout {
    lengths: Vec<usize>,
}

impl RingLayout {
    pub fn scan(path: &Path) -> Self {
        let mut lengths = Vec::new();
        let mut current = 0usize;
        walk_rings(path, |event| match event {
            RingEvent::Vertex(_) => current += 1,
            RingEvent::Close { .. } => {
                lengths.push(current + 1);
                current = 0;
            }
        });
        Self { lengths }
    }

    pub fn ring_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn wire_len(&self) -> usize {
        HEADER_LEN
            + COUNT_LEN
            + self
                .lengths
                .iter()
                .map(|n| COUNT_LEN + n * POINT_LEN)
                .sum::<usize>()
    }
}

enum RingEvent {
    Vertex(Point),
    Close { first: Point },
}

/// Walk a path and report ring vertices and ring closes.
///
/// A ring exists once a MoveTo is followed by at least one LineTo. A MoveTo
/// after an open ring closes it; consecutive MoveTo segments only replace the
/// pending start point. An open ring at the end of the path is closed.
fn walk_rings(path: &Path, mut on_event: impl FnMut(RingEvent)) {
    let mut pending: Option<Point> = None;
    let mut open: Option<Point> = None;

    for segment in path.segments() {
        match *segment {
            PathSegment::MoveTo(p) => {
                if let Some(first) = open.take() {
                    on_event(RingEvent::Close { first });
                }
                pending = Some(p);
            }
            PathSegment::LineTo(p) => {
                if open.is_none() {
                    let Some(start) = pending.take() else {
                        // No start point: the ring begins at this vertex
                        on_event(RingEvent::Vertex(p));
                        open = Some(p);
                        continue;
                    };
                    on_event(RingEvent::Vertex(start));
                    open = Some(start);
                }
                on_event(RingEvent::Vertex(p));
            }
            PathSegment::Close => {
                if let Some(first) = open.take() {
                    on_event(RingEvent::Close { first });
                    pending = Some(first);
                }
            }
        }
    }

    if let Some(first) = open {
        on_event(RingEvent::Close { first });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::types::Ring;
    use pretty_assertions::assert_eq;

    fn triangle_path() -> Path {
        let mut path = Path::new();
        path.move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(10.0, 0.0))
            .line_to(Point::new(5.0, 8.0))
            .close();
        path
    }

    #[test]
    fn triangle_decodes_to_closed_four_point_ring() {
        let bytes = encode_polygon(&triangle_path());
        let polygon = decode_polygon(&bytes).unwrap();

        assert_eq!(polygon.rings().len(), 1);
        let ring = polygon.rings()[0].points();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], ring[3]);
        assert_eq!(ring[1], Point::new(10.0, 0.0));
    }

    #[test]
    fn polygon_is_big_endian_and_exactly_sized() {
        let bytes = encode_polygon(&triangle_path());
        assert_eq!(bytes[0], BIG_ENDIAN_FLAG);
        assert_eq!(&bytes[1..5], &WKB_POLYGON.to_be_bytes());
        assert_eq!(bytes.len(), 1 + 4 + 4 + 4 + 4 * 16);
    }

    #[test]
    fn point_and_line_are_little_endian() {
        let point = encode_point(Point::new(1.5, -2.0));
        assert_eq!(point[0], LITTLE_ENDIAN_FLAG);
        assert_eq!(&point[1..5], &WKB_POINT.to_le_bytes());
        assert_eq!(point.len(), 21);

        let line = encode_line(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert_eq!(line[0], LITTLE_ENDIAN_FLAG);
        assert_eq!(&line[5..9], &2i32.to_le_bytes());
    }

    #[test]
    fn point_round_trips() {
        let p = Point::new(-120.25, 33.5);
        assert_eq!(decode(&encode_point(p)), Ok(Geometry::Point(p)));
    }

    #[test]
    fn two_point_line_decodes_to_fast_path() {
        let a = Point::new(3.0, 4.0);
        let b = Point::new(5.0, 6.0);
        assert_eq!(decode(&encode_line(&[a, b])).unwrap(), Geometry::Line(a, b));

        let pts = vec![a, b, Point::new(7.0, 8.0)];
        assert_eq!(decode(&encode_line(&pts)).unwrap(), Geometry::LineString(pts));
    }

    #[test]
    fn repeated_move_does_not_create_empty_ring() {
        let mut path = Path::new();
        path.move_to(Point::new(100.0, 100.0))
            .move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(1.0, 0.0))
            .line_to(Point::new(1.0, 1.0))
            .close();
        let layout = RingLayout::scan(&path);
        assert_eq!(layout.lengths(), &[4]);

        let polygon = decode_polygon(&encode_polygon(&path)).unwrap();
        assert_eq!(polygon.rings()[0].points()[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn move_after_open_ring_starts_a_new_ring() {
        let mut path = Path::new();
        path.move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(4.0, 0.0))
            .line_to(Point::new(4.0, 4.0))
            .move_to(Point::new(1.0, 1.0))
            .line_to(Point::new(2.0, 1.0))
            .line_to(Point::new(2.0, 2.0))
            .close();

        let layout = RingLayout::scan(&path);
        assert_eq!(layout.lengths(), &[4, 4]);

        let polygon = decode_polygon(&encode_polygon(&path)).unwrap();
        assert_eq!(polygon.rings().len(), 2);
        for ring in polygon.rings() {
            assert_eq!(ring.points().first(), ring.points().last());
        }
    }

    #[test]
    fn round_trip_is_stable() {
        let polygon = Polygon::new(vec![
            Ring::closed(vec![
                Point::new(350.0, -10.0),
                Point::new(355.5, -10.0),
                Point::new(355.5, -4.25),
                Point::new(350.0, -4.25),
            ]),
            Ring::closed(vec![
                Point::new(351.0, -9.0),
                Point::new(352.0, -9.0),
                Point::new(352.0, -8.0),
            ]),
        ]);
        let once = decode_polygon(&encode_polygon(&polygon.to_path())).unwrap();
        assert_eq!(once, polygon);
        let twice = decode_polygon(&encode_polygon(&once.to_path())).unwrap();
        assert_eq!(twice, polygon);
    }

    #[test]
    fn decoder_closes_open_wire_rings() {
        // Little-endian polygon whose single ring omits the closing point
        let mut bytes = vec![LITTLE_ENDIAN_FLAG];
        bytes.extend_from_slice(&WKB_POLYGON.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        for (x, y) in [(0.0f64, 0.0f64), (2.0, 0.0), (2.0, 2.0)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
        }

        let polygon = decode_polygon(&bytes).unwrap();
        let ring = polygon.rings()[0].points();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[3], Point::new(0.0, 0.0));
    }

    #[test]
    fn rejects_bad_byte_order() {
        let mut bytes = encode_point(Point::new(1.0, 2.0));
        bytes[0] = 7;
        assert_eq!(decode(&bytes), Err(GeometryError::ByteOrder(7)));
    }

    #[test]
    fn rejects_unknown_and_reserved_tags() {
        for tag in 4i32..=7 {
            let mut bytes = vec![LITTLE_ENDIAN_FLAG];
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&0i32.to_le_bytes());
            assert_eq!(decode(&bytes), Err(GeometryError::UnsupportedType(tag)));
        }

        let mut bytes = vec![BIG_ENDIAN_FLAG];
        bytes.extend_from_slice(&42i32.to_be_bytes());
        assert_eq!(decode(&bytes), Err(GeometryError::UnknownType(42)));
    }

    #[test]
    fn rejects_truncated_buffers() {
        assert!(matches!(decode(&[]), Err(GeometryError::Truncated { .. })));

        let point = encode_point(Point::new(1.0, 2.0));
        assert!(matches!(decode(&point[..12]), Err(GeometryError::Truncated { .. })));

        let polygon = encode_polygon(&triangle_path());
        let cut = &polygon[..polygon.len() - 1];
        assert!(matches!(decode(cut), Err(GeometryError::Truncated { .. })));
    }

    #[test]
    fn rejects_negative_counts() {
        let mut bytes = vec![BIG_ENDIAN_FLAG];
        bytes.extend_from_slice(&WKB_LINE_STRING.to_be_bytes());
        bytes.extend_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(
            decode(&bytes),
            Err(GeometryError::NegativeCount { what: "point", count: -1 })
        );
    }
}
