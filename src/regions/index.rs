//! Wrap-aware viewport resolver
//!
//! Region boundaries are projected to world space once per projection and
//! stored as normalized bounding boxes in an R-tree. World space is periodic
//! in x while rectangle tests are not, so every viewport query also tries
//! the region boxes shifted by a full turn in both directions.

use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeSet;

use super::grid::{RegionGrid, RegionId};
use crate::geometry::{normalize_longitude, spatial_to_world, Rect};
use crate::projection::Projection;

/// R-tree entry for a region bounding box
#[derive(Clone, Debug)]
pub struct RegionEnvelope {
    pub id: RegionId,
    pub rect: Rect,
    bounds: AABB<[f64; 2]>,
}

impl RegionEnvelope {
    pub fn new(id: RegionId, rect: Rect) -> Self {
        Self {
            id,
            rect,
            bounds: rect.to_aabb(),
        }
    }
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for RegionEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bounds.distance_2(point)
    }
}

/// World-space region boxes for one projection
pub struct RegionIndex {
    tree: RTree<RegionEnvelope>,
}

impl RegionIndex {
    /// Project every region boundary and keep one bounding box per region.
    /// A boundary that straddles a projection discontinuity still yields a
    /// single box; the shifted copies in the query take care of the seam.
    pub fn build(grid: &RegionGrid, projection: &dyn Projection) -> Self {
        let start = std::time::Instant::now();
        let envelopes: Vec<RegionEnvelope> = grid
            .regions()
            .par_iter()
            .filter_map(|region| {
                let world = spatial_to_world(&region.boundary, projection);
                let bounds = world.bounds()?;
                Some(RegionEnvelope::new(region.id, normalize_box(bounds)))
            })
            .collect();

        tracing::debug!(
            regions = envelopes.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Built world region index"
        );

        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Regions whose world box, or the box shifted by +/-360, overlaps the
    /// query rectangle.
    ///
    /// Shifting a region by +360 and testing against `rect` is the same as
    /// testing the unshifted region against `rect - 360`, so the three
    /// copies are expressed as three translated queries.
    pub fn regions_under_viewport(&self, rect: &Rect) -> BTreeSet<RegionId> {
        let mut ids = BTreeSet::new();
        for dx in [0.0, -360.0, 360.0] {
            let query = rect.translate_x(dx);
            ids.extend(
                self.tree
                    .locate_in_envelope_intersecting(&query.to_aabb())
                    .filter(|e| e.rect.intersects(&query))
                    .map(|e| e.id),
            );
        }
        ids
    }

    /// Normalized world box of a region
    pub fn world_bounds(&self, id: RegionId) -> Option<Rect> {
        self.tree.iter().find(|e| e.id == id).map(|e| e.rect)
    }
}

/// Move a box so its minimum x lies in [0, 360)
fn normalize_box(rect: Rect) -> Rect {
    let dx = normalize_longitude(rect.min_x) - rect.min_x;
    rect.translate_x(dx)
}
