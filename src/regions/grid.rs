//! Fixed-size region catalog
//!
//! The sphere is cut into `bin x bin` degree cells. Each cell becomes one
//! immutable [`RegionDesc`] built once and shared for the life of the process.

use rstar::RTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::index::RegionEnvelope;
use crate::error::ConfigError;
use crate::geometry::{Point, Polygon, Rect};

pub const DEFAULT_BIN_DEGREES: f64 = 5.0;

/// Packed region id: high 16 bits longitude bin, low 16 bits latitude bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl RegionId {
    pub fn from_bins(lon_bin: u16, lat_bin: u16) -> Self {
        Self(((lon_bin as u32) << 16) | lat_bin as u32)
    }

    pub fn lon_bin(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn lat_bin(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lon_bin(), self.lat_bin())
    }
}

/// One catalogued bin
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDesc {
    pub id: RegionId,
    /// Closed boundary in spatial east longitude degrees
    pub boundary: Polygon,
    /// Center of the boundary bounds (not the area centroid)
    pub centroid: Point,
    pub bounds: Rect,
}

impl RegionDesc {
    pub fn new(id: RegionId, boundary: Polygon) -> Self {
        let bounds = boundary.bounds().unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
        Self {
            id,
            centroid: bounds.center(),
            boundary,
            bounds,
        }
    }
}

/// Immutable catalog of regions with a spatial lookup tree
pub struct RegionGrid {
    bin_degrees: f64,
    regions: Vec<RegionDesc>,
    by_id: HashMap<RegionId, usize>,
    spatial: RTree<RegionEnvelope>,
}

impl RegionGrid {
    /// Standard 5 degree global grid (72 x 36 regions)
    pub fn standard() -> Self {
        Self::from_parts(DEFAULT_BIN_DEGREES, global_regions(DEFAULT_BIN_DEGREES))
    }

    /// Global grid covering longitude [0, 360) and latitude [-90, 90].
    /// The last row and column are clipped to the coverage edges.
    pub fn build_global(bin_degrees: f64) -> Result<Self, ConfigError> {
        if !(bin_degrees > 0.0 && bin_degrees <= 180.0) {
            return Err(ConfigError::Invalid(format!(
                "bin size must be in (0, 180], got {bin_degrees}"
            )));
        }

        if (360.0 / bin_degrees).ceil() > u16::MAX as f64 {
            return Err(ConfigError::Invalid(format!(
                "bin size {bin_degrees} produces too many bins"
            )));
        }

        let regions = global_regions(bin_degrees);
        Ok(Self::from_parts(bin_degrees, regions))
    }

    /// Catalog from explicit regions. Ids must be unique.
    pub fn from_regions(bin_degrees: f64, regions: Vec<RegionDesc>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for region in &regions {
            if !seen.insert(region.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate region id {}",
                    region.id
                )));
            }
        }
        Ok(Self::from_parts(bin_degrees, regions))
    }

    fn from_parts(bin_degrees: f64, regions: Vec<RegionDesc>) -> Self {
        let by_id = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        let spatial = RTree::bulk_load(
            regions
                .iter()
                .map(|r| RegionEnvelope::new(r.id, r.bounds))
                .collect(),
        );
        Self {
            bin_degrees,
            regions,
            by_id,
            spatial,
        }
    }

    pub fn bin_degrees(&self) -> f64 {
        self.bin_degrees
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[RegionDesc] {
        &self.regions
    }

    /// Shared lookup; no copy is made
    pub fn get(&self, id: RegionId) -> Option<&RegionDesc> {
        self.by_id.get(&id).map(|&i| &self.regions[i])
    }

    /// Owned copy for callers that outlive the grid borrow
    pub fn region_copy(&self, id: RegionId) -> Option<RegionDesc> {
        self.get(id).cloned()
    }

    /// Regions whose bounds contain a spatial point (edges inclusive, so a
    /// point on a bin edge reports both neighbours). The point is expected
    /// to be normalized already; no wraparound is applied.
    pub fn regions_under_point(&self, p: Point) -> BTreeSet<RegionId> {
        self.spatial
            .locate_all_at_point(&[p.x, p.y])
            .map(|e| e.id)
            .collect()
    }
}

/// Bins of a global grid; the last row and column are clipped to the
/// coverage edges. `bin_degrees` must already be validated.
fn global_regions(bin_degrees: f64) -> Vec<RegionDesc> {
    let lon_bins = (360.0 / bin_degrees).ceil() as usize;
    let lat_bins = (180.0 / bin_degrees).ceil() as usize;

    let mut regions = Vec::with_capacity(lon_bins * lat_bins);
    for lon_bin in 0..lon_bins {
        let lon0 = lon_bin as f64 * bin_degrees;
        let lon1 = (lon0 + bin_degrees).min(360.0);
        for lat_bin in 0..lat_bins {
            let lat0 = -90.0 + lat_bin as f64 * bin_degrees;
            let lat1 = (lat0 + bin_degrees).min(90.0);
            let id = RegionId::from_bins(lon_bin as u16, lat_bin as u16);
            let boundary = Polygon::from_rect(&Rect::new(lon0, lat0, lon1, lat1));
            regions.push(RegionDesc::new(id, boundary));
        }
    }

    tracing::debug!(lon_bins, lat_bins, bin_degrees, "Built global region grid");
    regions
}

impl fmt::Debug for RegionGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionGrid")
            .field("bin_degrees", &self.bin_degrees)
            .field("regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grid_has_72_by_36_bins() {
        let grid = RegionGrid::standard();
        assert_eq!(grid.len(), 72 * 36);
        assert_eq!(grid.bin_degrees(), 5.0);
    }

    #[test]
    fn standard_grid_matches_validated_build() {
        let standard = RegionGrid::standard();
        let built = RegionGrid::build_global(DEFAULT_BIN_DEGREES).unwrap();
        assert_eq!(standard.regions(), built.regions());
        assert!(standard.get(RegionId::from_bins(71, 35)).is_some());
    }

    #[test]
    fn id_packs_longitude_high_latitude_low() {
        let id = RegionId::from_bins(71, 35);
        assert_eq!(id.0, (71 << 16) | 35);
        assert_eq!(id.lon_bin(), 71);
        assert_eq!(id.lat_bin(), 35);
        assert_eq!(id.to_string(), "71:35");
    }

    #[test]
    fn region_boundary_and_centroid() {
        let grid = RegionGrid::standard();
        let region = grid.get(RegionId::from_bins(2, 18)).unwrap();
        assert_eq!(region.bounds, Rect::new(10.0, 0.0, 15.0, 5.0));
        assert_eq!(region.centroid, Point::new(12.5, 2.5));
        let ring = region.boundary.rings()[0].points();
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn lookups_share_and_copies_are_equal() {
        let grid = RegionGrid::standard();
        let id = RegionId::from_bins(0, 0);
        let shared = grid.get(id).unwrap();
        let again = grid.get(id).unwrap();
        assert!(std::ptr::eq(shared, again));
        assert_eq!(grid.region_copy(id).as_ref(), Some(shared));
    }

    #[test]
    fn point_lookup_interior_and_edge() {
        let grid = RegionGrid::standard();
        let inside = grid.regions_under_point(Point::new(12.0, 2.0));
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec![RegionId::from_bins(2, 18)]);

        let on_edge = grid.regions_under_point(Point::new(10.0, 2.0));
        assert_eq!(on_edge.len(), 2);
    }

    #[test]
    fn clips_uneven_bins() {
        let grid = RegionGrid::build_global(7.0).unwrap();
        assert_eq!(grid.len(), 52 * 26);
        let top = grid.get(RegionId::from_bins(51, 25)).unwrap();
        assert_eq!(top.bounds.max_x, 360.0);
        assert_eq!(top.bounds.max_y, 90.0);
    }

    #[test]
    fn rejects_duplicates_and_bad_bin_sizes() {
        let region = RegionDesc::new(
            RegionId(1),
            Polygon::from_rect(&Rect::new(0.0, 0.0, 5.0, 5.0)),
        );
        assert!(RegionGrid::from_regions(5.0, vec![region.clone(), region]).is_err());
        assert!(RegionGrid::build_global(0.0).is_err());
        assert!(RegionGrid::build_global(f64::NAN).is_err());
    }
}
