//! One map view of the instrument layer
//!
//! [`InstrumentLayer`] holds what every view shares (region catalog, data
//! source, enrichment queue). [`LayerView`] owns the per-view state and is
//! driven from a single UI thread: user actions go in through its methods,
//! worker results come back through [`LayerView::pump`].

use std::collections::BTreeSet;
use std::sync::Arc;

use super::buffers::{BufferManager, ContextState};
use super::context::{Context, ContextDef, ContextField, ContextId, ContextUpdate};
use super::fetch::{FetchMessage, FetchWorker};
use super::panel::ResultsPanel;
use crate::error::LayerError;
use crate::geometry::{Point, Rect};
use crate::projection::Projection;
use crate::regions::{RegionGrid, RegionId, RegionIndex};
use crate::runtime::{ObserverList, SerialQueue};
use crate::source::DataSource;

use super::events::LayerEvent;

/// Shared, process-wide pieces of the layer
pub struct InstrumentLayer {
    grid: Arc<RegionGrid>,
    source: Arc<dyn DataSource>,
    queue: Arc<SerialQueue>,
}

impl InstrumentLayer {
    pub fn new(grid: Arc<RegionGrid>, source: Arc<dyn DataSource>) -> std::io::Result<Self> {
        let queue = Arc::new(SerialQueue::new("layer-enrichment")?);
        Ok(Self {
            grid,
            source,
            queue,
        })
    }

    pub fn grid(&self) -> &Arc<RegionGrid> {
        &self.grid
    }

    pub fn queue(&self) -> &Arc<SerialQueue> {
        &self.queue
    }

    /// New view over `viewport` (world space)
    pub fn create_view(&self, projection: Arc<dyn Projection>, viewport: Rect) -> LayerView {
        let index = Arc::new(RegionIndex::build(&self.grid, projection.as_ref()));
        let worker = FetchWorker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.grid),
            Arc::clone(&index),
            Arc::clone(&projection),
            Arc::clone(&self.queue),
        );
        LayerView {
            grid: Arc::clone(&self.grid),
            projection,
            index: Arc::clone(&index),
            buffers: BufferManager::new(index, viewport),
            worker,
        }
    }
}

pub struct LayerView {
    grid: Arc<RegionGrid>,
    projection: Arc<dyn Projection>,
    index: Arc<RegionIndex>,
    buffers: BufferManager,
    worker: FetchWorker,
}

impl LayerView {
    pub fn events(&self) -> &Arc<ObserverList<LayerEvent>> {
        self.buffers.events()
    }

    pub fn projection(&self) -> &Arc<dyn Projection> {
        &self.projection
    }

    /// Rebuild the world index for a new projection
    pub fn set_projection(&mut self, projection: Arc<dyn Projection>) {
        let index = Arc::new(RegionIndex::build(&self.grid, projection.as_ref()));
        self.worker.set_projection(Arc::clone(&projection), Arc::clone(&index));
        self.projection = projection;
        self.index = Arc::clone(&index);
        self.buffers.set_region_index(index);
    }

    pub fn add_context(&mut self, def: ContextDef) -> ContextId {
        self.buffers.add(def)
    }

    pub fn update_context(&mut self, id: ContextId, update: ContextUpdate) -> Result<Vec<ContextField>, LayerError> {
        self.buffers.update(id, update)
    }

    pub fn activate(&mut self, id: ContextId) -> Result<(), LayerError> {
        self.buffers.activate(id)
    }

    pub fn deactivate(&mut self, id: ContextId) -> Result<(), LayerError> {
        self.buffers.deactivate(id)
    }

    pub fn delete_context(&mut self, id: ContextId) -> Result<Context, LayerError> {
        self.buffers.delete(id)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.buffers.contexts()
    }

    pub fn context_state(&self, id: ContextId) -> Option<ContextState> {
        self.buffers.state(id)
    }

    pub fn active_context(&self) -> Option<&Context> {
        self.buffers.active()
    }

    pub fn panel(&self, id: ContextId) -> Option<&ResultsPanel> {
        self.buffers.panel(id)
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn viewport(&self) -> Rect {
        self.buffers.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.buffers.set_viewport(viewport);
    }

    pub fn regions_under_viewport(&self, world: &Rect) -> BTreeSet<RegionId> {
        self.index.regions_under_viewport(world)
    }

    /// The point is normalized to spatial coordinates before lookup
    pub fn regions_under_point(&self, world: Point) -> BTreeSet<RegionId> {
        let spatial = self.projection.world_to_spatial(world.x, world.y);
        self.grid.regions_under_point(spatial)
    }

    pub fn is_fetching(&self) -> bool {
        self.worker.is_fetching()
    }

    /// Fetch the active context's records under a screen pixel
    pub fn select_at_screen(&mut self, px: f64, py: f64, toggle: bool) -> Result<(), LayerError> {
        let world = self.projection.screen_to_world(px, py);
        self.select_at(world, toggle)
    }

    /// Fetch the active context's records inside a screen rectangle
    pub fn box_select_screen(&mut self, a: (f64, f64), b: (f64, f64), toggle: bool) -> Result<(), LayerError> {
        let a = self.projection.screen_to_world(a.0, a.1);
        let b = self.projection.screen_to_world(b.0, b.1);
        self.box_select(Rect::from_corners(a, b), toggle)
    }

    pub fn select_at(&mut self, world: Point, toggle: bool) -> Result<(), LayerError> {
        let context = self.buffers.active().ok_or(LayerError::NoActiveContext)?;
        self.worker.fetch_at_point(context, world, toggle)?;
        self.buffers.set_fetching(true);
        Ok(())
    }

    pub fn box_select(&mut self, world: Rect, toggle: bool) -> Result<(), LayerError> {
        let context = self.buffers.active().ok_or(LayerError::NoActiveContext)?;
        self.worker.fetch_in_rect(context, world, toggle)?;
        self.buffers.set_fetching(true);
        Ok(())
    }

    /// Apply every pending worker message. Call from the UI thread.
    /// Returns the number of messages handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.worker.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, message: FetchMessage) {
        match message {
            FetchMessage::Completed {
                context,
                records,
                toggle,
                ..
            } => self.buffers.apply_fetch(context, records, toggle),
            FetchMessage::Enriched { context, rows } => self.buffers.apply_fields(context, rows),
            FetchMessage::Failed { context, error } => self.buffers.report_failure(context, error),
            FetchMessage::Finished { .. } => self.buffers.set_fetching(self.worker.is_fetching()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataAccessError;
    use crate::projection::{Equirectangular, ScreenTransform};
    use crate::source::{FieldMap, RecordKey, SourceRecord};

    struct EmptySource;

    impl DataSource for EmptySource {
        fn fetch_records(
            &self,
            _select: &str,
            _order_by: &str,
            _region: RegionId,
            _interpolate: bool,
        ) -> Result<Vec<SourceRecord>, DataAccessError> {
            Ok(Vec::new())
        }

        fn fetch_fields(
            &self,
            _keys: &[RecordKey],
            _fields: &[String],
        ) -> Result<Vec<(RecordKey, FieldMap)>, DataAccessError> {
            Ok(Vec::new())
        }
    }

    fn view() -> LayerView {
        let layer = InstrumentLayer::new(Arc::new(RegionGrid::standard()), Arc::new(EmptySource)).unwrap();
        layer.create_view(
            Arc::new(Equirectangular::new(ScreenTransform::default())),
            Rect::new(0.0, -90.0, 360.0, 90.0),
        )
    }

    #[test]
    fn selection_needs_an_active_context() {
        let mut view = view();
        assert!(matches!(
            view.select_at_screen(10.0, 10.0, false),
            Err(LayerError::NoActiveContext)
        ));
    }

    #[test]
    fn screen_point_resolves_through_projection() {
        let view = view();
        // Default screen: origin (0, 90), 4 px per degree
        let regions = view.regions_under_point(view.projection().screen_to_world(50.0, 350.0));
        assert_eq!(regions.into_iter().collect::<Vec<_>>(), vec![RegionId::from_bins(2, 18)]);
    }

    #[test]
    fn projection_change_rebuilds_index() {
        let mut view = view();
        let before = view.regions_under_viewport(&Rect::new(0.0, 0.0, 5.0, 5.0));
        view.set_projection(Arc::new(Equirectangular::new(ScreenTransform {
            origin_x: 180.0,
            ..Default::default()
        })));
        assert_eq!(view.regions_under_viewport(&Rect::new(0.0, 0.0, 5.0, 5.0)), before);
    }
}
