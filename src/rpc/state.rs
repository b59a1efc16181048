//! Server state for the layer server

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::LayerConfig;
use crate::geometry::Rect;
use crate::layer::{InstrumentLayer, LayerEvent, LayerView};
use crate::projection::{Equirectangular, Projection};
use crate::regions::RegionGrid;
use crate::source::{DataSource, SqliteDataSource, UnavailableSource};

/// Whole-world viewport used until the client sends one
pub const INITIAL_VIEWPORT: Rect = Rect::new(0.0, -90.0, 360.0, 90.0);

/// Everything the main loop owns. Lives on the UI thread.
pub struct ServerState {
    pub config: LayerConfig,
    pub layer: InstrumentLayer,
    pub view: LayerView,
    /// Display events waiting to be written as notifications
    outbox: Arc<Mutex<Vec<LayerEvent>>>,
    pub closed: bool,
}

impl ServerState {
    /// Open the configured record database (if any) and build one view
    pub fn new(config: LayerConfig) -> anyhow::Result<Self> {
        let source: Arc<dyn DataSource> = match &config.database {
            Some(path) => Arc::new(SqliteDataSource::open(path, config.source.clone())?),
            None => {
                tracing::warn!("No record database configured, selections will fail");
                Arc::new(UnavailableSource)
            }
        };
        Self::with_source(config, source)
    }

    pub fn with_source(config: LayerConfig, source: Arc<dyn DataSource>) -> anyhow::Result<Self> {
        let grid = Arc::new(RegionGrid::build_global(config.bin_degrees)?);
        tracing::info!(regions = grid.len(), bin_degrees = config.bin_degrees, "Region grid ready");

        let layer = InstrumentLayer::new(grid, source)?;
        let projection: Arc<dyn Projection> = Arc::new(Equirectangular::new(config.screen));
        let view = layer.create_view(projection, INITIAL_VIEWPORT);

        let outbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outbox);
        view.events().subscribe_fn(move |event: &LayerEvent| {
            sink.lock().push(event.clone());
            Ok(())
        });

        Ok(Self {
            config,
            layer,
            view,
            outbox,
            closed: false,
        })
    }

    /// Apply finished worker results; called on every clock tick
    pub fn pump(&mut self) -> usize {
        self.view.pump()
    }

    pub fn take_events(&self) -> Vec<LayerEvent> {
        std::mem::take(&mut *self.outbox.lock())
    }
}
