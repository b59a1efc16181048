//! Selection fetch worker
//!
//! Resolves the regions under a selection, pulls candidate records from the
//! data source, decodes and hit-tests their footprints, and hands the
//! surviving records back to the UI thread over a channel. At most one fetch
//! runs per worker; a second request while one is in flight is rejected.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::color::ColorScale;
use super::context::{Context, ContextId};
use super::record::FetchRecord;
use crate::error::LayerError;
use crate::geometry::{
    decode_polygon, flip_polygon, polygon_contains, polygon_intersects_rect_wrapped,
    to_world_anchored, Point, Rect,
};
use crate::projection::Projection;
use crate::regions::{RegionGrid, RegionId, RegionIndex};
use crate::runtime::SerialQueue;
use crate::source::{DataSource, FieldMap, RecordKey};

/// Selection shape after conversion out of screen space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchQuery {
    /// Normalized spatial point (east longitude, latitude)
    Point(Point),
    /// World-space rectangle, possibly crossing the seam
    Rect(Rect),
}

/// Messages from fetch threads and enrichment tasks to the UI thread
#[derive(Debug)]
pub enum FetchMessage {
    Completed {
        context: ContextId,
        records: Vec<FetchRecord>,
        toggle: bool,
        elapsed: Duration,
    },
    Enriched {
        context: ContextId,
        rows: Vec<(RecordKey, FieldMap)>,
    },
    Failed {
        context: ContextId,
        error: String,
    },
    /// Sent once per accepted fetch, after `Completed` or `Failed`
    Finished { context: ContextId },
}

/// Everything a fetch thread needs, cloned out of the worker
#[derive(Clone)]
struct FetchEnv {
    source: Arc<dyn DataSource>,
    grid: Arc<RegionGrid>,
    index: Arc<RegionIndex>,
    projection: Arc<dyn Projection>,
    queue: Arc<SerialQueue>,
}

pub struct FetchWorker {
    env: FetchEnv,
    in_flight: Arc<AtomicBool>,
    tx: Sender<FetchMessage>,
    rx: Receiver<FetchMessage>,
}

impl FetchWorker {
    pub fn new(
        source: Arc<dyn DataSource>,
        grid: Arc<RegionGrid>,
        index: Arc<RegionIndex>,
        projection: Arc<dyn Projection>,
        queue: Arc<SerialQueue>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            env: FetchEnv {
                source,
                grid,
                index,
                projection,
                queue,
            },
            in_flight: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Used by later fetches; a running fetch keeps what it started with
    pub fn set_projection(&mut self, projection: Arc<dyn Projection>, index: Arc<RegionIndex>) {
        self.env.projection = projection;
        self.env.index = index;
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Records whose spatial footprint contains the world point
    pub fn fetch_at_point(&self, context: &Context, world: Point, toggle: bool) -> Result<(), LayerError> {
        let spatial = self.env.projection.world_to_spatial(world.x, world.y);
        self.spawn(context, FetchQuery::Point(spatial), toggle)
    }

    /// Records whose seam-anchored world footprint intersects the rectangle
    pub fn fetch_in_rect(&self, context: &Context, world: Rect, toggle: bool) -> Result<(), LayerError> {
        self.spawn(context, FetchQuery::Rect(world), toggle)
    }

    fn spawn(&self, context: &Context, query: FetchQuery, toggle: bool) -> Result<(), LayerError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!(context = %context.id, "Fetch rejected, another fetch is in flight");
            return Err(LayerError::RejectedFetch);
        }

        // From here on the guard owns the flag, including when spawn fails
        let guard = InFlightGuard {
            flag: Arc::clone(&self.in_flight),
            tx: self.tx.clone(),
            context: context.id,
        };
        let env = self.env.clone();
        let context = context.clone();
        let tx = self.tx.clone();

        thread::Builder::new()
            .name("selection-fetch".to_string())
            .spawn(move || {
                let _guard = guard;
                run_fetch(&env, &context, query, toggle, &tx);
            })
            .map_err(LayerError::Spawn)?;
        Ok(())
    }

    /// Next pending message without blocking
    pub fn try_recv(&self) -> Option<FetchMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            // The worker holds a sender itself
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block for the next message, for tests and shutdown
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FetchMessage> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Clears the in-flight flag and announces the end of a fetch on every
/// exit path, panics included
struct InFlightGuard {
    flag: Arc<AtomicBool>,
    tx: Sender<FetchMessage>,
    context: ContextId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        let _ = self.tx.send(FetchMessage::Finished {
            context: self.context,
        });
    }
}

fn run_fetch(env: &FetchEnv, context: &Context, query: FetchQuery, toggle: bool, tx: &Sender<FetchMessage>) {
    let start = Instant::now();
    tracing::info!(context = %context.id, ?query, toggle, "Fetch started");

    match collect_records(env, context, query) {
        Ok(records) => {
            let elapsed = start.elapsed();
            tracing::info!(
                context = %context.id,
                records = records.len(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Fetch finished"
            );
            let keys: Vec<RecordKey> = records.iter().map(|r| r.key.clone()).collect();
            let _ = tx.send(FetchMessage::Completed {
                context: context.id,
                records,
                toggle,
                elapsed,
            });
            request_enrichment(env, context, keys, tx);
        }
        Err(e) => {
            tracing::error!(context = %context.id, "Fetch failed: {}", e);
            let _ = tx.send(FetchMessage::Failed {
                context: context.id,
                error: e.to_string(),
            });
        }
    }
}

/// Resolve, fetch, decode, filter and color. Any error aborts the whole
/// fetch so no partial result escapes.
fn collect_records(env: &FetchEnv, context: &Context, query: FetchQuery) -> Result<Vec<FetchRecord>, LayerError> {
    let regions: BTreeSet<RegionId> = match query {
        FetchQuery::Point(p) => env.grid.regions_under_point(p),
        FetchQuery::Rect(r) => env.index.regions_under_viewport(&r),
    };
    tracing::debug!(context = %context.id, regions = regions.len(), "Resolved candidate regions");

    let west = env.source.west_longitude();
    let mut hits: IndexMap<RecordKey, FetchRecord> = IndexMap::new();

    for region in regions {
        let candidates = env.source.fetch_records(
            &context.def.select,
            &context.def.order_by,
            region,
            context.interpolate(),
        )?;

        for candidate in candidates {
            if hits.contains_key(&candidate.key) {
                continue;
            }
            let mut polygon = decode_polygon(&candidate.polygon)?;
            if west {
                polygon = flip_polygon(&polygon);
            }

            let hit = match query {
                FetchQuery::Point(p) => polygon_contains(&polygon, p),
                FetchQuery::Rect(r) => {
                    let world = to_world_anchored(&polygon, env.projection.as_ref());
                    polygon_intersects_rect_wrapped(&world, &r)
                }
            };
            if hit {
                hits.insert(
                    candidate.key.clone(),
                    FetchRecord {
                        key: candidate.key,
                        fields: candidate.fields,
                        polygon,
                        color: None,
                    },
                );
            }
        }
    }

    let scale = ColorScale::fit(context.def.color_by.as_deref(), hits.values().map(|r| &r.fields));
    Ok(hits
        .into_values()
        .map(|mut record| {
            record.color = scale.color_for(&record.fields, context.def.draw_null);
            record
        })
        .collect())
}

fn request_enrichment(env: &FetchEnv, context: &Context, keys: Vec<RecordKey>, tx: &Sender<FetchMessage>) {
    if keys.is_empty() || context.def.fields.is_empty() {
        return;
    }

    let source = Arc::clone(&env.source);
    let fields = context.def.fields.clone();
    let id = context.id;
    let tx = tx.clone();
    env.queue.submit(move || {
        let rows = source.fetch_fields(&keys, &fields)?;
        tracing::debug!(context = %id, rows = rows.len(), "Enrichment fetched");
        tx.send(FetchMessage::Enriched { context: id, rows })?;
        Ok(())
    });
}
