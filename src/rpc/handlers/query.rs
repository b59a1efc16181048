//! Query handlers: SetViewport, RegionsUnderViewport, RegionsUnderPoint,
//! GetRows, GetStatus, Close

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::layer::{ContextId, FetchRecord};
use crate::regions::RegionId;
use crate::rpc::protocol::{error_codes, Response};
use crate::rpc::state::ServerState;
use crate::rpc::util::parse_params;
use crate::source::RecordKey;

#[derive(Deserialize)]
struct RectParams {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl RectParams {
    fn to_rect(&self) -> Rect {
        Rect::from_corners(Point::new(self.min_x, self.min_y), Point::new(self.max_x, self.max_y))
    }
}

#[derive(Serialize)]
struct RegionSummary {
    id: RegionId,
    lon_bin: u16,
    lat_bin: u16,
}

fn summarize(ids: impl IntoIterator<Item = RegionId>) -> Vec<RegionSummary> {
    ids.into_iter()
        .map(|id| RegionSummary {
            id,
            lon_bin: id.lon_bin(),
            lat_bin: id.lat_bin(),
        })
        .collect()
}

/// Handle SetViewport request - world-space viewport; redraws the active context
pub fn handle_set_viewport(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: RectParams = match parse_params(id.clone(), params, "{min_x, min_y, max_x, max_y}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    state.view.set_viewport(p.to_rect());
    Response::success(id, serde_json::json!({ "status": "ok" }))
}

/// Handle RegionsUnderViewport request - defaults to the current viewport
pub fn handle_regions_under_viewport(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let rect = match params {
        None | Some(serde_json::Value::Null) => state.view.viewport(),
        Some(value) => match parse_params::<RectParams>(id.clone(), Some(value), "{min_x, min_y, max_x, max_y}") {
            Ok(p) => p.to_rect(),
            Err(e) => return e,
        },
    };
    Response::typed(id, &summarize(state.view.regions_under_viewport(&rect)))
}

/// Handle RegionsUnderPoint request - world point
pub fn handle_regions_under_point(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        x: f64,
        y: f64,
    }

    let p: Params = match parse_params(id.clone(), params, "{x, y}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    Response::typed(id, &summarize(state.view.regions_under_point(Point::new(p.x, p.y))))
}

/// Handle GetRows request - rows and selection of a context's panel
pub fn handle_get_rows(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        context: ContextId,
    }

    #[derive(Serialize)]
    struct Rows<'a> {
        rows: Vec<&'a FetchRecord>,
        selected: Vec<&'a RecordKey>,
    }

    let p: Params = match parse_params(id.clone(), params, "{context}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    let Some(panel) = state.view.panel(p.context) else {
        return Response::error(
            id,
            error_codes::UNKNOWN_CONTEXT,
            format!("unknown context {}", p.context),
        );
    };
    Response::typed(
        id,
        &Rows {
            rows: panel.rows().collect(),
            selected: panel.selected().collect(),
        },
    )
}

/// Handle GetStatus request
pub fn handle_get_status(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    let buffers = state.view.buffers();
    Response::success(
        id,
        serde_json::json!({
            "fetching": state.view.is_fetching(),
            "active": state.view.active_context().map(|c| c.id),
            "title": buffers.dialog().title(),
            "viewport": buffers.viewport(),
            "regions": state.layer.grid().len(),
            "pendingTasks": state.layer.queue().pending_count(),
        }),
    )
}

/// Handle Close request - ends the main loop after responding
pub fn handle_close(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    state.closed = true;
    Response::success(id, serde_json::json!({ "status": "ok" }))
}
