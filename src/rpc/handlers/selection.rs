//! Selection handlers: Select, BoxSelect
//!
//! Both start a background fetch for the active context and return at once.
//! Results arrive later as `layerEvent` notifications.

use serde::Deserialize;

use crate::rpc::protocol::Response;
use crate::rpc::state::ServerState;
use crate::rpc::util::{layer_error, parse_params};

/// Handle Select request - fetch records under a screen pixel
pub fn handle_select(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        x: f64,
        y: f64,
        #[serde(default)]
        toggle: bool,
    }

    let p: Params = match parse_params(id.clone(), params, "{x, y, toggle?}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state.view.select_at_screen(p.x, p.y, p.toggle) {
        Ok(()) => Response::success(id, serde_json::json!({ "accepted": true })),
        Err(e) => layer_error(id, &e),
    }
}

/// Handle BoxSelect request - fetch records inside a screen rectangle
pub fn handle_box_select(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        #[serde(default)]
        toggle: bool,
    }

    let p: Params = match parse_params(id.clone(), params, "{min_x, min_y, max_x, max_y, toggle?}") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match state
        .view
        .box_select_screen((p.min_x, p.min_y), (p.max_x, p.max_y), p.toggle)
    {
        Ok(()) => Response::success(id, serde_json::json!({ "accepted": true })),
        Err(e) => layer_error(id, &e),
    }
}
