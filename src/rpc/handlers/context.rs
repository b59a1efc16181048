//! Context handlers: AddContext, UpdateContext, ActivateContext,
//! DeactivateContext, DeleteContext, ListContexts

use serde::{Deserialize, Serialize};

use crate::layer::{Context, ContextDef, ContextId, ContextState, ContextUpdate};
use crate::rpc::protocol::Response;
use crate::rpc::state::ServerState;
use crate::rpc::util::{layer_error, parse_params};

#[derive(Deserialize)]
struct ContextParams {
    context: ContextId,
}

/// Handle AddContext request - registers a new context (not activated)
pub fn handle_add_context(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let def: ContextDef = match parse_params(id.clone(), params, "{name, select, orderBy, ...}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    let context = state.view.add_context(def);
    Response::success(id, serde_json::json!({ "context": context }))
}

/// Handle UpdateContext request - applies a partial edit
pub fn handle_update_context(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct Params {
        context: ContextId,
        #[serde(flatten)]
        update: ContextUpdate,
    }

    let p: Params = match parse_params(id.clone(), params, "{context, ...fields}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    match state.view.update_context(p.context, p.update) {
        Ok(changed) => Response::success(id, serde_json::json!({ "changed": changed })),
        Err(e) => layer_error(id, &e),
    }
}

/// Handle ActivateContext request
pub fn handle_activate_context(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: ContextParams = match parse_params(id.clone(), params, "{context}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    match state.view.activate(p.context) {
        Ok(()) => Response::success(id, serde_json::json!({ "status": "ok" })),
        Err(e) => layer_error(id, &e),
    }
}

/// Handle DeactivateContext request
pub fn handle_deactivate_context(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: ContextParams = match parse_params(id.clone(), params, "{context}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    match state.view.deactivate(p.context) {
        Ok(()) => Response::success(id, serde_json::json!({ "status": "ok" })),
        Err(e) => layer_error(id, &e),
    }
}

/// Handle DeleteContext request - deactivates first when active
pub fn handle_delete_context(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    let p: ContextParams = match parse_params(id.clone(), params, "{context}") {
        Ok(p) => p,
        Err(e) => return e,
    };
    match state.view.delete_context(p.context) {
        Ok(context) => Response::typed(id, &context),
        Err(e) => layer_error(id, &e),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextSummary<'a> {
    #[serde(flatten)]
    context: &'a Context,
    state: Option<ContextState>,
    active: bool,
    rows: usize,
}

/// Handle ListContexts request
pub fn handle_list_contexts(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    let active = state.view.active_context().map(|c| c.id);
    let summaries: Vec<ContextSummary> = state
        .view
        .contexts()
        .map(|context| ContextSummary {
            context,
            state: state.view.context_state(context.id),
            active: active == Some(context.id),
            rows: state.view.panel(context.id).map_or(0, |p| p.row_count()),
        })
        .collect();
    Response::typed(id, &summaries)
}
