//! JSON-RPC front end for the instrument layer
//!
//! One request per stdin line, one response per stdout line. Display events
//! produced by the layer are written as `layerEvent` notifications after the
//! response that caused them, or after a clock tick that applied fetch results.
//!
//! # Submodules
//! - `protocol` - JSON-RPC request/response types
//! - `state` - Server state owned by the main loop
//! - `util` - Params parsing and error mapping
//! - `handlers` - Request handlers organized by functionality

pub mod handlers;
pub mod protocol;
pub mod state;
pub mod util;

use serde::Serialize;

use handlers::*;

pub use protocol::{error_codes, ErrorResponse, Notification, Request, Response};
pub use state::ServerState;

/// Serialize one outgoing message. Encoding our own types cannot normally
/// fail; if it does the client still gets a well-formed error line.
pub fn encode<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode outgoing message");
        format!(
            r#"{{"id":null,"error":{{"code":{},"message":"encode failure"}}}}"#,
            error_codes::INTERNAL_ERROR
        )
    })
}

/// Handle one input line. Blank lines produce no output.
pub fn dispatch(state: &mut ServerState, line: &str) -> Option<String> {
    if line.trim().is_empty() {
        return None;
    }

    let request: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse request");
            return Some(encode(&Response::error(
                None,
                error_codes::PARSE_ERROR,
                format!("Parse error: {}", e),
            )));
        }
    };

    tracing::debug!(method = %request.method, "Request");
    let Request { id, method, params } = request;
    let response = match method.as_str() {
        "AddContext" => handle_add_context(state, id, params),
        "UpdateContext" => handle_update_context(state, id, params),
        "ActivateContext" => handle_activate_context(state, id, params),
        "DeactivateContext" => handle_deactivate_context(state, id, params),
        "DeleteContext" => handle_delete_context(state, id, params),
        "ListContexts" => handle_list_contexts(state, id),
        "Select" => handle_select(state, id, params),
        "BoxSelect" => handle_box_select(state, id, params),
        "SetViewport" => handle_set_viewport(state, id, params),
        "RegionsUnderViewport" => handle_regions_under_viewport(state, id, params),
        "RegionsUnderPoint" => handle_regions_under_point(state, id, params),
        "GetRows" => handle_get_rows(state, id, params),
        "GetStatus" => handle_get_status(state, id),
        "Close" => handle_close(state, id),
        _ => Response::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        ),
    };
    Some(encode(&response))
}

/// Encode every queued display event as a notification line
pub fn drain_notifications(state: &ServerState) -> Vec<String> {
    state
        .take_events()
        .into_iter()
        .map(|event| encode(&Notification::new("layerEvent", event)))
        .collect()
}
