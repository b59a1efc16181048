//! Helpers shared by the request handlers

use serde::de::DeserializeOwned;

use super::protocol::{error_codes, Response};
use crate::error::LayerError;

/// Deserialize request params, or build the INVALID_PARAMS response.
/// Missing params are treated as an empty object.
pub fn parse_params<T: DeserializeOwned>(
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    expected: &str,
) -> Result<T, Response> {
    let value = params.unwrap_or_else(|| serde_json::json!({}));
    serde_json::from_value(value).map_err(|e| {
        Response::error(
            id,
            error_codes::INVALID_PARAMS,
            format!("Invalid params: expected {} ({})", expected, e),
        )
    })
}

/// Map a layer error onto a JSON-RPC error code
pub fn layer_error(id: Option<serde_json::Value>, err: &LayerError) -> Response {
    let code = match err {
        LayerError::RejectedFetch => error_codes::FETCH_REJECTED,
        LayerError::UnknownContext(_) => error_codes::UNKNOWN_CONTEXT,
        LayerError::NoActiveContext => error_codes::NO_ACTIVE_CONTEXT,
        LayerError::MalformedGeometry(_) | LayerError::DataAccess(_) => error_codes::FETCH_FAILED,
        LayerError::Spawn(_) => error_codes::INTERNAL_ERROR,
    };
    Response::error(id, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Params {
        x: f64,
        #[serde(default)]
        toggle: bool,
    }

    #[test]
    fn parses_or_reports_expected_shape() {
        let ok: Params = parse_params(None, Some(serde_json::json!({"x": 1.5})), "{x}").unwrap();
        assert_eq!(ok.x, 1.5);
        assert!(!ok.toggle);

        let err = parse_params::<Params>(None, None, "{x}").unwrap_err();
        let error = err.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert!(error.message.contains("{x}"));
    }

    #[test]
    fn rejected_fetch_maps_to_custom_code() {
        let response = layer_error(None, &LayerError::RejectedFetch);
        assert_eq!(response.error.unwrap().code, error_codes::FETCH_REJECTED);
    }
}
