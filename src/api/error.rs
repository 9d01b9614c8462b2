use thiserror::Error;

/// Failure of a single market-data or notification request
///
/// Never escapes the gateway: callers see `None` and skip the symbol.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        GatewayError::Malformed(msg.into())
    }
}
