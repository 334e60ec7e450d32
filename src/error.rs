use thiserror::Error;

/// Application-wide error type
///
/// Every component boundary converts its internal failures into one of
/// these variants; the RPC dispatcher (`rpc::dispatcher`) is the single
/// place that maps a variant to a numbered JSON-RPC error code (see
/// `rpc_codes` and `AppError::rpc_code`).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("camera already recording: {0}")]
    AlreadyRecording(String),

    #[error("storage low")]
    StorageLow,

    #[error("storage critical")]
    StorageCritical,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("media server error: {0}")]
    MediaServer(String),

    #[error("media server returned {status}: {body}")]
    MediaServerStatus { status: u16, body: String },

    #[error("device error: {0}")]
    Device(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Numbered JSON-RPC error codes, the authoritative table from spec §6
pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const AUTH_REQUIRED: i64 = -32001;
    pub const RATE_LIMITED: i64 = -32002;
    pub const FORBIDDEN: i64 = -32003;
    pub const ALREADY_RECORDING: i64 = -1006;
    pub const STORAGE_LOW: i64 = -1008;
    pub const STORAGE_CRITICAL: i64 = -1010;
}

impl AppError {
    /// Map this error to its JSON-RPC error code
    pub fn rpc_code(&self) -> i64 {
        use rpc_codes::*;
        match self {
            AppError::Unauthorized | AppError::InvalidToken(_) => AUTH_REQUIRED,
            AppError::RateLimited => RATE_LIMITED,
            AppError::Forbidden(_) => FORBIDDEN,
            AppError::AlreadyRecording(_) => ALREADY_RECORDING,
            AppError::StorageLow => STORAGE_LOW,
            AppError::StorageCritical => STORAGE_CRITICAL,
            AppError::BadRequest(_) => INVALID_PARAMS,
            AppError::NotFound(_) => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_documented_codes() {
        assert_eq!(AppError::Unauthorized.rpc_code(), rpc_codes::AUTH_REQUIRED);
        assert_eq!(AppError::RateLimited.rpc_code(), rpc_codes::RATE_LIMITED);
        assert_eq!(
            AppError::Forbidden("x".into()).rpc_code(),
            rpc_codes::FORBIDDEN
        );
        assert_eq!(
            AppError::AlreadyRecording("/dev/video0".into()).rpc_code(),
            rpc_codes::ALREADY_RECORDING
        );
        assert_eq!(AppError::StorageLow.rpc_code(), rpc_codes::STORAGE_LOW);
        assert_eq!(
            AppError::StorageCritical.rpc_code(),
            rpc_codes::STORAGE_CRITICAL
        );
        assert_eq!(
            AppError::Internal("boom".into()).rpc_code(),
            rpc_codes::INTERNAL_ERROR
        );
    }
}
