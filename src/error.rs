use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unauthorized")]
    Auth,

    #[error("bad SDP offer: {0}")]
    BadOffer(String),

    #[error("capturer init: {0}")]
    CaptureInit(String),

    #[error("encoder init: {0}")]
    EncoderInit(String),

    #[error("track init: {0}")]
    TrackInit(String),

    #[error("frame grab: {0}")]
    CaptureGrab(String),

    #[error("encode: {0}")]
    Encode(String),

    #[error("ICE gathering timed out")]
    IceGatherTimeout,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("audio init: {0}")]
    Audio(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::BadOffer(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CaptureInit(_)
            | AppError::EncoderInit(_)
            | AppError::TrackInit(_)
            | AppError::CaptureGrab(_)
            | AppError::Encode(_)
            | AppError::IceGatherTimeout
            | AppError::Audio(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
