//! Alert handling errors and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Every way an alert can fail, from body parsing to order placement.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("malformed alert body: {0}")]
    MalformedRequest(String),

    #[error("Invalid symbol")]
    InvalidSymbol,

    #[error("Invalid message type")]
    UnsupportedMessageKind(Option<String>),

    #[error("No active trade for symbol")]
    NoActiveTrade(String),

    #[error("No position found")]
    PositionNotFound(String),

    #[error("No entry price found for position")]
    MissingEntryPrice(String),

    #[error(transparent)]
    AdapterFailure(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSymbol | Self::UnsupportedMessageKind(_) | Self::NoActiveTrade(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PositionNotFound(_) => StatusCode::NOT_FOUND,
            Self::MalformedRequest(_) | Self::MissingEntryPrice(_) | Self::AdapterFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Plain-text body: validation failures carry their short message,
    /// internal failures echo the underlying error.
    pub fn body(&self) -> String {
        match self {
            Self::AdapterFailure(e) => format!("Error: {e:#}"),
            other if other.status().is_server_error() => format!("Error: {other}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}
