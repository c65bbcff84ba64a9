//! Translation of service errors into HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lightboard_common::api::{MessageResponse, ValidationErrors};
use thiserror::Error;
use tracing::error;

use crate::catalog::CatalogError;
use crate::effects::EffectError;
use crate::lifx::transport::TransportError;
use crate::registry::RegistryError;
use crate::services::audio::AudioError;

/// An error leaving an HTTP handler. Internals are never leaked to the
/// client.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Invalid input; carries the machine-readable error list.
    #[error("validation failed")]
    Validation(Vec<String>),

    /// The request is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The referenced object does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A downstream dependency is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ResponseError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ValidationErrors::new(errors))).into_response()
            }
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrors::new(vec![message])),
            )
                .into_response(),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(MessageResponse::new(format!("{what} not found"))),
            )
                .into_response(),
            Self::ServiceUnavailable(message) => {
                error!("Service unavailable: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(MessageResponse::new("Service unavailable")),
                )
                    .into_response()
            }
            Self::InternalError(message) => {
                error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MessageResponse::new("Internal error")),
                )
                    .into_response()
            }
        }
    }
}

impl From<CatalogError> for ResponseError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => Self::not_found("record"),
        }
    }
}

impl From<RegistryError> for ResponseError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => Self::not_found("device"),
        }
    }
}

impl From<EffectError> for ResponseError {
    fn from(err: EffectError) -> Self {
        match err {
            EffectError::InvalidScript(errors) => Self::Validation(errors),
            EffectError::NoTargets => {
                Self::bad_request("no adopted online devices match the requested targets")
            }
            EffectError::NothingToPlay => {
                Self::bad_request("scene has neither a script nor a configuration")
            }
        }
    }
}

impl From<AudioError> for ResponseError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::BlobMissing(name) => Self::not_found(format!("audio `{name}`")),
            AudioError::InvalidName(name) => Self::bad_request(format!("invalid name `{name}`")),
            AudioError::BlobWrite(err) => Self::internal_error(err.to_string()),
        }
    }
}

impl From<TransportError> for ResponseError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::TransportDown => {
                Self::ServiceUnavailable("lifx transport is down".to_string())
            }
            TransportError::RateLimited(mac) => {
                Self::ServiceUnavailable(format!("sends to {mac} are rate limited"))
            }
            err => Self::InternalError(err.to_string()),
        }
    }
}
