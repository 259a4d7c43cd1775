use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireErrorKind {
    NotAllowed,
    NotFound,
    Other,
}

/// Failure reported by a platform acquisition attempt.
#[derive(Debug, Clone, Error)]
#[error("{description}")]
pub struct AcquireError {
    pub kind: AcquireErrorKind,
    pub description: String,
}

impl AcquireError {
    pub fn new(kind: AcquireErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn not_allowed(description: impl Into<String>) -> Self {
        Self::new(AcquireErrorKind::NotAllowed, description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(AcquireErrorKind::NotFound, description)
    }

    pub fn other(description: impl Into<String>) -> Self {
        Self::new(AcquireErrorKind::Other, description)
    }
}

/// Reasons the gate reports through a denied outcome. `Display` is the
/// message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Camera access is not supported in this environment.")]
    UnsupportedEnvironment,
    #[error("Camera permission was denied. Please allow camera access and try again.")]
    AuthorizationRefused,
    #[error("No camera found. Please connect a camera and try again.")]
    DeviceUnavailable,
    #[error("Failed to access camera: {0}")]
    UnknownAcquisitionFailure(String),
}

impl AccessError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnsupportedEnvironment)
    }
}

impl From<AcquireError> for AccessError {
    fn from(value: AcquireError) -> Self {
        match value.kind {
            AcquireErrorKind::NotAllowed => Self::AuthorizationRefused,
            AcquireErrorKind::NotFound => Self::DeviceUnavailable,
            AcquireErrorKind::Other => Self::UnknownAcquisitionFailure(value.description),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(format!("{value:#}"))
    }
}

impl From<AccessError> for AppError {
    fn from(value: AccessError) -> Self {
        let status = if value.is_recoverable() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::CONFLICT
        };
        Self::new(status, value.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
