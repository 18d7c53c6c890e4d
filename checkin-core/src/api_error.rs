/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::runtime_error::RuntimeError;
use lambda_http::http::StatusCode;
use thiserror::Error;

/// Failure reported back to the HTTP caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method {0} is not allowed.")]
    MethodNotAllowed(String),
    #[error("Malformed request body: {0}.")]
    MalformedBody(String),
    #[error("Missing required field {0}.")]
    MissingField(&'static str),
    #[error("Invalid value of {0}: \"{1}\".")]
    InvalidField(&'static str, String),
    #[error("Vehicle {0} not found.")]
    VehicleNotFound(String),
    #[error("Unknown endpoint \"{endpoint}\", expected one of: {allowed}.")]
    UnknownEndpoint { endpoint: String, allowed: String },
    #[error("Missing {0}.")]
    MissingCredential(&'static str),
    #[error("Upstream request failed: {0}")]
    UpstreamError(String),
    #[error("{0}")]
    StorageError(String),
    #[error("Failed to serialize response: {0}.")]
    SerializationError(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::InvalidField(..) | Self::UnknownEndpoint { .. } => StatusCode::BAD_REQUEST,
            Self::VehicleNotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody(_)
            | Self::MissingCredential(_)
            | Self::UpstreamError(_)
            | Self::StorageError(_)
            | Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(error: RuntimeError) -> Self {
        Self::StorageError(error.to_string())
    }
}
