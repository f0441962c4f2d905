//! Error types for the archboard client.
//!
//! # Design
//! Token exchange failures of any kind (bad status, unreachable server,
//! missing `access_token`) collapse into `Authentication`, since the caller's
//! remedy is the same. Send-phase failures keep the raw status and body in
//! `HttpError`, or the transport's message in `Transport`.

use thiserror::Error;

use crate::http::TransportError;

/// Errors returned by `RequestBuilder` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client-credentials exchange did not produce a token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The server answered a resource request with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The resource request never completed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be read as a JSON object.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors raised while loading `ClientConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
}
