// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use reqwest::StatusCode;

/// An error from a gateway round trip.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The request could not be sent or its response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status outside of the 2xx range.
    #[error("{url} responded with {status}")]
    Status {
        /// The status the server answered with.
        status: StatusCode,
        /// The requested URL.
        url: String,
    },

    /// The response body did not have the expected shape.
    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The gateway configuration is unusable.
    #[error("invalid gateway configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns the HTTP status for [`GatewayError::Status`] errors.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
