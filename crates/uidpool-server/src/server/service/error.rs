//! HTTP rendering of [`uidpool::Error`].
//!
//! Every failure is answered with a JSON body `{"error": "<message>"}`.
//!
//! | Error                         | Status                      |
//! |-------------------------------|-----------------------------|
//! | `ServiceShutdown`             | `503 Service Unavailable`   |
//! | `Timeout`                     | `504 Gateway Timeout`       |
//! | everything else               | `500 Internal Server Error` |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uidpool::Error;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An allocation failure on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::ServiceShutdown => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the server log.
        let error = match self.0 {
            Error::ServiceShutdown => "Service is shutting down".to_string(),
            Error::Timeout { .. } => "Timed out waiting for an ID".to_string(),
            Error::PoolDepleted { .. } => "Unique ID pool is depleted".to_string(),
            _ => "Something went wrong with ID generation".to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
