//! HTTP front end for the ID pool.
//!
//! Defines [`IdService`], the state shared by every request handler, and the
//! [`router`](IdService::router) exposing it:
//!
//! - `POST /uid` - allocate one identifier. `201 Created` with
//!   `{"value": <u64>}`.
//! - any other method on `/uid` - `405 Method Not Allowed`.
//! - `GET /health` - `200` while serving, `503` once shutdown began.

use crate::server::{
    config::ServerConfig,
    service::error::{ApiError, ErrorBody},
    telemetry::{
        decrement_requests_inflight, increment_allocation_errors, increment_ids_issued,
        increment_requests, increment_requests_inflight, record_request_duration,
    },
};
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uidpool::{Allocator, Dispatcher, DispatcherOptions, FileStore};

/// Path identifiers are allocated on.
pub const UID_PATH: &str = "/uid";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Body of a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdResponse {
    pub value: u64,
}

/// Shared state behind every request: a handle to the allocation worker.
///
/// Cloning is cheap; all clones talk to the same worker.
#[derive(Clone)]
pub struct IdService {
    dispatcher: Dispatcher,
}

impl IdService {
    /// Opens the state file, resumes the pool and starts its worker.
    ///
    /// # Errors
    ///
    /// Fails if the state file cannot be prepared or read, or is corrupted.
    /// The server must not start in that case.
    pub fn new(config: &ServerConfig) -> uidpool::Result<Self> {
        let store = FileStore::new(&config.state_file).with_sync(config.sync);
        let allocator = Allocator::new(store)?;
        let options = DispatcherOptions {
            request_timeout: config.request_timeout,
        };
        Ok(Self::from_dispatcher(Dispatcher::spawn(allocator, options)?))
    }

    pub const fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route(UID_PATH, post(allocate_id).fallback(method_not_allowed))
            .route(HEALTH_PATH, get(health))
            .with_state(self)
    }

    /// Refuses new allocations, then stops the worker once the requests
    /// already admitted have been answered.
    pub async fn shutdown(&self, ack_timeout: Duration) -> uidpool::Result<()> {
        self.dispatcher.shutdown(ack_timeout).await
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }
}

/// Decrements the in-flight gauge even when the client disconnects and the
/// handler future is dropped.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        increment_requests_inflight();
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        decrement_requests_inflight();
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn allocate_id(State(service): State<IdService>) -> Result<Response, ApiError> {
    let start = Instant::now();
    increment_requests();
    let _inflight = InflightGuard::new();

    let result = service.dispatcher.allocate().await;
    record_request_duration(start.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(id) => {
            increment_ids_issued();
            tracing::debug!("ID sent to requester: {id}");
            Ok((StatusCode::CREATED, Json(IdResponse { value: id.get() })).into_response())
        }
        Err(e) => {
            increment_allocation_errors();
            tracing::error!("Error returned to requester: {e}");
            Err(e.into())
        }
    }
}

async fn method_not_allowed(method: Method) -> Response {
    tracing::warn!("Received non-POST request ({method})");
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(ErrorBody {
            error: "POST requests only, please.".to_string(),
        }),
    )
        .into_response()
}

async fn health(State(service): State<IdService>) -> StatusCode {
    if service.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
