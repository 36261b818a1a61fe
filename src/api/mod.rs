//! HTTP/JSON API for the hotel application's server actions.
//!
//! Every handler is a thin shell over one engine operation: parse the
//! request, call the engine, map the outcome. Errors always come back as
//! `{ "code": "<KIND>", "message": "…" }`.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::observability::HTTP_REQUESTS_TOTAL;

mod bookings;
mod health;
mod payments;
mod rooms;

pub use bookings::*;
pub use health::*;
pub use payments::*;
pub use rooms::*;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
}

/// Build the API router
pub fn router(engine: Arc<Engine>) -> Router {
    let state = ApiState { engine };

    Router::new()
        .route("/health", get(health_check))
        // Rooms
        .route("/v1/rooms", get(list_rooms).post(create_room))
        .route("/v1/rooms/available", get(search_available_rooms))
        .route(
            "/v1/rooms/:id",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route("/v1/rooms/:id/status", post(set_room_status))
        .route("/v1/rooms/:id/availability", get(room_availability))
        // Bookings
        .route("/v1/bookings", get(list_bookings).post(create_booking))
        .route("/v1/bookings/:id", get(get_booking).patch(update_booking))
        .route("/v1/bookings/:id/cancel", post(cancel_booking))
        .route("/v1/bookings/:id/confirm", post(confirm_booking))
        .route("/v1/bookings/:id/check-in", post(check_in_booking))
        .route("/v1/bookings/:id/check-out", post(check_out_booking))
        .route("/v1/guests/:id/bookings", get(guest_bookings))
        // Payments
        .route("/v1/bookings/:id/balance", get(get_balance))
        .route(
            "/v1/bookings/:id/payments",
            get(list_payments).post(add_payment),
        )
        .route("/v1/payments/:id", get(get_payment))
        .route("/v1/payments/:id/settle", post(settle_payment))
        .route_layer(middleware::from_fn(record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP API listening on {addr}");
    }
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP API stopped");
    Ok(())
}

async fn record_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

// ── Errors ───────────────────────────────────────────────────────

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Upper-snake error kind
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or incomplete request, rejected before reaching the engine.
    Validation(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

/// Convert an engine error to an HTTP status code
pub fn error_to_status_code(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidRange { .. }
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidGuestCount(_)
        | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::RoomUnavailable(_)
        | EngineError::InvalidTransition { .. }
        | EngineError::OverPayment { .. }
        | EngineError::AlreadyExists(_)
        | EngineError::DuplicateRoomNumber(_)
        | EngineError::HasBookings(_)
        | EngineError::CapacityExceeded(_) => StatusCode::CONFLICT,
        EngineError::WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    code: "VALIDATION_ERROR".into(),
                    message,
                },
            ),
            ApiError::Engine(e) if e.is_internal() => {
                error!("storage failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        code: e.kind().into(),
                        message: "internal error".into(),
                    },
                )
            }
            ApiError::Engine(e) => (
                error_to_status_code(&e),
                ErrorResponse {
                    code: e.kind().into(),
                    message: e.to_string(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Parse a path id, rejecting malformed ULIDs as validation errors.
fn parse_id(raw: &str) -> ApiResult<Ulid> {
    Ulid::from_string(raw).map_err(|_| ApiError::Validation(format!("invalid id: {raw}")))
}

#[cfg(test)]
mod tests;
