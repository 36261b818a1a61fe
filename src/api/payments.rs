//! Payment and balance endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::{parse_id, ApiResult, ApiState};
use crate::engine::NewPayment;
use crate::model::{Balance, Payment, PaymentMethod, PaymentStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Ulid,
    pub booking_id: Ulid,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: i64,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            amount: p.amount,
            method: p.method,
            status: p.status,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub booking_id: Ulid,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_paid: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_refunded: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub remaining: Decimal,
}

impl BalanceResponse {
    fn new(booking_id: Ulid, b: Balance) -> Self {
        Self {
            booking_id,
            total_price: b.total_price,
            total_paid: b.total_paid,
            total_refunded: b.total_refunded,
            remaining: b.remaining,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentRequest {
    #[serde(default)]
    pub id: Option<Ulid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub status: PaymentStatus,
}

pub async fn list_payments(
    State(state): State<ApiState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    let payments = state
        .engine
        .payments_for_booking(parse_id(&booking_id)?)
        .await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

pub async fn add_payment(
    State(state): State<ApiState>,
    Path(booking_id): Path<String>,
    body: Result<Json<AddPaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    let booking_id = parse_id(&booking_id)?;
    let Json(req) = body?;
    let payment = state
        .engine
        .add_payment(NewPayment {
            id: req.id.unwrap_or_else(Ulid::new),
            booking_id,
            amount: req.amount,
            method: req.method,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

pub async fn get_payment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentResponse>> {
    let payment = state.engine.get_payment(parse_id(&id)?).await?;
    Ok(Json(payment.into()))
}

pub async fn settle_payment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentResponse>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let payment = state.engine.settle_payment(id, req.status).await?;
    Ok(Json(payment.into()))
}

pub async fn get_balance(
    State(state): State<ApiState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let booking_id = parse_id(&booking_id)?;
    let balance = state.engine.booking_balance(booking_id).await?;
    Ok(Json(BalanceResponse::new(booking_id, balance)))
}
