//! Booking endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::payments::PaymentResponse;
use super::{parse_id, ApiError, ApiResult, ApiState};
use crate::engine::{BookingUpdate, NewBooking};
use crate::model::{Booking, BookingStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub guests: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: i64,
    pub payments: Vec<PaymentResponse>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            room_id: b.room_id,
            guest_id: b.guest_id,
            check_in: b.stay.check_in,
            check_out: b.stay.check_out,
            nights: b.stay.nights(),
            guests: b.guests,
            total_price: b.total_price,
            status: b.status,
            created_at: b.created_at,
            payments: b.payments.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

fn booking_list(bookings: Vec<Booking>) -> Json<Vec<BookingResponse>> {
    Json(bookings.into_iter().map(BookingResponse::from).collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub id: Option<Ulid>,
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: Decimal,
}

/// `PATCH /v1/bookings/:id` body. Every field is required; they are
/// optional here only so a missing one can be named in the 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub room_id: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub guests: Option<u32>,
    pub status: Option<String>,
    pub total_price: Option<Decimal>,
}

impl UpdateBookingRequest {
    /// Check completeness and well-formedness before the engine sees it.
    pub fn into_update(self) -> ApiResult<BookingUpdate> {
        let mut missing = Vec::new();
        if self.room_id.is_none() {
            missing.push("roomId");
        }
        if self.check_in.is_none() {
            missing.push("checkIn");
        }
        if self.check_out.is_none() {
            missing.push("checkOut");
        }
        if self.guests.is_none() {
            missing.push("guests");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        if self.total_price.is_none() {
            missing.push("totalPrice");
        }
        let (
            Some(room_id),
            Some(check_in),
            Some(check_out),
            Some(guests),
            Some(status),
            Some(total_price),
        ) = (
            self.room_id,
            self.check_in,
            self.check_out,
            self.guests,
            self.status,
            self.total_price,
        )
        else {
            return Err(ApiError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        };

        let room_id = Ulid::from_string(&room_id)
            .map_err(|_| ApiError::Validation(format!("invalid roomId: {room_id}")))?;
        let date = |field: &str, raw: &str| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::Validation(format!("invalid {field}: {raw}")))
        };
        let check_in = date("checkIn", &check_in)?;
        let check_out = date("checkOut", &check_out)?;
        let status: BookingStatus = status
            .parse()
            .map_err(|e: crate::model::UnknownVariant| ApiError::Validation(e.to_string()))?;

        Ok(BookingUpdate {
            room_id,
            check_in,
            check_out,
            guests,
            status,
            total_price,
        })
    }
}

pub async fn list_bookings(State(state): State<ApiState>) -> Json<Vec<BookingResponse>> {
    booking_list(state.engine.list_bookings().await)
}

pub async fn create_booking(
    State(state): State<ApiState>,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    let Json(req) = body?;
    let booking = state
        .engine
        .create_booking(NewBooking {
            id: req.id.unwrap_or_else(Ulid::new),
            room_id: req.room_id,
            guest_id: req.guest_id,
            check_in: req.check_in,
            check_out: req.check_out,
            guests: req.guests,
            total_price: req.total_price,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.get_booking(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

pub async fn update_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateBookingRequest>, JsonRejection>,
) -> ApiResult<Json<BookingResponse>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let update = req.into_update()?;
    let booking = state.engine.update_booking(id, update).await?;
    Ok(Json(booking.into()))
}

pub async fn cancel_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.cancel_booking(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

pub async fn confirm_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.confirm_booking(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

pub async fn check_in_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.check_in(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

pub async fn check_out_booking(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.check_out(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

pub async fn guest_bookings(
    State(state): State<ApiState>,
    Path(guest_id): Path<String>,
) -> ApiResult<Json<Vec<BookingResponse>>> {
    let bookings = state.engine.bookings_for_guest(parse_id(&guest_id)?).await;
    Ok(booking_list(bookings))
}
