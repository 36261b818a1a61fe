//! Room catalog and availability search

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::{parse_id, ApiResult, ApiState};
use crate::engine::{AvailabilityQuery, NewRoom, RoomUpdate};
use crate::model::{Room, RoomStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: Ulid,
    pub number: String,
    pub room_type: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub capacity: u32,
    pub status: RoomStatus,
    pub amenities: Vec<String>,
    pub description: Option<String>,
}

impl From<Room> for RoomResponse {
    fn from(r: Room) -> Self {
        Self {
            id: r.id,
            number: r.number,
            room_type: r.room_type,
            price: r.price,
            capacity: r.capacity,
            status: r.status,
            amenities: r.amenities,
            description: r.description,
        }
    }
}

/// Body of `POST /v1/rooms` and `PUT /v1/rooms/:id`. The id is generated
/// when omitted on create and ignored on update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    #[serde(default)]
    pub id: Option<Ulid>,
    pub number: String,
    pub room_type: String,
    pub price: Decimal,
    pub capacity: u32,
    #[serde(default)]
    pub status: Option<RoomStatus>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: RoomStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(alias = "check_in")]
    pub check_in: NaiveDate,
    #[serde(alias = "check_out")]
    pub check_out: NaiveDate,
    #[serde(default, alias = "min_capacity")]
    pub min_capacity: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayParams {
    #[serde(alias = "check_in")]
    pub check_in: NaiveDate,
    #[serde(alias = "check_out")]
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAvailabilityResponse {
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub available: bool,
}

pub async fn list_rooms(State(state): State<ApiState>) -> Json<Vec<RoomResponse>> {
    let rooms = state.engine.list_rooms().await;
    Json(rooms.into_iter().map(RoomResponse::from).collect())
}

pub async fn create_room(
    State(state): State<ApiState>,
    body: Result<Json<RoomRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RoomResponse>)> {
    let Json(req) = body?;
    let room = state
        .engine
        .create_room(NewRoom {
            id: req.id.unwrap_or_else(Ulid::new),
            number: req.number,
            room_type: req.room_type,
            price: req.price,
            capacity: req.capacity,
            status: req.status.unwrap_or(RoomStatus::Available),
            amenities: req.amenities,
            description: req.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

pub async fn get_room(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoomResponse>> {
    let room = state.engine.get_room(parse_id(&id)?).await?;
    Ok(Json(room.into()))
}

pub async fn update_room(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<RoomRequest>, JsonRejection>,
) -> ApiResult<Json<RoomResponse>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let room = state
        .engine
        .update_room(
            id,
            RoomUpdate {
                number: req.number,
                room_type: req.room_type,
                price: req.price,
                capacity: req.capacity,
                status: req.status.unwrap_or(RoomStatus::Available),
                amenities: req.amenities,
                description: req.description,
            },
        )
        .await?;
    Ok(Json(room.into()))
}

pub async fn set_room_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<RoomResponse>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let room = state.engine.set_room_status(id, req.status).await?;
    Ok(Json(room.into()))
}

pub async fn delete_room(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.delete_room(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_available_rooms(
    State(state): State<ApiState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Vec<RoomResponse>>> {
    let Query(params) = params?;
    let rooms = state
        .engine
        .find_available_rooms(&AvailabilityQuery {
            check_in: params.check_in,
            check_out: params.check_out,
            min_capacity: params.min_capacity,
        })
        .await?;
    Ok(Json(rooms.into_iter().map(RoomResponse::from).collect()))
}

pub async fn room_availability(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    params: Result<Query<StayParams>, QueryRejection>,
) -> ApiResult<Json<RoomAvailabilityResponse>> {
    let room_id = parse_id(&id)?;
    let Query(params) = params?;
    let available = state
        .engine
        .is_room_available(room_id, params.check_in, params.check_out)
        .await?;
    Ok(Json(RoomAvailabilityResponse {
        room_id,
        check_in: params.check_in,
        check_out: params.check_out,
        available,
    }))
}
