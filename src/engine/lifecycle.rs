use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::OwnedRwLockWriteGuard;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::{check_no_conflict, now_ms, validate_stay};
use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: Decimal,
}

/// Full replacement of a booking's mutable fields. Every field is required;
/// the guest and the payment list never change through an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingUpdate {
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub status: BookingStatus,
    pub total_price: Decimal,
}

fn validate_terms(guests: u32, total_price: Decimal) -> Result<(), EngineError> {
    if guests == 0 {
        return Err(EngineError::InvalidGuestCount(guests));
    }
    if total_price < Decimal::ZERO {
        return Err(EngineError::InvalidAmount(total_price));
    }
    Ok(())
}

impl Engine {
    /// Place a new PENDING booking. The overlap check, WAL append and apply
    /// all happen under the room's write lock, so two racing requests for the
    /// same nights cannot both get through.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, EngineError> {
        let stay = validate_stay(req.check_in, req.check_out)?;
        validate_terms(req.guests, req.total_price)?;

        let _gate = self.compaction_gate.read().await;
        if self.store.room_for_booking(&req.id).is_some() {
            return Err(EngineError::AlreadyExists(req.id));
        }
        let mut guard = self.lock_room(&req.room_id).await?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }
        if req.guests > guard.room.capacity {
            return Err(EngineError::CapacityExceeded(guard.room.capacity));
        }
        check_no_conflict(&guard, &stay, None)?;
        // Racing creates with this id may hold other rooms' locks.
        if !self.store.reserve_booking_id(req.id, req.room_id) {
            return Err(EngineError::AlreadyExists(req.id));
        }

        let event = Event::BookingCreated {
            id: req.id,
            room_id: req.room_id,
            guest_id: req.guest_id,
            stay,
            guests: req.guests,
            total_price: req.total_price,
            created_at: now_ms(),
        };
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            self.store.release_booking_id(&req.id, &req.room_id);
            return Err(e);
        }
        info!(booking = %req.id, room = %req.room_id, %stay, "booking created");
        guard
            .booking(&req.id)
            .cloned()
            .ok_or(EngineError::NotFound(req.id))
    }

    /// Replace room, dates, guest count, status and price in one step.
    /// A changed room or date range is re-checked for overlap (ignoring the
    /// booking itself) when the resulting status still holds the room.
    pub async fn update_booking(&self, id: Ulid, upd: BookingUpdate) -> Result<Booking, EngineError> {
        let stay = validate_stay(upd.check_in, upd.check_out)?;
        validate_terms(upd.guests, upd.total_price)?;

        let _gate = self.compaction_gate.read().await;
        for _ in 0..4 {
            let from_id = self
                .store
                .room_for_booking(&id)
                .ok_or(EngineError::NotFound(id))?;

            if from_id == upd.room_id {
                let mut guard = self.lock_room(&from_id).await?;
                if guard.booking(&id).is_none() {
                    continue;
                }
                return self.update_in_place(&mut guard, id, &upd, stay).await;
            }

            // Two rooms: always lock the lower id first.
            let (mut from, mut to) = if from_id < upd.room_id {
                let from = self.lock_room(&from_id).await?;
                let to = self.lock_room(&upd.room_id).await?;
                (from, to)
            } else {
                let to = self.lock_room(&upd.room_id).await?;
                let from = self.lock_room(&from_id).await?;
                (from, to)
            };
            if from.booking(&id).is_none() {
                continue;
            }
            return self.move_booking(&mut from, &mut to, id, &upd, stay).await;
        }
        Err(EngineError::NotFound(id))
    }

    async fn update_in_place(
        &self,
        guard: &mut OwnedRwLockWriteGuard<RoomState>,
        id: Ulid,
        upd: &BookingUpdate,
        stay: StayRange,
    ) -> Result<Booking, EngineError> {
        let current = guard.booking(&id).ok_or(EngineError::NotFound(id))?;
        let status = current.status.transition(upd.status)?;
        if upd.guests != current.guests && upd.guests > guard.room.capacity {
            return Err(EngineError::CapacityExceeded(guard.room.capacity));
        }
        if current.stay != stay && status.is_blocking() {
            check_no_conflict(guard, &stay, Some(id))?;
        }

        let event = Event::BookingUpdated {
            id,
            from_room_id: guard.id(),
            room_id: guard.id(),
            stay,
            guests: upd.guests,
            total_price: upd.total_price,
            status,
        };
        self.persist_and_apply(guard, &event).await?;
        debug!(booking = %id, %stay, %status, "booking updated");
        guard.booking(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    async fn move_booking(
        &self,
        from: &mut OwnedRwLockWriteGuard<RoomState>,
        to: &mut OwnedRwLockWriteGuard<RoomState>,
        id: Ulid,
        upd: &BookingUpdate,
        stay: StayRange,
    ) -> Result<Booking, EngineError> {
        let current = from.booking(&id).ok_or(EngineError::NotFound(id))?;
        let status = current.status.transition(upd.status)?;
        if upd.guests > to.room.capacity {
            return Err(EngineError::CapacityExceeded(to.room.capacity));
        }
        if to.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }
        if status.is_blocking() {
            check_no_conflict(to, &stay, Some(id))?;
        }

        let event = Event::BookingUpdated {
            id,
            from_room_id: from.id(),
            room_id: to.id(),
            stay,
            guests: upd.guests,
            total_price: upd.total_price,
            status,
        };
        self.wal_append(&event).await?;
        self.store.apply_move(from, to, &event);
        self.publish(to, &event);
        info!(booking = %id, from = %from.id(), to = %to.id(), "booking moved");
        to.booking(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Move a booking to `target` along the transition table. Asking for the
    /// status it already has is a no-op that returns the booking unchanged.
    pub async fn set_booking_status(
        &self,
        id: Ulid,
        target: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let mut guard = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(&id).ok_or(EngineError::NotFound(id))?;
        if booking.status == target {
            return Ok(booking.clone());
        }
        let from = booking.status;
        from.transition(target)?;

        let event = Event::BookingStatusChanged {
            id,
            room_id: guard.id(),
            status: target,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, %from, to = %target, "booking status changed");
        guard.booking(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_booking_status(id, BookingStatus::Confirmed).await
    }

    /// Frees the nights for new bookings. Refused once the guest has checked in.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_booking_status(id, BookingStatus::Cancelled).await
    }

    pub async fn check_in(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_booking_status(id, BookingStatus::CheckedIn).await
    }

    pub async fn check_out(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_booking_status(id, BookingStatus::CheckedOut).await
    }
}
