use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::is_range_blocked;
use super::{Engine, EngineError};

// ── Availability search ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub min_capacity: Option<u32>,
}

/// Whether a room can take a new booking for `stay`: it is in service, big
/// enough, and no blocking booking shares a night with the stay.
pub fn room_is_available(rs: &RoomState, stay: &StayRange, min_capacity: Option<u32>) -> bool {
    rs.room.status.accepts_bookings()
        && min_capacity.is_none_or(|n| rs.room.capacity >= n)
        && !is_range_blocked(
            rs.id(),
            stay,
            rs.overlapping(stay),
            &BookingStatus::BLOCKING,
            None,
        )
}

impl Engine {
    /// Rooms free for the whole window, ordered by room number.
    pub async fn find_available_rooms(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Vec<Room>, EngineError> {
        let stay = StayRange::checked(query.check_in, query.check_out).ok_or(
            EngineError::InvalidRange {
                check_in: query.check_in,
                check_out: query.check_out,
            },
        )?;
        if stay.nights() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }

        let mut rooms = Vec::new();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            if room_is_available(&guard, &stay, query.min_capacity) {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.number.cmp(&b.number).then(a.id.cmp(&b.id)));
        Ok(rooms)
    }

    /// Per-room check used before quoting a single room.
    pub async fn is_room_available(
        &self,
        room_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, EngineError> {
        let stay = StayRange::checked(check_in, check_out)
            .ok_or(EngineError::InvalidRange { check_in, check_out })?;
        let rs = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        Ok(room_is_available(&guard, &stay, None))
    }
}
