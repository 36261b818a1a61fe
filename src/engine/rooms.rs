use rust_decimal::Decimal;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub id: Ulid,
    pub number: String,
    pub room_type: String,
    pub price: Decimal,
    pub capacity: u32,
    pub status: RoomStatus,
    pub amenities: Vec<String>,
    pub description: Option<String>,
}

/// Full replacement of a room's descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpdate {
    pub number: String,
    pub room_type: String,
    pub price: Decimal,
    pub capacity: u32,
    pub status: RoomStatus,
    pub amenities: Vec<String>,
    pub description: Option<String>,
}

impl NewRoom {
    fn into_room(self) -> Room {
        Room {
            id: self.id,
            number: self.number,
            room_type: self.room_type,
            price: self.price,
            capacity: self.capacity,
            status: self.status,
            amenities: self.amenities,
            description: self.description,
        }
    }
}

fn validate_room(room: &Room) -> Result<(), EngineError> {
    if room.number.is_empty() {
        return Err(EngineError::LimitExceeded("room number must not be empty"));
    }
    if room.number.len() > MAX_ROOM_NUMBER_LEN {
        return Err(EngineError::LimitExceeded("room number too long"));
    }
    if room.room_type.len() > MAX_ROOM_TYPE_LEN {
        return Err(EngineError::LimitExceeded("room type too long"));
    }
    if room.amenities.len() > MAX_AMENITIES {
        return Err(EngineError::LimitExceeded("too many amenities"));
    }
    if room.amenities.iter().any(|a| a.len() > MAX_AMENITY_LEN) {
        return Err(EngineError::LimitExceeded("amenity too long"));
    }
    if room.description.as_ref().is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    if room.price < Decimal::ZERO {
        return Err(EngineError::InvalidAmount(room.price));
    }
    if room.capacity == 0 {
        return Err(EngineError::InvalidGuestCount(0));
    }
    Ok(())
}

impl Engine {
    pub async fn create_room(&self, req: NewRoom) -> Result<Room, EngineError> {
        let room = req.into_room();
        validate_room(&room)?;
        let _gate = self.compaction_gate.read().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if !self.store.claim_room_id(room.id) {
            return Err(EngineError::AlreadyExists(room.id));
        }
        if !self.store.reserve_room_number(&room.number, room.id) {
            self.store.release_room_claim(&room.id);
            return Err(EngineError::DuplicateRoomNumber(room.number));
        }

        let event = Event::room_created(&room);
        if let Err(e) = self.wal_append(&event).await {
            self.store.release_room_number(&room.number, room.id);
            self.store.release_room_claim(&room.id);
            return Err(e);
        }
        self.store.insert_room(RoomState::new(room.clone()));
        self.store.release_room_claim(&room.id);
        self.notify.rooms_changed(&event);
        info!(room = %room.id, number = %room.number, "room created");
        Ok(room)
    }

    pub async fn update_room(&self, id: Ulid, upd: RoomUpdate) -> Result<Room, EngineError> {
        let room = Room {
            id,
            number: upd.number,
            room_type: upd.room_type,
            price: upd.price,
            capacity: upd.capacity,
            status: upd.status,
            amenities: upd.amenities,
            description: upd.description,
        };
        validate_room(&room)?;
        let _gate = self.compaction_gate.read().await;
        let mut guard = self.lock_room(&id).await?;

        let renumbered = guard.room.number != room.number;
        if renumbered && !self.store.reserve_room_number(&room.number, id) {
            return Err(EngineError::DuplicateRoomNumber(room.number));
        }
        let event = Event::room_updated(&room);
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            if renumbered {
                self.store.release_room_number(&room.number, id);
            }
            return Err(e);
        }
        Ok(guard.room.clone())
    }

    pub async fn set_room_status(&self, id: Ulid, status: RoomStatus) -> Result<Room, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let mut guard = self.lock_room(&id).await?;
        if guard.room.status == status {
            return Ok(guard.room.clone());
        }
        let mut room = guard.room.clone();
        room.status = status;
        self.persist_and_apply(&mut guard, &Event::room_updated(&room))
            .await?;
        info!(room = %id, %status, "room status changed");
        Ok(guard.room.clone())
    }

    /// Remove a room. Refused while any pending, confirmed or checked-in
    /// booking still sits on it; finished bookings go with the room.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.read().await;
        let guard = self.lock_room(&id).await?;
        if guard.has_blocking_bookings() {
            return Err(EngineError::HasBookings(id));
        }
        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        self.store.remove_room(&guard);
        self.notify.rooms_changed(&event);
        info!(room = %id, "room deleted");
        Ok(())
    }
}
