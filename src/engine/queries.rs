use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

fn newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl Engine {
    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let rs = self.store.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    /// Every room, ordered by room number.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let mut rooms = Vec::with_capacity(self.store.room_count());
        for id in self.store.room_ids() {
            if let Some(rs) = self.store.get_room(&id) {
                rooms.push(rs.read().await.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        rooms
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        // A concurrent move can make the index point one room behind; retry.
        for _ in 0..4 {
            let room_id = self
                .store
                .room_for_booking(&id)
                .ok_or(EngineError::NotFound(id))?;
            let Some(rs) = self.store.get_room(&room_id) else {
                continue;
            };
            if let Some(booking) = rs.read().await.booking(&id) {
                return Ok(booking.clone());
            }
        }
        Err(EngineError::NotFound(id))
    }

    /// All bookings across all rooms, newest first.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut out = Vec::with_capacity(self.store.booking_count());
        for id in self.store.room_ids() {
            if let Some(rs) = self.store.get_room(&id) {
                out.extend(rs.read().await.bookings.iter().cloned());
            }
        }
        newest_first(&mut out);
        out
    }

    pub async fn bookings_for_guest(&self, guest_id: Ulid) -> Vec<Booking> {
        let mut out = Vec::new();
        for id in self.store.bookings_for_guest(&guest_id) {
            if let Ok(booking) = self.get_booking(id).await {
                out.push(booking);
            }
        }
        newest_first(&mut out);
        out
    }

    /// Bookings on one room in check-in order.
    pub async fn bookings_for_room(&self, room_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let rs = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        Ok(guard.bookings.clone())
    }

    pub async fn payments_for_booking(&self, booking_id: Ulid) -> Result<Vec<Payment>, EngineError> {
        Ok(self.get_booking(booking_id).await?.payments)
    }

    pub async fn get_payment(&self, payment_id: Ulid) -> Result<Payment, EngineError> {
        let booking_id = self
            .store
            .booking_for_payment(&payment_id)
            .ok_or(EngineError::NotFound(payment_id))?;
        self.get_booking(booking_id)
            .await?
            .payment(&payment_id)
            .cloned()
            .ok_or(EngineError::NotFound(payment_id))
    }
}
