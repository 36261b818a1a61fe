use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Room states plus the reverse indexes the engine resolves ids through.
/// Row data lives inside `RoomState`; the maps here only point at it.
pub struct Store {
    rooms: DashMap<Ulid, SharedRoomState>,
    room_numbers: DashMap<String, Ulid>,
    /// Ids of rooms whose creation is in flight.
    room_claims: DashMap<Ulid, ()>,
    booking_to_room: DashMap<Ulid, Ulid>,
    payment_to_booking: DashMap<Ulid, Ulid>,
    guest_bookings: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            room_claims: DashMap::new(),
            booking_to_room: DashMap::new(),
            payment_to_booking: DashMap::new(),
            guest_bookings: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, id: &Ulid) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_ids(&self) -> Vec<Ulid> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    /// Claim `id` for a room about to be created. False if the room exists or
    /// another create holds the claim. Released with [`Store::release_room_claim`]
    /// once the room is inserted or the create failed.
    pub fn claim_room_id(&self, id: Ulid) -> bool {
        match self.room_claims.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                if self.rooms.contains_key(&id) {
                    return false;
                }
                e.insert(());
                true
            }
        }
    }

    pub fn release_room_claim(&self, id: &Ulid) {
        self.room_claims.remove(id);
    }

    pub fn room_for_number(&self, number: &str) -> Option<Ulid> {
        self.room_numbers.get(number).map(|e| *e.value())
    }

    /// Claim `number` for room `id`. False if another room holds it.
    pub fn reserve_room_number(&self, number: &str, id: Ulid) -> bool {
        match self.room_numbers.entry(number.to_string()) {
            Entry::Occupied(e) => *e.get() == id,
            Entry::Vacant(e) => {
                e.insert(id);
                true
            }
        }
    }

    /// Undo a reservation whose WAL append failed.
    pub fn release_room_number(&self, number: &str, id: Ulid) {
        self.room_numbers.remove_if(number, |_, v| *v == id);
    }

    /// Insert a room and index its number. Caller has checked uniqueness.
    pub fn insert_room(&self, state: RoomState) -> SharedRoomState {
        let id = state.id();
        self.room_numbers.insert(state.room.number.clone(), id);
        let shared = Arc::new(RwLock::new(state));
        self.rooms.insert(id, shared.clone());
        shared
    }

    /// Drop a room together with every index entry that points into it.
    pub fn remove_room(&self, state: &RoomState) {
        let id = state.id();
        self.room_numbers.remove_if(&state.room.number, |_, v| *v == id);
        for booking in &state.bookings {
            self.unindex_booking(booking);
        }
        self.rooms.remove(&id);
    }

    // ── Booking / payment indexes ────────────────────────────

    pub fn room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }

    pub fn booking_for_payment(&self, payment_id: &Ulid) -> Option<Ulid> {
        self.payment_to_booking.get(payment_id).map(|e| *e.value())
    }

    /// Claim a new booking's id for `room_id` ahead of the WAL append. False
    /// if the id is already taken on any room.
    pub fn reserve_booking_id(&self, booking_id: Ulid, room_id: Ulid) -> bool {
        match self.booking_to_room.entry(booking_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(room_id);
                true
            }
        }
    }

    pub fn release_booking_id(&self, booking_id: &Ulid, room_id: &Ulid) {
        self.booking_to_room
            .remove_if(booking_id, |_, v| v == room_id);
    }

    /// Claim `payment_id` for `booking_id` ahead of the WAL append. False if
    /// any booking already holds it.
    pub fn reserve_payment_id(&self, payment_id: Ulid, booking_id: Ulid) -> bool {
        match self.payment_to_booking.entry(payment_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(booking_id);
                true
            }
        }
    }

    /// Undo a payment reservation whose WAL append failed.
    pub fn release_payment_id(&self, payment_id: &Ulid, booking_id: &Ulid) {
        self.payment_to_booking
            .remove_if(payment_id, |_, v| v == booking_id);
    }

    pub fn bookings_for_guest(&self, guest_id: &Ulid) -> Vec<Ulid> {
        self.guest_bookings
            .get(guest_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_room.len()
    }

    fn index_booking(&self, booking: &Booking) {
        self.booking_to_room.insert(booking.id, booking.room_id);
        let mut ids = self.guest_bookings.entry(booking.guest_id).or_default();
        if !ids.contains(&booking.id) {
            ids.push(booking.id);
        }
    }

    fn unindex_booking(&self, booking: &Booking) {
        self.booking_to_room.remove(&booking.id);
        for payment in &booking.payments {
            self.payment_to_booking.remove(&payment.id);
        }
        if let Some(mut ids) = self.guest_bookings.get_mut(&booking.guest_id) {
            ids.retain(|id| *id != booking.id);
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply an event to the room it targets (no locking; the caller holds the
    /// lock). Room creation/deletion is handled at the map level, and a
    /// booking moving between rooms goes through [`Store::apply_move`].
    pub fn apply_event(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomUpdated {
                id,
                number,
                room_type,
                price,
                capacity,
                status,
                amenities,
                description,
            } => {
                if rs.room.number != *number {
                    self.room_numbers.remove_if(&rs.room.number, |_, v| v == id);
                    self.room_numbers.insert(number.clone(), *id);
                }
                rs.room.number = number.clone();
                rs.room.room_type = room_type.clone();
                rs.room.price = *price;
                rs.room.capacity = *capacity;
                rs.room.status = *status;
                rs.room.amenities = amenities.clone();
                rs.room.description = description.clone();
            }
            Event::BookingCreated {
                id,
                room_id,
                guest_id,
                stay,
                guests,
                total_price,
                created_at,
            } => {
                let booking = Booking {
                    id: *id,
                    room_id: *room_id,
                    guest_id: *guest_id,
                    stay: *stay,
                    guests: *guests,
                    total_price: *total_price,
                    status: BookingStatus::Pending,
                    created_at: *created_at,
                    payments: Vec::new(),
                };
                self.index_booking(&booking);
                rs.insert_booking(booking);
            }
            Event::BookingUpdated {
                id,
                stay,
                guests,
                total_price,
                status,
                ..
            } => {
                if let Some(mut booking) = rs.remove_booking(*id) {
                    booking.stay = *stay;
                    booking.guests = *guests;
                    booking.total_price = *total_price;
                    booking.status = *status;
                    rs.insert_booking(booking);
                }
            }
            Event::BookingStatusChanged { id, status, .. } => {
                if let Some(booking) = rs.booking_mut(id) {
                    booking.status = *status;
                }
            }
            Event::PaymentAdded {
                id,
                booking_id,
                amount,
                method,
                created_at,
                ..
            } => {
                if let Some(booking) = rs.booking_mut(booking_id) {
                    booking.payments.push(Payment {
                        id: *id,
                        booking_id: *booking_id,
                        amount: *amount,
                        method: *method,
                        status: PaymentStatus::Pending,
                        created_at: *created_at,
                    });
                    self.payment_to_booking.insert(*id, *booking_id);
                }
            }
            Event::PaymentSettled {
                id,
                booking_id,
                status,
                ..
            } => {
                if let Some(payment) = rs
                    .booking_mut(booking_id)
                    .and_then(|b| b.payments.iter_mut().find(|p| p.id == *id))
                {
                    payment.status = *status;
                }
            }
            Event::RoomCreated { .. } | Event::RoomDeleted { .. } => {}
        }
    }

    /// Apply a `BookingUpdated` that changes the booking's room. Payments travel
    /// with the booking.
    pub fn apply_move(&self, from: &mut RoomState, to: &mut RoomState, event: &Event) {
        let Event::BookingUpdated {
            id,
            room_id,
            stay,
            guests,
            total_price,
            status,
            ..
        } = event
        else {
            return;
        };
        if let Some(mut booking) = from.remove_booking(*id) {
            booking.room_id = *room_id;
            booking.stay = *stay;
            booking.guests = *guests;
            booking.total_price = *total_price;
            booking.status = *status;
            self.booking_to_room.insert(*id, *room_id);
            to.insert_booking(booking);
        }
    }
}

/// Rebuild a room from its creation event.
pub(super) fn room_from_event(event: &Event) -> Option<Room> {
    match event {
        Event::RoomCreated {
            id,
            number,
            room_type,
            price,
            capacity,
            status,
            amenities,
            description,
        } => Some(Room {
            id: *id,
            number: number.clone(),
            room_type: room_type.clone(),
            price: *price,
            capacity: *capacity,
            status: *status,
            amenities: amenities.clone(),
            description: description.clone(),
        }),
        _ => None,
    }
}
