use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Unix milliseconds, for creation timestamps only. Stays are calendar dates.
pub type Ms = i64;

/// Half-open stay `[check_in, check_out)`. The guest leaves on `check_out`,
/// so a stay ending on a day never collides with one starting that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-out must be after check-in");
        Self { check_in, check_out }
    }

    /// `None` unless `check_in < check_out`.
    pub fn checked(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Error for an unrecognised status/method string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Upper-snake text form shared by the SQL surface, JSON bodies and errors.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

text_enum!(BookingStatus, "booking status", {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    CheckedIn => "CHECKED_IN",
    CheckedOut => "CHECKED_OUT",
    Cancelled => "CANCELLED",
});

impl BookingStatus {
    /// Statuses that occupy the room for overlap purposes.
    pub const BLOCKING: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
    ];

    pub fn is_blocking(self) -> bool {
        Self::BLOCKING.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }

    /// The allowed-transition table. Staying in place is not a transition.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (CheckedIn, CheckedOut)
        )
    }

    /// Move to `to`, or fail with `InvalidTransition`. Re-asserting the
    /// current status is accepted as a no-op.
    pub fn transition(self, to: BookingStatus) -> Result<BookingStatus, EngineError> {
        if self == to || self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(EngineError::InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

text_enum!(RoomStatus, "room status", {
    Available => "AVAILABLE",
    Occupied => "OCCUPIED",
    Reserved => "RESERVED",
    Maintenance => "MAINTENANCE",
});

impl RoomStatus {
    /// Occupancy by date comes from bookings; only maintenance takes a room out.
    pub fn accepts_bookings(self) -> bool {
        !matches!(self, RoomStatus::Maintenance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "PENDING",
    Completed => "COMPLETED",
    Failed => "FAILED",
    Refunded => "REFUNDED",
});

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Online,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "CASH",
    Card => "CARD",
    BankTransfer => "BANK_TRANSFER",
    Online => "ONLINE",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: Ulid,
    pub number: String,
    pub room_type: String,
    /// Nightly rate.
    pub price: Decimal,
    pub capacity: u32,
    pub status: RoomStatus,
    pub amenities: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest_id: Ulid,
    pub stay: StayRange,
    pub guests: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: Ms,
    /// Owned line items, in insertion order.
    pub payments: Vec<Payment>,
}

impl Booking {
    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }

    pub fn payment(&self, id: &Ulid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == *id)
    }
}

/// Derived payment position of one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub total_price: Decimal,
    pub total_paid: Decimal,
    pub total_refunded: Decimal,
    pub remaining: Decimal,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// All bookings on this room, any status, sorted by `stay.check_in`.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.room.id
    }

    /// Insert booking maintaining sort order by check-in.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.stay.check_in, |b| b.stay.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Bookings (any status) whose stay overlaps the query.
    /// Everything starting on or after `query.check_out` is skipped by binary search.
    pub fn overlapping(&self, query: &StayRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.stay.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.stay.check_out > query.check_in)
    }

    pub fn has_blocking_bookings(&self) -> bool {
        self.bookings.iter().any(Booking::is_blocking)
    }
}

/// The event types, flat with no nesting. This is the WAL record format
/// and the NOTIFY payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        number: String,
        room_type: String,
        #[serde(with = "rust_decimal::serde::str")]
        price: Decimal,
        capacity: u32,
        status: RoomStatus,
        amenities: Vec<String>,
        description: Option<String>,
    },
    RoomUpdated {
        id: Ulid,
        number: String,
        room_type: String,
        #[serde(with = "rust_decimal::serde::str")]
        price: Decimal,
        capacity: u32,
        status: RoomStatus,
        amenities: Vec<String>,
        description: Option<String>,
    },
    RoomDeleted {
        id: Ulid,
    },
    BookingCreated {
        id: Ulid,
        room_id: Ulid,
        guest_id: Ulid,
        stay: StayRange,
        guests: u32,
        #[serde(with = "rust_decimal::serde::str")]
        total_price: Decimal,
        created_at: Ms,
    },
    BookingUpdated {
        id: Ulid,
        from_room_id: Ulid,
        room_id: Ulid,
        stay: StayRange,
        guests: u32,
        #[serde(with = "rust_decimal::serde::str")]
        total_price: Decimal,
        status: BookingStatus,
    },
    BookingStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: BookingStatus,
    },
    PaymentAdded {
        id: Ulid,
        booking_id: Ulid,
        room_id: Ulid,
        #[serde(with = "rust_decimal::serde::str")]
        amount: Decimal,
        method: PaymentMethod,
        created_at: Ms,
    },
    PaymentSettled {
        id: Ulid,
        booking_id: Ulid,
        room_id: Ulid,
        status: PaymentStatus,
    },
}

impl Event {
    /// The room whose state this event changes (the destination room for moves).
    pub fn room_id(&self) -> Ulid {
        match self {
            Event::RoomCreated { id, .. }
            | Event::RoomUpdated { id, .. }
            | Event::RoomDeleted { id } => *id,
            Event::BookingCreated { room_id, .. }
            | Event::BookingUpdated { room_id, .. }
            | Event::BookingStatusChanged { room_id, .. }
            | Event::PaymentAdded { room_id, .. }
            | Event::PaymentSettled { room_id, .. } => *room_id,
        }
    }

    pub fn booking_id(&self) -> Option<Ulid> {
        match self {
            Event::BookingCreated { id, .. }
            | Event::BookingUpdated { id, .. }
            | Event::BookingStatusChanged { id, .. } => Some(*id),
            Event::PaymentAdded { booking_id, .. } | Event::PaymentSettled { booking_id, .. } => {
                Some(*booking_id)
            }
            Event::RoomCreated { .. } | Event::RoomUpdated { .. } | Event::RoomDeleted { .. } => {
                None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::RoomCreated { .. } => "room_created",
            Event::RoomUpdated { .. } => "room_updated",
            Event::RoomDeleted { .. } => "room_deleted",
            Event::BookingCreated { .. } => "booking_created",
            Event::BookingUpdated { .. } => "booking_updated",
            Event::BookingStatusChanged { .. } => "booking_status_changed",
            Event::PaymentAdded { .. } => "payment_added",
            Event::PaymentSettled { .. } => "payment_settled",
        }
    }

    pub(crate) fn room_created(room: &Room) -> Self {
        Event::RoomCreated {
            id: room.id,
            number: room.number.clone(),
            room_type: room.room_type.clone(),
            price: room.price,
            capacity: room.capacity,
            status: room.status,
            amenities: room.amenities.clone(),
            description: room.description.clone(),
        }
    }

    pub(crate) fn room_updated(room: &Room) -> Self {
        Event::RoomUpdated {
            id: room.id,
            number: room.number.clone(),
            room_type: room.room_type.clone(),
            price: room.price,
            capacity: room.capacity,
            status: room.status,
            amenities: room.amenities.clone(),
            description: room.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stay(a: &str, b: &str) -> StayRange {
        StayRange::new(d(a), d(b))
    }

    fn room() -> Room {
        Room {
            id: Ulid::new(),
            number: "101".into(),
            room_type: "double".into(),
            price: dec!(100),
            capacity: 2,
            status: RoomStatus::Available,
            amenities: vec![],
            description: None,
        }
    }

    fn booking(a: &str, b: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id: Ulid::new(),
            guest_id: Ulid::new(),
            stay: stay(a, b),
            guests: 1,
            total_price: dec!(100),
            status,
            created_at: 0,
            payments: vec![],
        }
    }

    #[test]
    fn stay_basics() {
        let s = stay("2024-06-01", "2024-06-05");
        assert_eq!(s.nights(), 4);
        assert!(s.overlaps(&stay("2024-06-04", "2024-06-05")));
        assert!(!s.overlaps(&stay("2024-06-05", "2024-06-06"))); // half-open
    }

    #[test]
    fn stay_checked_rejects_empty_and_inverted() {
        assert!(StayRange::checked(d("2024-06-01"), d("2024-06-01")).is_none());
        assert!(StayRange::checked(d("2024-06-02"), d("2024-06-01")).is_none());
        assert!(StayRange::checked(d("2024-06-01"), d("2024-06-02")).is_some());
    }

    #[test]
    fn stay_overlap() {
        let a = stay("2024-06-01", "2024-06-05");
        let b = stay("2024-06-04", "2024-06-06");
        let c = stay("2024-06-05", "2024-06-08");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // checkout day == next check-in
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn status_text_roundtrip() {
        for s in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<BookingStatus>().unwrap(), s);
        }
        assert_eq!("checked_in".parse::<BookingStatus>().unwrap(), BookingStatus::CheckedIn);
        let err = "LOST".parse::<BookingStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown booking status: LOST");
    }

    #[test]
    fn blocking_set() {
        assert!(BookingStatus::Pending.is_blocking());
        assert!(BookingStatus::Confirmed.is_blocking());
        assert!(BookingStatus::CheckedIn.is_blocking());
        assert!(!BookingStatus::CheckedOut.is_blocking());
        assert!(!BookingStatus::Cancelled.is_blocking());
    }

    #[test]
    fn booking_transition_table() {
        use BookingStatus::*;
        let all = [Pending, Confirmed, CheckedIn, CheckedOut, Cancelled];
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, CheckedIn),
            (Confirmed, Cancelled),
            (CheckedIn, CheckedOut),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
        assert!(CheckedOut.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!CheckedIn.can_transition_to(Cancelled));
    }

    #[test]
    fn booking_transition_returns_target_or_error() {
        use BookingStatus::*;
        assert_eq!(Pending.transition(Confirmed).unwrap(), Confirmed);
        assert_eq!(Confirmed.transition(Confirmed).unwrap(), Confirmed);
        assert!(matches!(
            CheckedOut.transition(Pending),
            Err(EngineError::InvalidTransition { from: "CHECKED_OUT", to: "PENDING" })
        ));
    }

    #[test]
    fn payment_transition_table() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Refunded));
    }

    #[test]
    fn maintenance_rooms_take_no_bookings() {
        assert!(RoomStatus::Available.accepts_bookings());
        assert!(RoomStatus::Occupied.accepts_bookings());
        assert!(RoomStatus::Reserved.accepts_bookings());
        assert!(!RoomStatus::Maintenance.accepts_bookings());
    }

    #[test]
    fn bookings_kept_in_check_in_order() {
        let mut rs = RoomState::new(room());
        rs.insert_booking(booking("2024-06-10", "2024-06-12", BookingStatus::Pending));
        rs.insert_booking(booking("2024-06-01", "2024-06-03", BookingStatus::Pending));
        rs.insert_booking(booking("2024-06-05", "2024-06-07", BookingStatus::Pending));
        let starts: Vec<_> = rs.bookings.iter().map(|b| b.stay.check_in).collect();
        assert_eq!(starts, vec![d("2024-06-01"), d("2024-06-05"), d("2024-06-10")]);
    }

    #[test]
    fn remove_booking() {
        let mut rs = RoomState::new(room());
        let b = booking("2024-06-01", "2024-06-03", BookingStatus::Pending);
        let id = b.id;
        rs.insert_booking(b);
        assert!(rs.remove_booking(Ulid::new()).is_none());
        assert_eq!(rs.remove_booking(id).map(|b| b.id), Some(id));
        assert!(rs.bookings.is_empty());
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut rs = RoomState::new(room());
        rs.insert_booking(booking("2024-05-01", "2024-05-03", BookingStatus::Confirmed));
        rs.insert_booking(booking("2024-06-03", "2024-06-06", BookingStatus::Confirmed));
        rs.insert_booking(booking("2024-07-01", "2024-07-03", BookingStatus::Confirmed));

        let query = stay("2024-06-04", "2024-06-10");
        let hits: Vec<_> = rs.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].stay, stay("2024-06-03", "2024-06-06"));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut rs = RoomState::new(room());
        rs.insert_booking(booking("2024-06-01", "2024-06-05", BookingStatus::Confirmed));
        assert_eq!(rs.overlapping(&stay("2024-06-05", "2024-06-08")).count(), 0);
        assert_eq!(rs.overlapping(&stay("2024-05-28", "2024-06-01")).count(), 0);
    }

    #[test]
    fn overlapping_long_stay_spanning_query() {
        let mut rs = RoomState::new(room());
        rs.insert_booking(booking("2024-01-01", "2024-12-31", BookingStatus::CheckedIn));
        assert_eq!(rs.overlapping(&stay("2024-06-01", "2024-06-02")).count(), 1);
    }

    #[test]
    fn overlapping_reports_every_status() {
        // Filtering by blocking status is the checker's job, not the index's.
        let mut rs = RoomState::new(room());
        rs.insert_booking(booking("2024-06-01", "2024-06-05", BookingStatus::Cancelled));
        assert_eq!(rs.overlapping(&stay("2024-06-02", "2024-06-03")).count(), 1);
        assert!(!rs.has_blocking_bookings());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            room_id: Ulid::new(),
            guest_id: Ulid::new(),
            stay: stay("2024-06-01", "2024-06-05"),
            guests: 2,
            total_price: dec!(412.50),
            created_at: 1_700_000_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn event_json_carries_price_as_string() {
        let event = Event::PaymentAdded {
            id: Ulid::new(),
            booking_id: Ulid::new(),
            room_id: Ulid::new(),
            amount: dec!(200.00),
            method: PaymentMethod::Card,
            created_at: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["PaymentAdded"]["amount"], "200.00");
        assert_eq!(json["PaymentAdded"]["method"], "CARD");
    }
}
