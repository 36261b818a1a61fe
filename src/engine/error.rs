use chrono::NaiveDate;
use rust_decimal::Decimal;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    DuplicateRoomNumber(String),
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    /// Carries the conflicting booking id, or the room id when the room
    /// itself is out of service.
    RoomUnavailable(Ulid),
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    OverPayment {
        requested: Decimal,
        remaining: Decimal,
    },
    InvalidAmount(Decimal),
    InvalidGuestCount(u32),
    CapacityExceeded(u32),
    HasBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Stable upper-snake kind used by both boundaries.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::AlreadyExists(_) => "ALREADY_EXISTS",
            EngineError::DuplicateRoomNumber(_) => "DUPLICATE_ROOM_NUMBER",
            EngineError::InvalidRange { .. } => "INVALID_RANGE",
            EngineError::RoomUnavailable(_) => "ROOM_UNAVAILABLE",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::OverPayment { .. } => "OVER_PAYMENT",
            EngineError::InvalidAmount(_) => "INVALID_AMOUNT",
            EngineError::InvalidGuestCount(_) => "INVALID_GUEST_COUNT",
            EngineError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            EngineError::HasBookings(_) => "HAS_BOOKINGS",
            EngineError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            EngineError::WalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, EngineError::WalError(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::DuplicateRoomNumber(n) => write!(f, "room number already in use: {n}"),
            EngineError::InvalidRange {
                check_in,
                check_out,
            } => write!(
                f,
                "invalid range: check-out {check_out} must be after check-in {check_in}"
            ),
            EngineError::RoomUnavailable(id) => {
                write!(f, "room unavailable for the requested dates (conflict: {id})")
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {from} -> {to}")
            }
            EngineError::OverPayment {
                requested,
                remaining,
            } => write!(
                f,
                "payment of {requested} exceeds remaining balance of {remaining}"
            ),
            EngineError::InvalidAmount(a) => write!(f, "invalid amount: {a}"),
            EngineError::InvalidGuestCount(n) => write!(f, "invalid guest count: {n}"),
            EngineError::CapacityExceeded(cap) => {
                write!(f, "room capacity {cap} exceeded")
            }
            EngineError::HasBookings(id) => {
                write!(f, "cannot delete room {id}: has active bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
