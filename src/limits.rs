//! Hard caps on input sizes. Every mutation checks them before its WAL
//! append. Field-length caps are checked before any lock is taken, per-room
//! counts under that room's write lock. `MAX_ROOMS` is read without a global
//! lock, so racing creates can overshoot it by the number in flight.

/// Rooms per process.
pub const MAX_ROOMS: usize = 10_000;

/// Bookings (any status) kept on a single room.
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;

/// Payments recorded against a single booking.
pub const MAX_PAYMENTS_PER_BOOKING: usize = 256;

/// Longest single stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Widest availability search window, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 366;

/// Room number length.
pub const MAX_ROOM_NUMBER_LEN: usize = 32;

/// Room type label length.
pub const MAX_ROOM_TYPE_LEN: usize = 64;

/// Room description length.
pub const MAX_DESCRIPTION_LEN: usize = 4_096;

/// Amenity entries per room.
pub const MAX_AMENITIES: usize = 64;

/// Length of one amenity entry.
pub const MAX_AMENITY_LEN: usize = 64;

/// Earliest accepted check-in year.
pub const MIN_VALID_YEAR: i32 = 2000;

/// Latest accepted check-out year.
pub const MAX_VALID_YEAR: i32 = 2200;
