use chrono::{Datelike, NaiveDate};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<StayRange, EngineError> {
    let stay = StayRange::checked(check_in, check_out)
        .ok_or(EngineError::InvalidRange { check_in, check_out })?;
    if check_in.year() < MIN_VALID_YEAR || check_out.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// First booking on `room_id` with a status in `blocking` whose stay
/// intersects `stay`. `exclude` skips a booking being modified in place.
pub fn first_conflict<'a>(
    room_id: Ulid,
    stay: &StayRange,
    bookings: impl IntoIterator<Item = &'a Booking>,
    blocking: &[BookingStatus],
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    bookings
        .into_iter()
        .filter(|b| b.room_id == room_id && Some(b.id) != exclude)
        .filter(|b| blocking.contains(&b.status))
        .find(|b| b.stay.overlaps(stay))
        .map(|b| b.id)
}

/// Whether any blocking booking occupies part of `stay` on the room.
pub fn is_range_blocked<'a>(
    room_id: Ulid,
    stay: &StayRange,
    bookings: impl IntoIterator<Item = &'a Booking>,
    blocking: &[BookingStatus],
    exclude: Option<Ulid>,
) -> bool {
    first_conflict(room_id, stay, bookings, blocking, exclude).is_some()
}

/// Precondition for placing `stay` on the room: the room takes bookings and
/// no default-blocking booking (other than `exclude`) overlaps.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    stay: &StayRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    if !rs.room.status.accepts_bookings() {
        return Err(EngineError::RoomUnavailable(rs.id()));
    }
    if let Some(conflict) = first_conflict(
        rs.id(),
        stay,
        rs.overlapping(stay),
        &BookingStatus::BLOCKING,
        exclude,
    ) {
        metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
        return Err(EngineError::RoomUnavailable(conflict));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + chrono::Duration::days(n)
    }

    fn booking_on(room_id: Ulid, from: i64, to: i64, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id,
            guest_id: Ulid::new(),
            stay: StayRange::new(day(from), day(to)),
            guests: 1,
            total_price: Decimal::ZERO,
            status,
            created_at: 0,
            payments: Vec::new(),
        }
    }

    /// Reference definition: two stays conflict iff some night belongs to both.
    fn shares_a_night(a: (i64, i64), b: (i64, i64)) -> bool {
        (a.0..a.1).any(|n| (b.0..b.1).contains(&n))
    }

    #[test]
    fn flags_exactly_the_intersecting_pairs() {
        let room = Ulid::new();
        let span = 8;
        for a0 in 0..span {
            for a1 in (a0 + 1)..=span {
                for b0 in 0..span {
                    for b1 in (b0 + 1)..=span {
                        let existing = [booking_on(room, b0, b1, BookingStatus::Confirmed)];
                        let candidate = StayRange::new(day(a0), day(a1));
                        let blocked = is_range_blocked(
                            room,
                            &candidate,
                            &existing,
                            &BookingStatus::BLOCKING,
                            None,
                        );
                        assert_eq!(
                            blocked,
                            shares_a_night((a0, a1), (b0, b1)),
                            "candidate [{a0},{a1}) vs existing [{b0},{b1})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn adjacency_is_not_a_conflict() {
        let room = Ulid::new();
        let existing = [booking_on(room, 0, 4, BookingStatus::Confirmed)];
        let after = StayRange::new(day(4), day(7));
        let before = StayRange::new(day(-3), day(0));
        assert!(!is_range_blocked(room, &after, &existing, &BookingStatus::BLOCKING, None));
        assert!(!is_range_blocked(room, &before, &existing, &BookingStatus::BLOCKING, None));
    }

    #[test]
    fn covers_start_inside_end_inside_and_containment() {
        let room = Ulid::new();
        let existing = [booking_on(room, 3, 6, BookingStatus::Pending)];
        let starts_inside = StayRange::new(day(5), day(9));
        let ends_inside = StayRange::new(day(0), day(4));
        let contains = StayRange::new(day(1), day(10));
        let inside = StayRange::new(day(4), day(5));
        for stay in [starts_inside, ends_inside, contains, inside] {
            assert!(is_range_blocked(room, &stay, &existing, &BookingStatus::BLOCKING, None), "{stay}");
        }
    }

    #[test]
    fn cancelled_and_checked_out_never_block() {
        let room = Ulid::new();
        let existing = [
            booking_on(room, 0, 5, BookingStatus::Cancelled),
            booking_on(room, 0, 5, BookingStatus::CheckedOut),
        ];
        let stay = StayRange::new(day(1), day(3));
        assert!(!is_range_blocked(room, &stay, &existing, &BookingStatus::BLOCKING, None));
    }

    #[test]
    fn every_default_blocking_status_blocks() {
        let room = Ulid::new();
        let stay = StayRange::new(day(1), day(3));
        for status in BookingStatus::BLOCKING {
            let existing = [booking_on(room, 0, 5, status)];
            assert!(is_range_blocked(room, &stay, &existing, &BookingStatus::BLOCKING, None), "{status}");
        }
    }

    #[test]
    fn custom_blocking_set_is_honoured() {
        let room = Ulid::new();
        let existing = [booking_on(room, 0, 5, BookingStatus::Pending)];
        let stay = StayRange::new(day(1), day(3));
        assert!(!is_range_blocked(room, &stay, &existing, &[BookingStatus::Confirmed], None));
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let room = Ulid::new();
        let existing = [booking_on(room, 0, 5, BookingStatus::Confirmed)];
        let own = existing[0].id;
        let stay = StayRange::new(day(1), day(6));
        assert!(!is_range_blocked(room, &stay, &existing, &BookingStatus::BLOCKING, Some(own)));
        assert_eq!(
            first_conflict(room, &stay, &existing, &BookingStatus::BLOCKING, None),
            Some(own)
        );
    }

    #[test]
    fn other_rooms_do_not_block() {
        let room = Ulid::new();
        let existing = [booking_on(Ulid::new(), 0, 5, BookingStatus::Confirmed)];
        let stay = StayRange::new(day(1), day(3));
        assert!(!is_range_blocked(room, &stay, &existing, &BookingStatus::BLOCKING, None));
    }

    #[test]
    fn validate_stay_rejects_bad_ranges() {
        assert!(matches!(
            validate_stay(day(3), day(3)),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_stay(day(3), day(1)),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_stay(day(0), day(MAX_STAY_NIGHTS + 1)),
            Err(EngineError::LimitExceeded("stay too long"))
        ));
        let old = NaiveDate::from_ymd_opt(1999, 12, 30).unwrap();
        assert!(matches!(
            validate_stay(old, day(0)),
            Err(EngineError::LimitExceeded("date out of range"))
        ));
        assert_eq!(validate_stay(day(0), day(2)).unwrap().nights(), 2);
    }
}
