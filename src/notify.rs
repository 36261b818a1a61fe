use std::fmt;

use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// A cached view that clients can ask to be told about when it goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// The staff-wide booking list.
    AdminBookings,
    Booking(Ulid),
    GuestBookings(Ulid),
    /// The room catalog.
    Rooms,
}

impl ViewKey {
    /// LISTEN channel name: `bookings`, `booking_<id>`, `guest_<id>`, `rooms`.
    pub fn channel_name(&self) -> String {
        self.to_string()
    }

    pub fn parse(channel: &str) -> Option<Self> {
        let channel = channel.trim_matches('"');
        match channel.to_ascii_lowercase().as_str() {
            "bookings" => return Some(ViewKey::AdminBookings),
            "rooms" => return Some(ViewKey::Rooms),
            _ => {}
        }
        if let Some(id) = strip_prefix_ci(channel, "booking_") {
            return id.parse().ok().map(ViewKey::Booking);
        }
        if let Some(id) = strip_prefix_ci(channel, "guest_") {
            return id.parse().ok().map(ViewKey::GuestBookings);
        }
        None
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKey::AdminBookings => f.write_str("bookings"),
            ViewKey::Booking(id) => write!(f, "booking_{id}"),
            ViewKey::GuestBookings(id) => write!(f, "guest_{id}"),
            ViewKey::Rooms => f.write_str("rooms"),
        }
    }
}

/// Fans each committed mutation out to the views it invalidates.
/// Channels are created lazily on first subscribe.
pub struct InvalidationHub {
    channels: DashMap<ViewKey, broadcast::Sender<Event>>,
}

impl Default for InvalidationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, key: &ViewKey) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(*key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send to one view. No-op if nobody is listening.
    fn send(&self, key: &ViewKey, event: &Event) {
        let mut dead = false;
        if let Some(sender) = self.channels.get(key) {
            dead = sender.send(event.clone()).is_err();
        }
        // Every receiver is gone; drop the channel so per-booking keys don't pile up.
        if dead {
            self.channels.remove_if(key, |_, s| s.receiver_count() == 0);
        }
    }

    /// A booking (or one of its payments) changed: the admin list, the
    /// booking itself and the guest's own list are all stale.
    pub fn booking_changed(&self, booking_id: Ulid, guest_id: Option<Ulid>, event: &Event) {
        self.send(&ViewKey::AdminBookings, event);
        self.send(&ViewKey::Booking(booking_id), event);
        if let Some(guest_id) = guest_id {
            self.send(&ViewKey::GuestBookings(guest_id), event);
        }
    }

    pub fn rooms_changed(&self, event: &Event) {
        self.send(&ViewKey::Rooms, event);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
