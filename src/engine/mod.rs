mod availability;
mod error;
mod ledger;
mod lifecycle;
mod overlap;
mod queries;
mod rooms;
mod store;

pub use availability::AvailabilityQuery;
pub use error::EngineError;
pub use ledger::{compute_balance, NewPayment};
pub use lifecycle::{BookingUpdate, NewBooking};
pub use overlap::{first_conflict, is_range_blocked};
pub use rooms::{NewRoom, RoomUpdate};
pub use store::{SharedRoomState, Store};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::notify::InvalidationHub;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush this batch before the non-append command runs.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for {} events: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so partially buffered bytes don't
    // leak into the next batch. Callers were told this batch failed.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// The booking core. Owns every room, the bookings placed on it and their
/// payments; all mutations go WAL-first under the affected room's write lock.
pub struct Engine {
    pub store: Store,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<InvalidationHub>,
    /// Mutations hold it shared for their whole run; compaction holds it
    /// exclusively so no append can land between snapshot and swap.
    /// Always taken before any room lock.
    pub(super) compaction_gate: RwLock<()>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<InvalidationHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Store::new();
        let mut rooms: HashMap<Ulid, RoomState> = HashMap::new();

        // Replay into plain states first; locks are only introduced once the
        // final state is known.
        for event in &events {
            match event {
                Event::RoomCreated { id, .. } => {
                    if let Some(room) = store::room_from_event(event) {
                        rooms.insert(*id, RoomState::new(room));
                    }
                }
                Event::RoomDeleted { id } => {
                    if let Some(rs) = rooms.remove(id) {
                        store.remove_room(&rs);
                    }
                }
                Event::BookingUpdated {
                    from_room_id,
                    room_id,
                    ..
                } if from_room_id != room_id => {
                    let Some(mut from) = rooms.remove(from_room_id) else {
                        warn!("replay: move from unknown room {from_room_id}");
                        continue;
                    };
                    if let Some(to) = rooms.get_mut(room_id) {
                        store.apply_move(&mut from, to, event);
                    }
                    rooms.insert(*from_room_id, from);
                }
                other => {
                    if let Some(rs) = rooms.get_mut(&other.room_id()) {
                        store.apply_event(rs, other);
                    }
                }
            }
        }

        for (_, rs) in rooms {
            store.insert_room(rs);
        }
        if !events.is_empty() {
            info!(
                "replayed {} events: {} rooms, {} bookings",
                events.len(),
                store.room_count(),
                store.booking_count()
            );
        }

        Ok(Self {
            store,
            wal_tx,
            notify,
            compaction_gate: RwLock::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append + apply + invalidate in one call.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(rs, event);
        self.publish(rs, event);
        Ok(())
    }

    /// Tell listeners which cached views the event made stale.
    pub(super) fn publish(&self, rs: &RoomState, event: &Event) {
        match event.booking_id() {
            Some(booking_id) => {
                let guest_id = rs.booking(&booking_id).map(|b| b.guest_id);
                self.notify.booking_changed(booking_id, guest_id, event);
            }
            None => self.notify.rooms_changed(event),
        }
    }

    /// Acquire a room's write lock, failing if the room was deleted while we waited.
    pub(super) async fn lock_room(
        &self,
        room_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self
            .store
            .get_room(room_id)
            .ok_or(EngineError::NotFound(*room_id))?;
        let guard = rs.write_owned().await;
        if !self.store.contains_room(room_id) {
            return Err(EngineError::NotFound(*room_id));
        }
        Ok(guard)
    }

    /// Lookup booking → room, acquire that room's write lock, and confirm the
    /// booking is still there (it may have moved while we waited).
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        for _ in 0..4 {
            let room_id = self
                .store
                .room_for_booking(booking_id)
                .ok_or(EngineError::NotFound(*booking_id))?;
            let guard = self.lock_room(&room_id).await?;
            if guard.booking(booking_id).is_some() {
                return Ok(guard);
            }
        }
        Err(EngineError::NotFound(*booking_id))
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _exclusive = self.compaction_gate.write().await;
        let mut events = Vec::new();
        let mut ids = self.store.room_ids();
        ids.sort();

        for id in ids {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            events.push(Event::room_created(&guard.room));
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: booking.id,
                    room_id: booking.room_id,
                    guest_id: booking.guest_id,
                    stay: booking.stay,
                    guests: booking.guests,
                    total_price: booking.total_price,
                    created_at: booking.created_at,
                });
                if booking.status != BookingStatus::Pending {
                    events.push(Event::BookingStatusChanged {
                        id: booking.id,
                        room_id: booking.room_id,
                        status: booking.status,
                    });
                }
                for payment in &booking.payments {
                    events.push(Event::PaymentAdded {
                        id: payment.id,
                        booking_id: booking.id,
                        room_id: booking.room_id,
                        amount: payment.amount,
                        method: payment.method,
                        created_at: payment.created_at,
                    });
                    if payment.status != PaymentStatus::Pending {
                        events.push(Event::PaymentSettled {
                            id: payment.id,
                            booking_id: booking.id,
                            room_id: booking.room_id,
                            status: payment.status,
                        });
                    }
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
