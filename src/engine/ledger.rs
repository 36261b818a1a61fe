use rust_decimal::Decimal;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::now_ms;
use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

/// Payment position of a booking. Only COMPLETED payments count as paid;
/// refunds are reported separately and never reduce `total_paid`.
pub fn compute_balance(total_price: Decimal, payments: &[Payment]) -> Balance {
    let sum_of = |status: PaymentStatus| -> Decimal {
        payments
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.amount)
            .sum()
    };
    let total_paid = sum_of(PaymentStatus::Completed);
    Balance {
        total_price,
        total_paid,
        total_refunded: sum_of(PaymentStatus::Refunded),
        remaining: total_price - total_paid,
    }
}

impl Engine {
    /// Record a PENDING payment. Rejected when it would take completed
    /// payments past the booking's total price.
    pub async fn add_payment(&self, req: NewPayment) -> Result<Payment, EngineError> {
        if req.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(req.amount));
        }
        let _gate = self.compaction_gate.read().await;
        if self.store.booking_for_payment(&req.id).is_some() {
            return Err(EngineError::AlreadyExists(req.id));
        }
        let mut guard = self.resolve_booking_write(&req.booking_id).await?;
        let booking = guard
            .booking(&req.booking_id)
            .ok_or(EngineError::NotFound(req.booking_id))?;
        if booking.payments.len() >= MAX_PAYMENTS_PER_BOOKING {
            return Err(EngineError::LimitExceeded("too many payments on booking"));
        }
        let balance = compute_balance(booking.total_price, &booking.payments);
        if req.amount > balance.remaining {
            metrics::counter!(crate::observability::OVERPAYMENTS_TOTAL).increment(1);
            warn!(
                booking = %req.booking_id,
                requested = %req.amount,
                remaining = %balance.remaining,
                "payment rejected: over balance"
            );
            return Err(EngineError::OverPayment {
                requested: req.amount,
                remaining: balance.remaining,
            });
        }

        // The early check above ran without the lock; claim the id for real.
        if !self.store.reserve_payment_id(req.id, req.booking_id) {
            return Err(EngineError::AlreadyExists(req.id));
        }

        let event = Event::PaymentAdded {
            id: req.id,
            booking_id: req.booking_id,
            room_id: guard.id(),
            amount: req.amount,
            method: req.method,
            created_at: now_ms(),
        };
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            self.store.release_payment_id(&req.id, &req.booking_id);
            return Err(e);
        }
        info!(payment = %req.id, booking = %req.booking_id, amount = %req.amount, "payment added");
        guard
            .booking(&req.booking_id)
            .and_then(|b| b.payment(&req.id))
            .cloned()
            .ok_or(EngineError::NotFound(req.id))
    }

    /// Move a payment to `status`. Settling into the status it already has is a no-op.
    pub async fn settle_payment(
        &self,
        payment_id: Ulid,
        status: PaymentStatus,
    ) -> Result<Payment, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let booking_id = self
            .store
            .booking_for_payment(&payment_id)
            .ok_or(EngineError::NotFound(payment_id))?;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let payment = guard
            .booking(&booking_id)
            .and_then(|b| b.payment(&payment_id))
            .ok_or(EngineError::NotFound(payment_id))?;
        if payment.status == status {
            return Ok(payment.clone());
        }
        if !payment.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                from: payment.status.as_str(),
                to: status.as_str(),
            });
        }

        let event = Event::PaymentSettled {
            id: payment_id,
            booking_id,
            room_id: guard.id(),
            status,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(payment = %payment_id, %status, "payment settled");
        guard
            .booking(&booking_id)
            .and_then(|b| b.payment(&payment_id))
            .cloned()
            .ok_or(EngineError::NotFound(payment_id))
    }

    pub async fn booking_balance(&self, booking_id: Ulid) -> Result<Balance, EngineError> {
        let room_id = self
            .store
            .room_for_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let rs = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let guard = rs.read().await;
        let booking = guard
            .booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        Ok(compute_balance(booking.total_price, &booking.payments))
    }
}
