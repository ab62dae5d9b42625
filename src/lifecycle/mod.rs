//! The authoritative order state machine. Every status, OTP, payment and
//! rating transition goes through here; each one is applied under the
//! order's exclusive map entry so concurrent callers serialize, and each
//! rejection carries its reason instead of silently doing nothing.
//!
//! Lock ordering: order entry first, then partner entry. Both maps are
//! only ever locked in that order.

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::order::{Order, OrderStatus, PaymentStatus};
use crate::models::partner::RatingEntry;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("partner {0} not found")]
    PartnerNotFound(Uuid),

    #[error("order is already assigned")]
    AlreadyAssigned,

    #[error("partner already has an active order")]
    PartnerBusy,

    #[error("only the assigned partner may perform this action")]
    NotAssignedPartner,

    #[error("cannot {action} an order that is {from:?}")]
    InvalidStatus {
        from: OrderStatus,
        action: &'static str,
    },

    #[error("no delivery code has been issued for this order")]
    OtpNotIssued,

    #[error("delivery code does not match")]
    OtpMismatch,

    #[error("delivery code has not been verified")]
    OtpNotVerified,

    #[error("order has already been rated")]
    AlreadyRated,

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("payment is not pending")]
    PaymentNotPending,
}

fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Claim a pending order for a partner. The check-and-set runs under the
/// order's entry lock, so of two concurrent claimants exactly one wins and
/// the other sees `AlreadyAssigned`.
pub fn accept(state: &AppState, order_id: Uuid, partner_id: Uuid) -> Result<Order, TransitionError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    if order.status != OrderStatus::Pending {
        return Err(TransitionError::InvalidStatus {
            from: order.status,
            action: "accept",
        });
    }
    if order.partner_id.is_some() {
        return Err(TransitionError::AlreadyAssigned);
    }

    {
        let mut partner = state
            .partners
            .get_mut(&partner_id)
            .ok_or(TransitionError::PartnerNotFound(partner_id))?;

        if partner.active_order.is_some() {
            return Err(TransitionError::PartnerBusy);
        }

        partner.active_order = Some(order_id);
        partner.updated_at = Utc::now();
    }

    order.status = OrderStatus::Assigned;
    order.partner_id = Some(partner_id);
    order.updated_at = Utc::now();

    info!(%order_id, %partner_id, "order accepted");
    Ok(order.clone())
}

/// Assigned -> InTransit, by the assigned partner. Issues the 6-digit
/// delivery code on first transition; a re-issued start keeps the old code.
pub fn start(state: &AppState, order_id: Uuid, partner_id: Uuid) -> Result<Order, TransitionError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    require_assigned_partner(&order, partner_id)?;
    if order.status != OrderStatus::Assigned {
        return Err(TransitionError::InvalidStatus {
            from: order.status,
            action: "start",
        });
    }

    if order.otp.is_none() {
        order.otp = Some(generate_otp());
    }
    order.status = OrderStatus::InTransit;
    order.in_transit_at = Some(Utc::now());
    order.updated_at = Utc::now();

    info!(%order_id, %partner_id, "delivery started");
    Ok(order.clone())
}

/// Exact string comparison against the stored code; no normalization and
/// no attempt limit. Verification is idempotent once it has succeeded.
pub fn verify_otp(
    state: &AppState,
    order_id: Uuid,
    partner_id: Uuid,
    candidate: &str,
) -> Result<Order, TransitionError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    require_assigned_partner(&order, partner_id)?;

    if order.otp_verified {
        return Ok(order.clone());
    }

    let otp = order.otp.as_deref().ok_or(TransitionError::OtpNotIssued)?;
    if otp != candidate {
        return Err(TransitionError::OtpMismatch);
    }

    order.otp_verified = true;
    order.updated_at = Utc::now();

    info!(%order_id, "delivery code verified");
    Ok(order.clone())
}

/// InTransit -> Delivered. A verified delivery code is a hard precondition,
/// not a UI hint. Frees the partner's claim slot.
pub fn complete(
    state: &AppState,
    order_id: Uuid,
    partner_id: Uuid,
) -> Result<Order, TransitionError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    require_assigned_partner(&order, partner_id)?;
    if order.status != OrderStatus::InTransit {
        return Err(TransitionError::InvalidStatus {
            from: order.status,
            action: "complete",
        });
    }
    if !order.otp_verified {
        return Err(TransitionError::OtpNotVerified);
    }

    order.status = OrderStatus::Delivered;
    order.delivered_at = Some(Utc::now());
    order.updated_at = Utc::now();

    if let Some(mut partner) = state.partners.get_mut(&partner_id) {
        partner.active_order = None;
        partner.updated_at = Utc::now();
    }

    info!(%order_id, %partner_id, "order delivered");
    Ok(order.clone())
}

/// Cash collection confirmation by the assigned partner, after delivery.
pub fn mark_paid(
    state: &AppState,
    order_id: Uuid,
    partner_id: Uuid,
) -> Result<Order, TransitionError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    require_assigned_partner(&order, partner_id)?;
    if order.status != OrderStatus::Delivered {
        return Err(TransitionError::InvalidStatus {
            from: order.status,
            action: "collect payment for",
        });
    }
    if order.payment_status != PaymentStatus::Pending {
        return Err(TransitionError::PaymentNotPending);
    }

    order.payment_status = PaymentStatus::Paid;
    order.updated_at = Utc::now();

    info!(%order_id, "payment collected");
    Ok(order.clone())
}

/// One rating per order, only after delivery. The `rated` flag flips under
/// the order lock and the partner aggregate is recomputed under the partner
/// lock, so duplicate submissions and concurrent ratings both stay exact.
pub fn submit_rating(
    state: &AppState,
    order_id: Uuid,
    rating: u8,
    comment: Option<String>,
) -> Result<Order, TransitionError> {
    if !(1..=5).contains(&rating) {
        return Err(TransitionError::InvalidRating);
    }

    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    if order.status != OrderStatus::Delivered {
        return Err(TransitionError::InvalidStatus {
            from: order.status,
            action: "rate",
        });
    }
    if order.rated {
        return Err(TransitionError::AlreadyRated);
    }

    let partner_id = order.partner_id.ok_or(TransitionError::NotAssignedPartner)?;

    order.rated = true;
    order.rating = Some(rating);
    order.rating_comment = comment.clone();
    order.updated_at = Utc::now();

    if let Some(mut partner) = state.partners.get_mut(&partner_id) {
        let n = partner.rating_count as f64;
        partner.rating_avg = (partner.rating_avg * n + rating as f64) / (n + 1.0);
        partner.rating_count += 1;
        partner.updated_at = Utc::now();
    }

    state
        .ratings
        .entry(partner_id)
        .or_default()
        .push(RatingEntry {
            order_id,
            partner_id,
            rating,
            comment,
            rated_at: Utc::now(),
        });

    info!(%order_id, %partner_id, rating, "rating submitted");
    Ok(order.clone())
}

fn require_assigned_partner(order: &Order, partner_id: Uuid) -> Result<(), TransitionError> {
    if order.partner_id != Some(partner_id) {
        return Err(TransitionError::NotAssignedPartner);
    }
    Ok(())
}
