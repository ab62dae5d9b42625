use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::lifecycle::{self, TransitionError};
use crate::models::order::{
    Order, OrderStatus, PackageInfo, PaymentMethod, PaymentStatus, Recipient,
};
use crate::models::tracking::TrackingRecord;
use crate::pricing;
use crate::state::AppState;
use crate::tracking;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/otp", get(get_otp))
        .route("/orders/:id/tracking", get(get_tracking))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/start", post(start_delivery))
        .route("/orders/:id/verify-otp", post(verify_otp))
        .route("/orders/:id/complete", post(complete_delivery))
        .route("/orders/:id/payment", post(collect_payment))
        .route("/orders/:id/rating", post(submit_rating))
        .route(
            "/orders/:id/simulate",
            post(start_simulation).delete(stop_simulation),
        )
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub pickup_address: String,
    pub delivery_address: String,
    pub package: PackageInfo,
    pub recipient: Recipient,
    #[serde(default)]
    pub express: bool,
    #[serde(default)]
    pub scheduled: bool,
    #[serde(default)]
    pub return_delivery: bool,
}

#[derive(Deserialize)]
pub struct PartnerActionRequest {
    pub partner_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub partner_id: Uuid,
    pub otp: String,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct SimulateRequest {
    #[serde(default = "default_speed")]
    pub speed_factor: u8,
}

fn default_speed() -> u8 {
    1
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.pickup_address.trim().is_empty() || payload.delivery_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup and delivery addresses are required".to_string(),
        ));
    }
    if payload.package.weight_kg <= 0.0 {
        return Err(AppError::BadRequest(
            "package weight must be positive".to_string(),
        ));
    }
    if payload.recipient.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "recipient name is required".to_string(),
        ));
    }
    if !is_valid_phone(&payload.recipient.phone) {
        return Err(AppError::BadRequest(
            "recipient phone must be 10 digits".to_string(),
        ));
    }

    let geocode_start = Instant::now();
    let pickup_coords = state
        .resolver
        .resolve(&payload.pickup_address)
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    let delivery_coords = state
        .resolver
        .resolve(&payload.delivery_address)
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    state
        .metrics
        .geocode_seconds
        .observe(geocode_start.elapsed().as_secs_f64());

    let distance_km = geo::distance_km(&pickup_coords, &delivery_coords);
    let price = pricing::compute_price(
        payload.package.size,
        payload.package.weight_kg,
        distance_km,
        payload.express,
        payload.scheduled,
        payload.return_delivery,
    );

    let order = Order {
        id: Uuid::new_v4(),
        pickup_address: payload.pickup_address.clone(),
        delivery_address: payload.delivery_address.clone(),
        pickup_coords,
        delivery_coords,
        distance_km,
        package: payload.package,
        recipient: payload.recipient,
        price,
        payment_method: PaymentMethod::CashOnDelivery,
        payment_status: PaymentStatus::Pending,
        status: OrderStatus::Pending,
        partner_id: None,
        otp: None,
        otp_verified: false,
        rated: false,
        rating: None,
        rating_comment: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        in_transit_at: None,
        delivered_at: None,
    };

    state.orders.insert(order.id, order.clone());
    state.metrics.orders_created_total.inc();

    // Tracking is a best-effort projection; a failed seed leaves the order
    // itself intact.
    if !tracking::initialize_tracking(
        &state,
        order.id,
        &payload.pickup_address,
        &payload.delivery_address,
    )
    .await
    {
        warn!(order_id = %order.id, "order created without tracking record");
    }

    Ok(Json(order))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    let orders = state.orders.iter().map(|entry| entry.value().clone()).collect();
    Json(orders)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}

/// Customer-side display of the delivery code.
async fn get_otp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    match &order.otp {
        Some(otp) => Ok(Json(json!({ "otp": otp }))),
        None => Err(AppError::Conflict(
            "no delivery code issued yet".to_string(),
        )),
    }
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingRecord>, AppError> {
    state
        .store
        .tracking(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no tracking record for order {}", id)))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerActionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = observe_transition(&state, "assigned", || {
        lifecycle::accept(&state, id, payload.partner_id)
    })?;

    tracking::advance(&state, id, OrderStatus::Assigned, 0);
    Ok(Json(order))
}

async fn start_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerActionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = observe_transition(&state, "in_transit", || {
        lifecycle::start(&state, id, payload.partner_id)
    })?;

    tracking::advance(&state, id, OrderStatus::InTransit, 0);
    Ok(Json(order))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<Order>, AppError> {
    match lifecycle::verify_otp(&state, id, payload.partner_id, &payload.otp) {
        Ok(order) => {
            state
                .metrics
                .otp_verifications_total
                .with_label_values(&["success"])
                .inc();
            Ok(Json(order))
        }
        Err(err) => {
            let outcome = if err == TransitionError::OtpMismatch {
                "mismatch"
            } else {
                "rejected"
            };
            state
                .metrics
                .otp_verifications_total
                .with_label_values(&[outcome])
                .inc();
            Err(err.into())
        }
    }
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerActionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = observe_transition(&state, "delivered", || {
        lifecycle::complete(&state, id, payload.partner_id)
    })?;

    tracking::advance(&state, id, OrderStatus::Delivered, 100);
    Ok(Json(order))
}

async fn collect_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerActionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = lifecycle::mark_paid(&state, id, payload.partner_id)?;
    Ok(Json(order))
}

async fn submit_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<Order>, AppError> {
    let order = lifecycle::submit_rating(&state, id, payload.rating, payload.comment)?;
    Ok(Json(order))
}

async fn start_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SimulateRequest>,
) -> Result<Json<Value>, AppError> {
    if state.store.tracking(id).is_none() {
        return Err(AppError::NotFound(format!(
            "no tracking record for order {}",
            id
        )));
    }

    if !tracking::start_simulation(state.clone(), id, payload.speed_factor) {
        return Err(AppError::Conflict(
            "simulation already running for this order".to_string(),
        ));
    }

    Ok(Json(json!({ "running": true })))
}

async fn stop_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (_, handle) = state
        .simulations
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("no running simulation for order {}", id)))?;

    handle.stop();
    Ok(Json(json!({ "running": false })))
}

fn observe_transition(
    state: &AppState,
    to: &str,
    apply: impl FnOnce() -> Result<Order, TransitionError>,
) -> Result<Order, TransitionError> {
    let result = apply();
    let outcome = if result.is_ok() { "success" } else { "rejected" };
    state
        .metrics
        .transitions_total
        .with_label_values(&[to, outcome])
        .inc();
    result
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}
