use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::partner::{GeoPoint, Partner, RatingEntry};
use crate::models::tracking::UserLocation;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/partners", post(create_partner).get(list_partners))
        .route("/partners/:id", get(get_partner))
        .route("/partners/:id/ratings", get(list_ratings))
        .route(
            "/partners/:id/location",
            patch(update_location).get(get_location),
        )
}

#[derive(Deserialize)]
pub struct CreatePartnerRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn create_partner(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePartnerRequest>,
) -> Result<Json<Partner>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let partner = Partner {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        active_order: None,
        rating_avg: 0.0,
        rating_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    state.partners.insert(partner.id, partner.clone());
    Ok(Json(partner))
}

async fn list_partners(State(state): State<Arc<AppState>>) -> Json<Vec<Partner>> {
    let partners = state
        .partners
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(partners)
}

async fn get_partner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Partner>, AppError> {
    let partner = state
        .partners
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("partner {} not found", id)))?;

    Ok(Json(partner.value().clone()))
}

async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RatingEntry>>, AppError> {
    if !state.partners.contains_key(&id) {
        return Err(AppError::NotFound(format!("partner {} not found", id)));
    }

    let entries = state
        .ratings
        .get(&id)
        .map(|log| log.clone())
        .unwrap_or_default();
    Ok(Json(entries))
}

/// Partner location feeds the tracking coordinator when a delivery starts;
/// the write goes through the realtime store so subscribers see it pushed.
async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<UserLocation>, AppError> {
    if !state.partners.contains_key(&id) {
        return Err(AppError::NotFound(format!("partner {} not found", id)));
    }

    if !state.store.set_user_location(id, payload.location) {
        return Err(AppError::Internal("location write failed".to_string()));
    }

    state
        .store
        .user_location(id)
        .map(Json)
        .ok_or_else(|| AppError::Internal("location write not visible".to_string()))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserLocation>, AppError> {
    state
        .store
        .user_location(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no location for partner {}", id)))
}
