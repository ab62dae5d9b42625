use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Courier-partner profile. `rating_avg`/`rating_count` form the running
/// aggregate updated by the rating lifecycle; `active_order` is the claim
/// slot checked when a partner tries to accept a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub active_order: Option<Uuid>,
    pub rating_avg: f64,
    pub rating_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of the append-only ratings log, kept separately from the order
/// document it originated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEntry {
    pub order_id: Uuid,
    pub partner_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}
