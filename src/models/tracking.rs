use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;
use crate::models::partner::GeoPoint;

/// Best-effort location/progress projection for an order. Lives in the
/// realtime store under its own key and may lag the authoritative order
/// document; each write replaces the whole snapshot (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub order_id: Uuid,
    pub pickup_coords: GeoPoint,
    pub delivery_coords: GeoPoint,
    pub route: Vec<GeoPoint>,
    pub current_position: GeoPoint,
    pub status: OrderStatus,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
}

/// Single coordinate fix for a user, upserted on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLocation {
    pub position: GeoPoint,
    pub updated_at: DateTime<Utc>,
}
