use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::partner::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
}

impl OrderStatus {
    /// Position in the pending -> assigned -> in-transit -> delivered chain.
    /// Status never moves to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Assigned => 1,
            OrderStatus::InTransit => 2,
            OrderStatus::Delivered => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSize {
    Small,
    Medium,
    Large,
}

/// Only cash on delivery is live; the other methods exist so stored orders
/// keep their meaning once those rails are switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Upi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub size: PackageSize,
    pub weight_kg: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

/// Charges are kept fractional; only the final total is rounded (up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: f64,
    pub weight_charge: f64,
    pub distance_charge: f64,
    pub express_surcharge: f64,
    pub scheduled_surcharge: f64,
    pub return_surcharge: f64,
    pub discount_percent: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_coords: GeoPoint,
    pub delivery_coords: GeoPoint,
    pub distance_km: f64,
    pub package: PackageInfo,
    pub recipient: Recipient,
    pub price: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub partner_id: Option<Uuid>,
    pub otp: Option<String>,
    pub otp_verified: bool,
    pub rated: bool,
    pub rating: Option<u8>,
    pub rating_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}
