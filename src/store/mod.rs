use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::models::partner::GeoPoint;
use crate::models::tracking::{TrackingRecord, UserLocation};

/// Keyed realtime store with push subscriptions, standing in for the hosted
/// key-value sync backend. Two namespaces: user locations keyed by user id
/// and tracking records keyed by order id. Writes are last-write-wins per
/// key; every write pushes the full snapshot to that key's subscribers.
///
/// Write operations return a success flag rather than an error: callers
/// treat a failed location write as "retry or ignore", never as fatal.
pub struct RealtimeStore {
    user_locations: DashMap<Uuid, UserLocation>,
    tracking: DashMap<Uuid, TrackingRecord>,
    user_channels: DashMap<Uuid, broadcast::Sender<UserLocation>>,
    tracking_channels: DashMap<Uuid, broadcast::Sender<TrackingRecord>>,
    channel_capacity: usize,
}

impl RealtimeStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            user_locations: DashMap::new(),
            tracking: DashMap::new(),
            user_channels: DashMap::new(),
            tracking_channels: DashMap::new(),
            channel_capacity,
        }
    }

    pub fn set_user_location(&self, user_id: Uuid, position: GeoPoint) -> bool {
        let record = UserLocation {
            position,
            updated_at: Utc::now(),
        };

        self.user_locations.insert(user_id, record.clone());
        self.push_user(user_id, record);
        true
    }

    pub fn user_location(&self, user_id: Uuid) -> Option<UserLocation> {
        self.user_locations.get(&user_id).map(|r| r.clone())
    }

    /// Every update to the key is pushed to the returned receiver until it
    /// is dropped. Subscribers to the same key are independent.
    pub fn subscribe_user_location(&self, user_id: Uuid) -> broadcast::Receiver<UserLocation> {
        self.user_channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    pub fn set_tracking(&self, record: TrackingRecord) -> bool {
        let order_id = record.order_id;
        self.tracking.insert(order_id, record.clone());
        self.push_tracking(order_id, record);
        true
    }

    pub fn tracking(&self, order_id: Uuid) -> Option<TrackingRecord> {
        self.tracking.get(&order_id).map(|r| r.clone())
    }

    /// Partial-merge write: mutates the stored record under its entry lock,
    /// then pushes the merged snapshot. Returns the snapshot, or `None` if
    /// no record exists for the order.
    pub fn update_tracking(
        &self,
        order_id: Uuid,
        apply: impl FnOnce(&mut TrackingRecord),
    ) -> Option<TrackingRecord> {
        let snapshot = {
            let mut entry = self.tracking.get_mut(&order_id)?;
            apply(&mut entry);
            entry.updated_at = Utc::now();
            entry.clone()
        };

        self.push_tracking(order_id, snapshot.clone());
        Some(snapshot)
    }

    pub fn subscribe_tracking(&self, order_id: Uuid) -> broadcast::Receiver<TrackingRecord> {
        self.tracking_channels
            .entry(order_id)
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    fn push_user(&self, user_id: Uuid, record: UserLocation) {
        if let Some(tx) = self.user_channels.get(&user_id) {
            // No receivers is fine; a lagging receiver only loses old snapshots.
            if tx.receiver_count() > 0 && tx.send(record).is_err() {
                warn!(%user_id, "user location push dropped");
            }
        }
    }

    fn push_tracking(&self, order_id: Uuid, record: TrackingRecord) {
        if let Some(tx) = self.tracking_channels.get(&order_id) {
            if tx.receiver_count() > 0 && tx.send(record).is_err() {
                warn!(%order_id, "tracking push dropped");
            }
        }
    }
}
