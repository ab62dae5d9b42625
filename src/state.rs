use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::geo::resolver::AddressResolver;
use crate::models::order::Order;
use crate::models::partner::{Partner, RatingEntry};
use crate::models::tracking::TrackingRecord;
use crate::observability::metrics::Metrics;
use crate::store::RealtimeStore;
use crate::tracking::SimulationHandle;

pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub partners: DashMap<Uuid, Partner>,
    /// Append-only ratings log, keyed by partner.
    pub ratings: DashMap<Uuid, Vec<RatingEntry>>,
    pub store: RealtimeStore,
    pub resolver: AddressResolver,
    /// One running simulation per order at most; the handle owns the task.
    pub simulations: DashMap<Uuid, SimulationHandle>,
    pub tracking_events_tx: broadcast::Sender<TrackingRecord>,
    pub sim_tick_ms: u64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, sim_tick_ms: u64, geocode_delay_ms: u64) -> Self {
        let (tracking_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            orders: DashMap::new(),
            partners: DashMap::new(),
            ratings: DashMap::new(),
            store: RealtimeStore::new(event_buffer_size),
            resolver: AddressResolver::new(geocode_delay_ms),
            simulations: DashMap::new(),
            tracking_events_tx,
            sim_tick_ms,
            metrics: Metrics::new(),
        }
    }
}
