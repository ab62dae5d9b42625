//! Order tracking coordinator: seeds the tracking record for a new order,
//! advances its progress, and drives the demo simulation loop. Tracking is
//! a best-effort projection of the authoritative order document; every
//! failure here degrades to a logged `false`, never a panic or an error
//! bubbled into a request handler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::geo;
use crate::models::order::OrderStatus;
use crate::models::partner::GeoPoint;
use crate::models::tracking::TrackingRecord;
use crate::state::AppState;

const ROUTE_POINTS: usize = 8;

/// Progress past which a simulated delivery is considered on the road.
const IN_TRANSIT_THRESHOLD: u8 = 5;

/// Owns a running simulation task. `stop` cancels it through the watch
/// channel the task selects on; dropping the handle closes that channel,
/// which cancels the task on its next poll as well.
pub struct SimulationHandle {
    stop_tx: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl SimulationHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Geocode both endpoints, build a mock route and write the initial
/// tracking record (progress 0, position at pickup). Re-initialization
/// overwrites any previous record for the order.
pub async fn initialize_tracking(
    state: &AppState,
    order_id: Uuid,
    pickup_address: &str,
    delivery_address: &str,
) -> bool {
    let pickup = match state.resolver.resolve(pickup_address).await {
        Ok(point) => point,
        Err(err) => {
            warn!(%order_id, error = %err, "pickup address resolution failed");
            return false;
        }
    };
    let delivery = match state.resolver.resolve(delivery_address).await {
        Ok(point) => point,
        Err(err) => {
            warn!(%order_id, error = %err, "delivery address resolution failed");
            return false;
        }
    };

    let record = TrackingRecord {
        order_id,
        pickup_coords: pickup,
        delivery_coords: delivery,
        route: geo::mock_route(&pickup, &delivery, ROUTE_POINTS),
        current_position: pickup,
        status: OrderStatus::Pending,
        progress: 0,
        updated_at: Utc::now(),
    };

    if !state.store.set_tracking(record.clone()) {
        warn!(%order_id, "initial tracking write failed");
        return false;
    }

    state.metrics.tracking_writes_total.inc();
    let _ = state.tracking_events_tx.send(record);
    info!(%order_id, "tracking initialized");
    true
}

/// Move the tracking record to `new_status` at `progress` percent.
/// Progress is clamped to 0..=100 and never regresses, and the status
/// mirror only moves forward along the lifecycle. Position follows
/// the route by linear index: pickup at 0, delivery at 100, otherwise
/// `route[floor(progress/100 * (len-1))]`. Returns false when the order
/// has no tracking record.
pub fn advance(state: &AppState, order_id: Uuid, new_status: OrderStatus, progress: u8) -> bool {
    let entering_transit = new_status == OrderStatus::InTransit;

    // When the partner goes on the road, their last reported location (if
    // any) is a better starting point than the route interpolation.
    let partner_position = if entering_transit {
        state
            .orders
            .get(&order_id)
            .and_then(|order| order.partner_id)
            .and_then(|partner_id| state.store.user_location(partner_id))
            .map(|loc| loc.position)
    } else {
        None
    };

    let snapshot = state.store.update_tracking(order_id, |record| {
        let progress = progress.min(100).max(record.progress);

        record.current_position = if progress == 0 {
            record.pickup_coords
        } else if progress >= 100 {
            record.delivery_coords
        } else if entering_transit && record.status != OrderStatus::InTransit {
            partner_position.unwrap_or_else(|| route_position(record, progress))
        } else {
            route_position(record, progress)
        };

        record.progress = progress;
        // The status mirror is as monotonic as the order itself.
        if new_status.rank() >= record.status.rank() {
            record.status = new_status;
        }
    });

    match snapshot {
        Some(record) => {
            state.metrics.tracking_writes_total.inc();
            let _ = state.tracking_events_tx.send(record);
            true
        }
        None => {
            warn!(%order_id, "advance on order without tracking record");
            false
        }
    }
}

fn route_position(record: &TrackingRecord, progress: u8) -> GeoPoint {
    let index = (progress as f64 / 100.0 * (record.route.len() - 1) as f64).floor() as usize;
    record.route[index]
}

/// Self-driving demo loop: every `sim_tick_ms / speed_factor` milliseconds
/// progress grows by `speed_factor`, the status flips to in-transit past
/// the threshold and to delivered at 100, where the task exits and removes
/// itself from the simulation table. Returns false if the order has no
/// tracking record or a simulation is already running.
pub fn start_simulation(state: Arc<AppState>, order_id: Uuid, speed_factor: u8) -> bool {
    use dashmap::mapref::entry::Entry;

    if state.store.tracking(order_id).is_none() {
        warn!(%order_id, "simulation requested without tracking record");
        return false;
    }

    let entry = match state.simulations.entry(order_id) {
        Entry::Occupied(_) => return false,
        Entry::Vacant(vacant) => vacant,
    };

    let speed = speed_factor.clamp(1, 100);
    let period = Duration::from_millis((state.sim_tick_ms / speed as u64).max(1));
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task_state = state.clone();
    let task = tokio::spawn(async move {
        info!(%order_id, speed, "simulation started");

        loop {
            tokio::select! {
                _ = sleep(period) => {}
                _ = stop_rx.changed() => {
                    info!(%order_id, "simulation stopped");
                    break;
                }
            }

            let Some(record) = task_state.store.tracking(order_id) else {
                warn!(%order_id, "tracking record vanished; stopping simulation");
                break;
            };

            let progress = record.progress.saturating_add(speed).min(100);
            let status = if progress >= 100 {
                OrderStatus::Delivered
            } else if progress > IN_TRANSIT_THRESHOLD {
                OrderStatus::InTransit
            } else {
                record.status
            };

            task_state.metrics.simulation_ticks_total.inc();
            advance(&task_state, order_id, status, progress);

            if progress >= 100 {
                info!(%order_id, "simulation delivered");
                break;
            }
        }

        task_state.simulations.remove(&order_id);
        task_state.metrics.active_simulations.dec();
    });

    entry.insert(SimulationHandle {
        stop_tx,
        _task: task,
    });
    state.metrics.active_simulations.inc();
    true
}
