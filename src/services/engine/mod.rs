//! Transition engine - event orchestration and state commit
//!
//! The engine is the central event processor that coordinates, per event:
//! - Validation (field ranges, future-timestamp policy) before any state read
//! - Idempotency (duplicate delivery suppressed by the client event id)
//! - Debounce (positional freshness without transition thrash)
//! - Containment evaluation against the zone registry
//! - Membership diff and atomic commit under the per-vehicle lock
//!
//! Events for one vehicle serialize on that vehicle's lock; events for
//! different vehicles proceed independently. No internal retry: a rejected
//! event is reported to the caller and the store is left untouched.


use crate::domain::types::{
    LocationEvent, Transition, ValidationError, VehicleId, VehicleStatus, ZoneId, ZoneIdVec,
};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::geometry;
use crate::services::registry::ZoneRegistry;
use crate::services::store::VehicleStore;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Central event processor for vehicle zone membership
pub struct TransitionEngine {
    registry: Arc<ZoneRegistry>,
    store: Arc<VehicleStore>,
    metrics: Arc<Metrics>,
    /// Minimum processing-clock interval between transition evaluations
    /// for one vehicle
    debounce: Duration,
    /// Tolerated clock skew for event timestamps ahead of processing time
    max_future_skew: chrono::Duration,
}

impl TransitionEngine {
    pub fn new(
        config: &Config,
        registry: Arc<ZoneRegistry>,
        store: Arc<VehicleStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            store,
            metrics,
            debounce: Duration::from_millis(config.debounce_ms()),
            max_future_skew: chrono::Duration::seconds(config.max_future_skew_secs()),
        }
    }

    /// Process one position report and return the membership delta.
    ///
    /// An event producing no membership change still returns an (empty)
    /// transition and advances the vehicle's timestamp, event id, and
    /// position.
    pub fn process_event(&self, event: &LocationEvent) -> Result<Transition, ValidationError> {
        let process_start = Instant::now();

        // Validation is a strict precondition, checked before idempotency and
        // debounce; a rejected event never touches the store
        if let Err(e) = self.validate(event) {
            self.metrics.record_event_rejected();
            debug!(vehicle = %event.vehicle_id, error = %e, "event_rejected");
            return Err(e);
        }

        let entry = self.store.entry(&event.vehicle_id);
        let mut state = entry.lock();

        // Duplicate delivery: same idempotency key as the last accepted event
        if let (Some(event_id), Some(last_id)) = (&event.event_id, &state.last_event_id) {
            if event_id == last_id {
                drop(state);
                self.metrics.record_event_duplicate();
                self.metrics.record_event_processed(process_start.elapsed().as_micros() as u64);
                debug!(vehicle = %event.vehicle_id, event_id = %event_id, "duplicate_delivery");
                return Ok(Self::empty_transition(event));
            }
        }

        let now = Instant::now();

        // Debounce: the position, timestamp, and event id still advance so
        // status queries reflect the latest known location, but zone
        // re-evaluation and transition emission are skipped
        if let Some(last_accepted) = state.last_accepted_at {
            if now.duration_since(last_accepted) < self.debounce {
                state.last_event_ts = Some(event.timestamp);
                state.last_position = Some(event.position);
                state.last_accepted_at = Some(now);
                if event.event_id.is_some() {
                    state.last_event_id = event.event_id.clone();
                }
                drop(state);
                self.metrics.record_event_debounced();
                self.metrics.record_event_processed(process_start.elapsed().as_micros() as u64);
                debug!(vehicle = %event.vehicle_id, "event_debounced");
                return Ok(Self::empty_transition(event));
            }
        }

        // Evaluate membership against every zone; a malformed zone fails
        // closed inside `contains` and cannot abort the event
        let new_zones: BTreeSet<ZoneId> = self
            .registry
            .all()
            .iter()
            .filter(|zone| geometry::contains(zone, event.position))
            .map(|zone| zone.id.clone())
            .collect();

        let entered: ZoneIdVec = new_zones.difference(&state.zones).cloned().collect();
        let exited: ZoneIdVec = state.zones.difference(&new_zones).cloned().collect();

        // Commit: single-step replacement while still holding the vehicle
        // lock, so the read-evaluate-commit cycle is linearized per vehicle
        state.zones = new_zones;
        state.last_event_ts = Some(event.timestamp);
        state.last_event_id = event.event_id.clone();
        state.last_position = Some(event.position);
        state.last_accepted_at = Some(now);
        drop(state);

        for zone_id in &entered {
            self.metrics.zone_enter(zone_id);
        }
        for zone_id in &exited {
            self.metrics.zone_exit(zone_id);
        }

        let transition = Transition {
            vehicle_id: event.vehicle_id.clone(),
            entered,
            exited,
            at: event.timestamp,
            position: event.position,
        };

        if !transition.is_empty() {
            self.metrics.record_transition();
            info!(
                vehicle = %transition.vehicle_id,
                entered = ?transition.entered,
                exited = ?transition.exited,
                lat = %event.position.lat,
                lon = %event.position.lon,
                ts = %event.timestamp,
                "zone_transition"
            );
        }

        self.metrics.record_event_processed(process_start.elapsed().as_micros() as u64);
        Ok(transition)
    }

    /// Read-only projection of a vehicle's latest committed state.
    ///
    /// `None` for a vehicle never observed - a normal outcome, not a failure.
    pub fn status(&self, vehicle_id: &VehicleId) -> Option<VehicleStatus> {
        let state = self.store.snapshot(vehicle_id)?;
        Some(VehicleStatus {
            vehicle_id: vehicle_id.clone(),
            current_zones: state.zones.into_iter().collect(),
            last_event_ts: state.last_event_ts,
            last_position: state.last_position,
        })
    }

    /// Number of vehicles observed so far
    pub fn active_vehicles(&self) -> usize {
        self.store.len()
    }

    fn validate(&self, event: &LocationEvent) -> Result<(), ValidationError> {
        event.validate()?;
        if event.timestamp > Utc::now() + self.max_future_skew {
            return Err(ValidationError::FutureTimestamp {
                skew_secs: self.max_future_skew.num_seconds(),
            });
        }
        Ok(())
    }

    fn empty_transition(event: &LocationEvent) -> Transition {
        Transition {
            vehicle_id: event.vehicle_id.clone(),
            entered: ZoneIdVec::new(),
            exited: ZoneIdVec::new(),
            at: event.timestamp,
            position: event.position,
        }
    }
}
