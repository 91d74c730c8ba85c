//! Per-vehicle state store with per-vehicle mutual exclusion
//!
//! The map itself is guarded by an RwLock taken only long enough to find or
//! insert a vehicle's entry; each entry carries its own Mutex so events for
//! one vehicle serialize while events for different vehicles proceed
//! independently. State is retained for the process lifetime, never expired.

use crate::domain::types::{VehicleId, VehicleState};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct VehicleStore {
    vehicles: RwLock<FxHashMap<VehicleId, Arc<Mutex<VehicleState>>>>,
}

impl VehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a vehicle, created with empty state on first sight.
    ///
    /// The caller locks the returned entry for the duration of one event's
    /// read-evaluate-commit cycle; the commit is whatever state the closure
    /// of that lock leaves behind, so it is atomic by construction.
    pub fn entry(&self, vehicle_id: &VehicleId) -> Arc<Mutex<VehicleState>> {
        if let Some(entry) = self.vehicles.read().get(vehicle_id) {
            return entry.clone();
        }
        let mut vehicles = self.vehicles.write();
        vehicles
            .entry(vehicle_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(VehicleState::default())))
            .clone()
    }

    /// Snapshot of the latest committed state, `None` for a vehicle never
    /// observed. Blocks only behind an in-flight write for the same vehicle.
    pub fn snapshot(&self, vehicle_id: &VehicleId) -> Option<VehicleState> {
        let entry = self.vehicles.read().get(vehicle_id).cloned()?;
        let state = entry.lock();
        Some(state.clone())
    }

    /// Number of vehicles observed so far
    pub fn len(&self) -> usize {
        self.vehicles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.read().is_empty()
    }
}
