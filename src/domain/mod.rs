//! Domain models - core geofence data types
//!
//! This module contains the canonical data types used throughout the system:
//! - `LocationEvent` - inbound vehicle position report
//! - `VehicleState` - per-vehicle membership set and last-event bookkeeping
//! - `Transition` - enter/exit delta produced by one accepted event
//! - `Zone` / `ZoneGeometry` - named circular or polygonal regions
//! - `ValidationError` / `ConfigError` - rejection and startup-failure taxonomy

pub mod types;
pub mod zone;
