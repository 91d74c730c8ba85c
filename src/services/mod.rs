//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `geometry` - Planar containment checks over WGS84 positions
//! - `registry` - Immutable zone registry, validated at startup
//! - `store` - Per-vehicle state store with sharded locking
//! - `engine` - Transition engine tying validation, debounce, and commit together

pub mod engine;
pub mod geometry;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use engine::TransitionEngine;
pub use registry::ZoneRegistry;
pub use store::VehicleStore;
