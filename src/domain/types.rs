//! Shared types for the geofence service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;

/// Newtype wrapper for vehicle IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        VehicleId(s.to_string())
    }
}

/// Newtype wrapper for zone IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        ZoneId(s.to_string())
    }
}

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Range check: lat in [-90, 90], lon in [-180, 180]
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.lat) || self.lat.is_nan() {
            return Err(ValidationError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) || self.lon.is_nan() {
            return Err(ValidationError::LongitudeOutOfRange(self.lon));
        }
        Ok(())
    }
}

/// Inbound vehicle position report
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationEvent {
    pub vehicle_id: VehicleId,
    pub position: Position,
    pub timestamp: DateTime<Utc>,
    /// Carried through for consumers, not used for geometry
    #[serde(default)]
    pub speed_kmh: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
    /// Client-supplied idempotency key
    #[serde(default)]
    pub event_id: Option<String>,
}

impl LocationEvent {
    /// Field-range validation, applied before any state is read
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vehicle_id.0.is_empty() {
            return Err(ValidationError::EmptyVehicleId);
        }
        self.position.validate()?;
        if let Some(speed) = self.speed_kmh {
            if speed < 0.0 || speed.is_nan() {
                return Err(ValidationError::NegativeSpeed(speed));
            }
        }
        if let Some(heading) = self.heading_deg {
            if !(0.0..=360.0).contains(&heading) || heading.is_nan() {
                return Err(ValidationError::HeadingOutOfRange(heading));
            }
        }
        Ok(())
    }
}

/// Per-vehicle mutable state, created on the first accepted event
#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    /// Current zone membership set
    pub zones: BTreeSet<ZoneId>,
    /// Timestamp of the last accepted event
    pub last_event_ts: Option<DateTime<Utc>>,
    /// Idempotency key of the last accepted event
    pub last_event_id: Option<String>,
    pub last_position: Option<Position>,
    /// Processing wall-clock time of the last accepted event, drives debounce
    pub last_accepted_at: Option<Instant>,
}

/// Small inline set of zone ids; a single event rarely changes
/// membership in more than a couple of zones
pub type ZoneIdVec = SmallVec<[ZoneId; 4]>;

/// Result of processing one accepted event: the membership delta
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub vehicle_id: VehicleId,
    /// Newly entered zones, sorted by id
    pub entered: ZoneIdVec,
    /// Newly exited zones, sorted by id
    pub exited: ZoneIdVec,
    pub at: DateTime<Utc>,
    pub position: Position,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Read-only projection of a vehicle's state for status queries
#[derive(Debug, Clone, Serialize)]
pub struct VehicleStatus {
    pub vehicle_id: VehicleId,
    pub current_zones: Vec<ZoneId>,
    pub last_event_ts: Option<DateTime<Utc>>,
    pub last_position: Option<Position>,
}

/// Rejection before any state read; surfaced to the caller, never retried
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("vehicle_id must not be empty")]
    EmptyVehicleId,
    #[error("speed_kmh {0} must be non-negative")]
    NegativeSpeed(f64),
    #[error("heading_deg {0} out of range [0, 360]")]
    HeadingOutOfRange(f64),
    #[error("timestamp cannot be in the future (skew {skew_secs}s exceeded)")]
    FutureTimestamp { skew_secs: i64 },
}

/// Fatal at startup: the service refuses to serve with an inconsistent registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("duplicate zone id {0}")]
    DuplicateZoneId(ZoneId),
    #[error("zone {0}: polygon needs at least 3 distinct points")]
    DegeneratePolygon(ZoneId),
    #[error("zone {0}: circle radius must be positive")]
    InvalidRadius(ZoneId),
    #[error("zone {id}: {source}")]
    InvalidPosition {
        id: ZoneId,
        #[source]
        source: ValidationError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json() -> &'static str {
        r#"{
            "vehicle_id": "MH12AB1234",
            "position": {"lat": 18.5204, "lon": 73.8567},
            "timestamp": "2025-06-01T10:00:00Z",
            "speed_kmh": 32.5,
            "event_id": "evt-001"
        }"#
    }

    #[test]
    fn test_event_deserialization() {
        let event: LocationEvent = serde_json::from_str(event_json()).unwrap();
        assert_eq!(event.vehicle_id, VehicleId::from("MH12AB1234"));
        assert_eq!(event.position, Position::new(18.5204, 73.8567));
        assert_eq!(event.speed_kmh, Some(32.5));
        assert_eq!(event.heading_deg, None);
        assert_eq!(event.event_id.as_deref(), Some("evt-001"));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{
            "vehicle_id": "v1",
            "position": {"lat": 0.0, "lon": 0.0},
            "timestamp": "2025-06-01T10:00:00Z",
            "bogus": true
        }"#;
        assert!(serde_json::from_str::<LocationEvent>(json).is_err());
    }

    #[test]
    fn test_position_range_validation() {
        assert!(Position::new(90.0, 180.0).validate().is_ok());
        assert!(Position::new(-90.0, -180.0).validate().is_ok());
        assert!(matches!(
            Position::new(90.01, 0.0).validate(),
            Err(ValidationError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            Position::new(0.0, -180.5).validate(),
            Err(ValidationError::LongitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_event_field_validation() {
        let mut event: LocationEvent = serde_json::from_str(event_json()).unwrap();
        event.vehicle_id = VehicleId(String::new());
        assert_eq!(event.validate(), Err(ValidationError::EmptyVehicleId));

        let mut event: LocationEvent = serde_json::from_str(event_json()).unwrap();
        event.speed_kmh = Some(-1.0);
        assert!(matches!(event.validate(), Err(ValidationError::NegativeSpeed(_))));

        let mut event: LocationEvent = serde_json::from_str(event_json()).unwrap();
        event.heading_deg = Some(361.0);
        assert!(matches!(event.validate(), Err(ValidationError::HeadingOutOfRange(_))));
    }

    #[test]
    fn test_transition_serialization() {
        let transition = Transition {
            vehicle_id: VehicleId::from("v1"),
            entered: [ZoneId::from("downtown")].into_iter().collect(),
            exited: ZoneIdVec::new(),
            at: "2025-06-01T10:00:00Z".parse().unwrap(),
            position: Position::new(18.5204, 73.8567),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&transition).unwrap()).unwrap();
        assert_eq!(json["vehicle_id"], "v1");
        assert_eq!(json["entered"], serde_json::json!(["downtown"]));
        assert_eq!(json["exited"], serde_json::json!([]));
    }

    #[test]
    fn test_status_serialization() {
        let status = VehicleStatus {
            vehicle_id: VehicleId::from("MH12AB1234"),
            current_zones: vec![ZoneId::from("airport"), ZoneId::from("downtown")],
            last_event_ts: Some("2025-06-01T10:00:00Z".parse().unwrap()),
            last_position: Some(Position::new(18.5204, 73.8567)),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&status).unwrap()).unwrap();
        assert_eq!(json["vehicle_id"], "MH12AB1234");
        assert_eq!(json["current_zones"], serde_json::json!(["airport", "downtown"]));
        assert_eq!(json["last_event_ts"], "2025-06-01T10:00:00Z");
        assert_eq!(json["last_position"]["lat"], 18.5204);
    }
}
