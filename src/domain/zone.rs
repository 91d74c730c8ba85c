//! Zone definitions: named circular or polygonal regions

use crate::domain::types::{ConfigError, Position, ZoneId};
use serde::{Deserialize, Serialize};

/// Geometry of a zone, tagged by `type` in the zone file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ZoneGeometry {
    Circle {
        center: Position,
        radius_m: f64,
    },
    /// Ordered ring of vertices, implicitly closed
    Polygon { points: Vec<Position> },
}

/// A named region used for containment tests; immutable after load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    #[serde(flatten)]
    pub geometry: ZoneGeometry,
}

impl Zone {
    /// Load-time geometry validation; a registry refuses zones that fail this
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.geometry {
            ZoneGeometry::Circle { center, radius_m } => {
                center.validate().map_err(|source| ConfigError::InvalidPosition {
                    id: self.id.clone(),
                    source,
                })?;
                if !(*radius_m > 0.0) {
                    return Err(ConfigError::InvalidRadius(self.id.clone()));
                }
            }
            ZoneGeometry::Polygon { points } => {
                for p in points {
                    p.validate().map_err(|source| ConfigError::InvalidPosition {
                        id: self.id.clone(),
                        source,
                    })?;
                }
                if distinct_points(points) < 3 {
                    return Err(ConfigError::DegeneratePolygon(self.id.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Count distinct vertices; duplicate points collapse a ring below a valid area
pub(crate) fn distinct_points(points: &[Position]) -> usize {
    let mut distinct: Vec<Position> = Vec::with_capacity(points.len());
    for p in points {
        if !distinct.iter().any(|d| d == p) {
            distinct.push(*p);
        }
    }
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_zone_from_json() {
        let json = r#"{
            "id": "downtown",
            "name": "Downtown Pune",
            "type": "circle",
            "center": {"lat": 18.5204, "lon": 73.8567},
            "radius_m": 500.0
        }"#;
        let zone: Zone = serde_json::from_str(json).unwrap();
        assert_eq!(zone.id, ZoneId::from("downtown"));
        assert!(matches!(zone.geometry, ZoneGeometry::Circle { radius_m, .. } if radius_m == 500.0));
        assert!(zone.validate().is_ok());
    }

    #[test]
    fn test_polygon_zone_from_json() {
        let json = r#"{
            "id": "depot",
            "name": "Depot Yard",
            "type": "polygon",
            "points": [
                {"lat": 0.0, "lon": 0.0},
                {"lat": 0.0, "lon": 1.0},
                {"lat": 1.0, "lon": 1.0},
                {"lat": 1.0, "lon": 0.0}
            ]
        }"#;
        let zone: Zone = serde_json::from_str(json).unwrap();
        assert!(matches!(zone.geometry, ZoneGeometry::Polygon { ref points } if points.len() == 4));
        assert!(zone.validate().is_ok());
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let zone = Zone {
            id: ZoneId::from("line"),
            name: "Line".to_string(),
            geometry: ZoneGeometry::Polygon {
                points: vec![
                    Position::new(0.0, 0.0),
                    Position::new(1.0, 1.0),
                    Position::new(0.0, 0.0),
                ],
            },
        };
        assert_eq!(zone.validate(), Err(ConfigError::DegeneratePolygon(ZoneId::from("line"))));
    }

    #[test]
    fn test_zero_radius_rejected() {
        let zone = Zone {
            id: ZoneId::from("dot"),
            name: "Dot".to_string(),
            geometry: ZoneGeometry::Circle {
                center: Position::new(0.0, 0.0),
                radius_m: 0.0,
            },
        };
        assert_eq!(zone.validate(), Err(ConfigError::InvalidRadius(ZoneId::from("dot"))));
    }
}
