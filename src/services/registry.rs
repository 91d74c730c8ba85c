//! Immutable zone registry, built once at startup
//!
//! Zone ids must be unique and geometry must be well-formed at build time;
//! anything else is a `ConfigError` and the service refuses to start. There
//! is no mutation API - a future zone reload is a full registry replacement.

use crate::domain::types::{ConfigError, ZoneId};
use crate::domain::zone::Zone;
use rustc_hash::FxHashMap;

#[derive(Debug)]
pub struct ZoneRegistry {
    /// Zones in load order
    zones: Vec<Zone>,
    index: FxHashMap<ZoneId, usize>,
}

impl ZoneRegistry {
    /// Build a registry from a validated zone list.
    ///
    /// Fails on duplicate ids and on malformed geometry (degenerate polygon,
    /// non-positive radius, out-of-range coordinates).
    pub fn new(zones: Vec<Zone>) -> Result<Self, ConfigError> {
        let mut index = FxHashMap::default();
        for (i, zone) in zones.iter().enumerate() {
            zone.validate()?;
            if index.insert(zone.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateZoneId(zone.id.clone()));
            }
        }
        Ok(Self { zones, index })
    }

    /// All zones in load order
    pub fn all(&self) -> &[Zone] {
        &self.zones
    }

    pub fn by_id(&self, id: &ZoneId) -> Option<&Zone> {
        self.index.get(id).map(|&i| &self.zones[i])
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Position;
    use crate::domain::zone::ZoneGeometry;

    fn circle(id: &str) -> Zone {
        Zone {
            id: ZoneId::from(id),
            name: id.to_string(),
            geometry: ZoneGeometry::Circle {
                center: Position::new(18.5204, 73.8567),
                radius_m: 500.0,
            },
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ZoneRegistry::new(vec![circle("a"), circle("b")]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].id, ZoneId::from("a"));
        assert!(registry.by_id(&ZoneId::from("b")).is_some());
        assert!(registry.by_id(&ZoneId::from("missing")).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = ZoneRegistry::new(vec![circle("a"), circle("a")]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateZoneId(ZoneId::from("a")));
    }

    #[test]
    fn test_malformed_geometry_rejected() {
        let bad = Zone {
            id: ZoneId::from("bad"),
            name: "bad".to_string(),
            geometry: ZoneGeometry::Polygon {
                points: vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)],
            },
        };
        let err = ZoneRegistry::new(vec![circle("a"), bad]).unwrap_err();
        assert_eq!(err, ConfigError::DegeneratePolygon(ZoneId::from("bad")));
    }
}
