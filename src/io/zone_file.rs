//! Zone definition file loading
//!
//! Zones are read once at startup from a JSON file and never reloaded;
//! the registry built from them is immutable for the process lifetime.

use crate::domain::zone::Zone;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ZoneFile {
    zones: Vec<Zone>,
}

/// Load zone definitions from a JSON file of the shape `{"zones": [...]}`
pub fn load_zones(path: &Path) -> anyhow::Result<Vec<Zone>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read zone file: {}", path.display()))?;
    let file: ZoneFile = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse zone file: {}", path.display()))?;
    Ok(file.zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ZoneId;
    use crate::domain::zone::ZoneGeometry;
    use std::io::Write;

    #[test]
    fn test_load_zones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "zones": [
                    {{
                        "id": "downtown",
                        "name": "Downtown Pune",
                        "type": "circle",
                        "center": {{"lat": 18.5204, "lon": 73.8567}},
                        "radius_m": 500.0
                    }},
                    {{
                        "id": "depot",
                        "name": "Bus Depot",
                        "type": "polygon",
                        "points": [
                            {{"lat": 18.50, "lon": 73.85}},
                            {{"lat": 18.51, "lon": 73.85}},
                            {{"lat": 18.51, "lon": 73.86}},
                            {{"lat": 18.50, "lon": 73.86}}
                        ]
                    }}
                ]
            }}"#
        )
        .unwrap();

        let zones = load_zones(file.path()).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].id, ZoneId::from("downtown"));
        assert!(matches!(zones[0].geometry, ZoneGeometry::Circle { .. }));
        assert!(matches!(zones[1].geometry, ZoneGeometry::Polygon { .. }));
    }

    #[test]
    fn test_missing_file_errors() {
        let err = load_zones(Path::new("/nonexistent/zones.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read zone file"));
    }

    #[test]
    fn test_malformed_json_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_zones(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse zone file"));
    }
}
