use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::geo::Aoi;

/// Scene footprint and the origin of its local coordinate system.
///
/// The origin anchors the renderer's world zero and the RPC fit; when not
/// given it defaults to the AOI center at the middle of the altitude range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub aoi: Aoi,
    /// Min and max altitude in meters over the reference ellipsoid.
    pub altitude_range: [f64; 2],
    pub lon_lat_alt_origin: [f64; 3],
}

impl Default for Location {
    fn default() -> Self {
        let aoi = Aoi::rectangle(
            -58.58923437034032,
            -34.49059476958225,
            -58.58733243810684,
            -34.4891885066768,
        );
        Self::new("San Fernando".to_string(), aoi, [-100.0, 100.0], None)
            .expect("default AOI is well formed")
    }
}

impl Location {
    pub fn new(
        name: String,
        aoi: Aoi,
        altitude_range: [f64; 2],
        lon_lat_alt_origin: Option<[f64; 3]>,
    ) -> SimResult<Self> {
        let lon_lat_alt_origin = match lon_lat_alt_origin {
            Some(origin) => origin,
            None => {
                let (lon, lat) = aoi.lon_lat_center()?;
                [lon, lat, (altitude_range[0] + altitude_range[1]) / 2.0]
            }
        };
        Ok(Self {
            name,
            aoi,
            altitude_range,
            lon_lat_alt_origin,
        })
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let location = serde_json::from_str(&text)?;
        Ok(location)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Location: {}", self.name)?;
        writeln!(f, "altitude_range (m): {:?}", self.altitude_range)?;
        write!(f, "origin (lon, lat, alt): {:?}", self.lon_lat_alt_origin)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn default_origin_is_aoi_center_at_mid_altitude() {
        let location = Location::default();
        let (lon, lat) = location.aoi.lon_lat_center().unwrap();
        assert_relative_eq!(location.lon_lat_alt_origin[0], lon);
        assert_relative_eq!(location.lon_lat_alt_origin[1], lat);
        assert_relative_eq!(location.lon_lat_alt_origin[2], 0.0);
    }

    #[test]
    fn explicit_origin_is_kept() {
        let location = Location::new(
            "test".to_string(),
            Location::default().aoi,
            [-5.0, 35.0],
            Some([-58.5881805419922, -34.4899978637695, 0.0]),
        )
        .unwrap();
        assert_relative_eq!(location.lon_lat_alt_origin[0], -58.5881805419922);
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("location.json");
        let location = Location::default();
        location.to_json_file(&path).unwrap();
        let back = Location::from_json_file(&path).unwrap();
        assert_eq!(back.name, location.name);
        assert_eq!(back.aoi.coordinates, location.aoi.coordinates);
        assert_relative_eq!(back.altitude_range[0], location.altitude_range[0]);
    }
}
