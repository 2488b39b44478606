use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EARTH_RADIUS_KM;
use crate::error::SimResult;

/// Main properties of the simulated satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Satellite {
    pub name: String,
    pub orbit_altitude_in_km: f64,
    pub resolution_pixels_per_meter: f64,
}

impl Default for Satellite {
    fn default() -> Self {
        Self {
            name: "WorldView".to_string(),
            orbit_altitude_in_km: 617.0,
            resolution_pixels_per_meter: 3.193,
        }
    }
}

impl Satellite {
    /// Ratio of the slant distance to the scene over the nadir distance for
    /// a view zenith angle.
    ///
    /// Positive root of the chord quadratic between the orbit sphere and the
    /// line of sight, against the mean Earth radius.
    pub fn distance_relative_to_orbit_altitude(&self, view_zenith_in_degrees: f64) -> f64 {
        let r = EARTH_RADIUS_KM;
        let d0 = self.orbit_altitude_in_km;
        let cos_ze = view_zenith_in_degrees.to_radians().cos();

        let d1 = (-2.0 * r * cos_ze
            + (4.0 * r * r * cos_ze * cos_ze + 4.0 * (d0 * d0 + 2.0 * r * d0)).sqrt())
            / 2.0;

        d1 / d0
    }

    /// Effective resolution of a view in pixels per meter. Falls off from
    /// the nadir resolution as the slant distance grows with the zenith
    /// angle.
    pub fn view_pixels_per_meter(&self, view_zenith_in_degrees: f64) -> f64 {
        let zoom_factor = 1.0 / self.distance_relative_to_orbit_altitude(view_zenith_in_degrees);
        self.resolution_pixels_per_meter * zoom_factor
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let satellite = serde_json::from_str(&text)?;
        Ok(satellite)
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Satellite: {}", self.name)?;
        writeln!(f, "altitude (km): {:.1}", self.orbit_altitude_in_km)?;
        write!(
            f,
            "resolution (pixels/m): {:.3}",
            self.resolution_pixels_per_meter
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn nadir_distance_equals_orbit_altitude() {
        let satellite = Satellite::default();
        assert_relative_eq!(
            satellite.distance_relative_to_orbit_altitude(0.0),
            1.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            satellite.view_pixels_per_meter(0.0),
            satellite.resolution_pixels_per_meter,
            epsilon = 1e-9
        );
    }

    #[test]
    fn resolution_strictly_decreases_with_zenith() {
        let satellite = Satellite::default();
        let mut previous = f64::INFINITY;
        for step in 0..90 {
            let zenith = step as f64;
            let ppm = satellite.view_pixels_per_meter(zenith);
            assert!(
                ppm < previous,
                "resolution did not fall at zenith {zenith}: {ppm} >= {previous}"
            );
            previous = ppm;
        }
    }

    #[test]
    fn slant_distance_grows_with_zenith() {
        let satellite = Satellite::default();
        assert!(satellite.distance_relative_to_orbit_altitude(60.0) > 1.5);
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satellite.json");
        let satellite = Satellite {
            name: "Pleiades".to_string(),
            orbit_altitude_in_km: 694.0,
            resolution_pixels_per_meter: 2.0,
        };
        satellite.to_json_file(&path).unwrap();
        let back = Satellite::from_json_file(&path).unwrap();
        assert_eq!(back.name, satellite.name);
        assert_relative_eq!(back.orbit_altitude_in_km, satellite.orbit_altitude_in_km);
    }
}
