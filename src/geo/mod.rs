pub mod utm;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// GeoJSON-style polygon footprint in (longitude, latitude) degrees.
///
/// The outer ring is closed, the first and last vertex coincide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aoi {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

/// Projected bounding box of an AOI, all corners expressed in one UTM zone.
#[derive(Debug, Clone, Copy)]
pub struct UtmBbox {
    pub min_easting: f64,
    pub max_easting: f64,
    pub min_northing: f64,
    pub max_northing: f64,
    pub zone_number: u8,
    pub zone_letter: char,
}

impl Aoi {
    /// Axis-aligned rectangular AOI with a closed ring.
    pub fn rectangle(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![vec![
                [lon_min, lat_min],
                [lon_min, lat_max],
                [lon_max, lat_max],
                [lon_max, lat_min],
                [lon_min, lat_min],
            ]],
        }
    }

    /// The outer ring of the polygon.
    pub fn ring(&self) -> SimResult<&[[f64; 2]]> {
        self.coordinates
            .first()
            .filter(|ring| !ring.is_empty())
            .map(|ring| ring.as_slice())
            .ok_or_else(|| SimError::InvalidInput("AOI polygon has no vertices".to_string()))
    }

    /// Bounding-box centroid in (longitude, latitude).
    pub fn lon_lat_center(&self) -> SimResult<(f64, f64)> {
        let ring = self.ring()?;
        let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &[lon, lat] in ring {
            lon_min = lon_min.min(lon);
            lon_max = lon_max.max(lon);
            lat_min = lat_min.min(lat);
            lat_max = lat_max.max(lat);
        }
        Ok(((lon_min + lon_max) / 2.0, (lat_min + lat_max) / 2.0))
    }

    /// Projected bounding box of the ring vertices. The first vertex fixes
    /// the UTM zone for the whole ring.
    pub fn utm_bounding_box(&self) -> SimResult<UtmBbox> {
        let ring = self.ring()?;
        let [lon0, lat0] = ring[0];
        let (e0, n0, zone_number, zone_letter) = utm::from_latlon(lat0, lon0)?;
        let (mut min_e, mut max_e) = (e0, e0);
        let (mut min_n, mut max_n) = (n0, n0);
        for &[lon, lat] in &ring[1..] {
            let (easting, northing) = utm::from_latlon_with_zone(lat, lon, zone_number);
            min_e = min_e.min(easting);
            max_e = max_e.max(easting);
            min_n = min_n.min(northing);
            max_n = max_n.max(northing);
        }
        Ok(UtmBbox {
            min_easting: min_e,
            max_easting: max_e,
            min_northing: min_n,
            max_northing: max_n,
            zone_number,
            zone_letter,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn san_fernando() -> Aoi {
        Aoi::rectangle(
            -58.58923437034032,
            -34.49059476958225,
            -58.58733243810684,
            -34.4891885066768,
        )
    }

    #[test]
    fn center_is_bbox_centroid() {
        let aoi = san_fernando();
        let (lon, lat) = aoi.lon_lat_center().unwrap();
        assert_relative_eq!(lon, (-58.58923437034032 + -58.58733243810684) / 2.0);
        assert_relative_eq!(lat, (-34.49059476958225 + -34.4891885066768) / 2.0);
    }

    #[test]
    fn bounding_box_is_ordered() {
        let bbox = san_fernando().utm_bounding_box().unwrap();
        assert_eq!((bbox.zone_number, bbox.zone_letter), (21, 'H'));
        assert!(bbox.max_easting > bbox.min_easting);
        assert!(bbox.max_northing > bbox.min_northing);
        // the footprint is roughly 175 m x 155 m
        assert!((bbox.max_easting - bbox.min_easting) < 300.0);
        assert!((bbox.max_northing - bbox.min_northing) < 300.0);
    }

    #[test]
    fn empty_polygon_is_rejected() {
        let aoi = Aoi {
            kind: "Polygon".to_string(),
            coordinates: vec![],
        };
        assert!(aoi.lon_lat_center().is_err());
    }

    #[test]
    fn geojson_roundtrip() {
        let aoi = san_fernando();
        let text = serde_json::to_string(&aoi).unwrap();
        assert!(text.contains("\"type\":\"Polygon\""));
        let back: Aoi = serde_json::from_str(&text).unwrap();
        assert_eq!(back.coordinates, aoi.coordinates);
    }
}
