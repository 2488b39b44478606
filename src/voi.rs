use ndarray::Array3;

use crate::error::{SimError, SimResult};
use crate::geo::{utm, Aoi};

/// Regular 3D sampling of the volume of interest: the projected bounding box
/// of the AOI crossed with the altitude range.
///
/// All grids share the shape (eastings, northings, altitudes), easting-major.
/// Geodetic and projected coordinates are kept side by side so calibration
/// correspondences can be formed without re-projecting.
#[derive(Debug, Clone)]
pub struct VoiMesh {
    pub longitudes: Array3<f64>,
    pub latitudes: Array3<f64>,
    pub altitudes: Array3<f64>,
    pub eastings: Array3<f64>,
    pub northings: Array3<f64>,
    pub zone_number: u8,
    pub zone_letter: char,
}

/// Sequence start, start+step, ... up to (excluding) stop.
///
/// Mesh axes are built with stop = max + step, which includes the upper
/// bound of the range.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

impl VoiMesh {
    pub fn build(
        aoi: &Aoi,
        altitude_range: [f64; 2],
        horizontal_resolution: f64,
        vertical_resolution: f64,
    ) -> SimResult<Self> {
        if horizontal_resolution <= 0.0 || vertical_resolution <= 0.0 {
            return Err(SimError::InvalidInput(format!(
                "mesh resolutions must be positive, got {horizontal_resolution} m and {vertical_resolution} m"
            )));
        }

        let bbox = aoi.utm_bounding_box()?;
        if bbox.max_easting <= bbox.min_easting || bbox.max_northing <= bbox.min_northing {
            return Err(SimError::DegenerateGeometry(format!(
                "AOI projects to a zero-area bounding box ({:.3} m x {:.3} m)",
                bbox.max_easting - bbox.min_easting,
                bbox.max_northing - bbox.min_northing
            )));
        }
        let [h_min, h_max] = altitude_range;
        if h_max <= h_min {
            return Err(SimError::DegenerateGeometry(format!(
                "altitude range [{h_min}, {h_max}] has no height"
            )));
        }

        let easting_axis = arange(
            bbox.min_easting,
            bbox.max_easting + horizontal_resolution,
            horizontal_resolution,
        );
        let northing_axis = arange(
            bbox.min_northing,
            bbox.max_northing + horizontal_resolution,
            horizontal_resolution,
        );
        let altitude_axis = arange(h_min, h_max + vertical_resolution, vertical_resolution);

        let shape = (easting_axis.len(), northing_axis.len(), altitude_axis.len());
        let eastings = Array3::from_shape_fn(shape, |(i, _, _)| easting_axis[i]);
        let northings = Array3::from_shape_fn(shape, |(_, j, _)| northing_axis[j]);
        let altitudes = Array3::from_shape_fn(shape, |(_, _, k)| altitude_axis[k]);

        // one inverse projection per (easting, northing) column
        let mut latlon_plane = vec![(0.0, 0.0); shape.0 * shape.1];
        for (i, &easting) in easting_axis.iter().enumerate() {
            for (j, &northing) in northing_axis.iter().enumerate() {
                latlon_plane[i * shape.1 + j] =
                    utm::to_latlon(easting, northing, bbox.zone_number, bbox.zone_letter);
            }
        }
        let latitudes = Array3::from_shape_fn(shape, |(i, j, _)| latlon_plane[i * shape.1 + j].0);
        let longitudes = Array3::from_shape_fn(shape, |(i, j, _)| latlon_plane[i * shape.1 + j].1);

        Ok(Self {
            longitudes,
            latitudes,
            altitudes,
            eastings,
            northings,
            zone_number: bbox.zone_number,
            zone_letter: bbox.zone_letter,
        })
    }

    /// Total number of grid points.
    pub fn num_points(&self) -> usize {
        self.altitudes.len()
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        let s = self.altitudes.shape();
        (s[0], s[1], s[2])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geo::utm::{from_latlon_with_zone, to_latlon};

    /// AOI whose projected bounding box spans the requested size in meters,
    /// built by inverting the four corners of a UTM-aligned box. A lon/lat
    /// rectangle would not do: grid convergence tilts meridians against the
    /// easting axis and widens the projected box by meters.
    fn aoi_of_utm_extent(width_m: f64, height_m: f64) -> Aoi {
        let (e0, n0) = (354_100.0, 6_182_300.0);
        let corners = [
            (e0, n0),
            (e0, n0 + height_m),
            (e0 + width_m, n0 + height_m),
            (e0 + width_m, n0),
            (e0, n0),
        ];
        let ring = corners
            .iter()
            .map(|&(easting, northing)| {
                let (lat, lon) = to_latlon(easting, northing, 21, 'H');
                [lon, lat]
            })
            .collect();
        Aoi {
            kind: "Polygon".to_string(),
            coordinates: vec![ring],
        }
    }

    #[test]
    fn arange_includes_the_ceiling_boundary() {
        assert_eq!(arange(0.0, 150.0, 50.0), vec![0.0, 50.0, 100.0]);
        assert_eq!(arange(-10.0, 15.0, 5.0), vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
        assert_eq!(arange(0.0, 0.0, 1.0), Vec::<f64>::new());
    }

    #[test]
    fn mesh_counts_match_inclusive_arithmetic() {
        // a hair under 100 m keeps the count stable against the sub-micron
        // noise of the projection roundtrip
        let aoi = aoi_of_utm_extent(99.999, 99.999);
        let mesh = VoiMesh::build(&aoi, [-10.0, 10.0], 50.0, 5.0).unwrap();
        // 100 m at 50 m steps: 3 samples; [-10, 10] at 5 m steps: 5 samples
        let (ne, nn, nh) = mesh.shape();
        assert_eq!((ne, nn, nh), (3, 3, 5));
        assert_eq!(mesh.num_points(), 45);
    }

    #[test]
    fn grids_are_easting_major_and_consistent() {
        let aoi = aoi_of_utm_extent(100.0, 80.0);
        let mesh = VoiMesh::build(&aoi, [-10.0, 10.0], 20.0, 10.0).unwrap();
        let (ne, nn, nh) = mesh.shape();
        // axes vary along their own dimension only
        assert_relative_eq!(
            mesh.eastings[(1, 0, 0)] - mesh.eastings[(0, 0, 0)],
            20.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(mesh.eastings[(0, nn - 1, nh - 1)], mesh.eastings[(0, 0, 0)]);
        assert_relative_eq!(
            mesh.northings[(0, 1, 0)] - mesh.northings[(0, 0, 0)],
            20.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            mesh.altitudes[(0, 0, 1)] - mesh.altitudes[(0, 0, 0)],
            10.0,
            epsilon = 1e-9
        );
        // geodetic grids follow the projected ones
        let (easting, _) = from_latlon_with_zone(
            mesh.latitudes[(ne - 1, 0, 0)],
            mesh.longitudes[(ne - 1, 0, 0)],
            mesh.zone_number,
        );
        assert_relative_eq!(easting, mesh.eastings[(ne - 1, 0, 0)], epsilon = 1e-4);
    }

    #[test]
    fn degenerate_volumes_are_rejected() {
        let aoi = aoi_of_utm_extent(100.0, 100.0);
        assert!(matches!(
            VoiMesh::build(&aoi, [10.0, 10.0], 50.0, 5.0),
            Err(SimError::DegenerateGeometry(_))
        ));

        let point = Aoi {
            kind: "Polygon".to_string(),
            coordinates: vec![vec![[-58.589, -34.49], [-58.589, -34.49]]],
        };
        assert!(matches!(
            VoiMesh::build(&point, [-10.0, 10.0], 50.0, 5.0),
            Err(SimError::DegenerateGeometry(_))
        ));

        assert!(VoiMesh::build(&aoi, [-10.0, 10.0], 0.0, 5.0).is_err());
    }
}
