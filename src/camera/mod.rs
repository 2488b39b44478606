mod affine;
pub use affine::AffineCamera;

use nalgebra::{Matrix3, Vector3};

use crate::error::{SimError, SimResult};

/// Orientation of a view in degrees.
///
/// Zenith is the angle between the viewing direction and the vertical,
/// azimuth the heading of its horizontal projection measured from north.
/// Roll is reserved; passing `Some` fails downstream.
#[derive(Debug, Clone, Copy)]
pub struct ViewAngles {
    pub zenith_deg: f64,
    pub azimuth_deg: f64,
    pub roll_deg: Option<f64>,
}

impl ViewAngles {
    pub fn new(zenith_deg: f64, azimuth_deg: f64) -> SimResult<Self> {
        let view = Self {
            zenith_deg,
            azimuth_deg,
            roll_deg: None,
        };
        view.validate()?;
        Ok(view)
    }

    /// Keeps the roll extension point; every consumer rejects `Some`.
    pub fn with_roll(zenith_deg: f64, azimuth_deg: f64, roll_deg: Option<f64>) -> SimResult<Self> {
        let view = Self {
            zenith_deg,
            azimuth_deg,
            roll_deg,
        };
        view.validate()?;
        Ok(view)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..90.0).contains(&self.zenith_deg) {
            return Err(SimError::InvalidInput(format!(
                "zenith angle {} outside [0, 90)",
                self.zenith_deg
            )));
        }
        if !(0.0..360.0).contains(&self.azimuth_deg) {
            return Err(SimError::InvalidInput(format!(
                "azimuth angle {} outside [0, 360)",
                self.azimuth_deg
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_no_roll(&self) -> SimResult<()> {
        match self.roll_deg {
            None => Ok(()),
            Some(_) => Err(SimError::UnsupportedFeature("roll angle")),
        }
    }
}

/// Camera rotation matrix for a view orientation.
///
/// Rows are the camera right, up and viewing axes in the local
/// east-north-up frame. The viewing axis points to the scene, opposite to
/// the projection direction.
pub fn rotation_from_view_angles(view: &ViewAngles) -> SimResult<Matrix3<f64>> {
    view.validate()?;
    view.ensure_no_roll()?;

    let z = view.zenith_deg.to_radians();
    let a = view.azimuth_deg.to_radians();
    let projection_direction =
        Vector3::new(a.sin() * z.sin(), a.cos() * z.sin(), z.cos()).normalize();
    let viewing = -projection_direction;

    // cross with whichever world axis is less parallel to the viewing axis,
    // so the up vector stays well defined at nadir
    let up = if viewing.x.abs() > viewing.y.abs() {
        Vector3::new(viewing.z, 0.0, -viewing.x)
    } else {
        Vector3::new(0.0, viewing.z, -viewing.y)
    }
    .normalize();
    let right = up.cross(&viewing);

    Ok(Matrix3::from_rows(&[
        right.transpose(),
        up.transpose(),
        viewing.transpose(),
    ]))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rotation_is_orthonormal_over_the_angle_range() {
        for zenith in [0.0, 0.5, 10.0, 30.0, 45.0, 60.0, 75.0, 89.9] {
            for azimuth in [0.0, 45.0, 90.0, 135.0, 210.0, 270.0, 359.5] {
                let view = ViewAngles::new(zenith, azimuth).unwrap();
                let r = rotation_from_view_angles(&view).unwrap();
                for i in 0..3 {
                    assert_relative_eq!(r.row(i).norm(), 1.0, epsilon = 1e-9);
                    for j in (i + 1)..3 {
                        assert_relative_eq!(r.row(i).dot(&r.row(j)), 0.0, epsilon = 1e-9);
                    }
                }
                assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn nadir_view_looks_straight_down() {
        let view = ViewAngles::new(0.0, 0.0).unwrap();
        let r = rotation_from_view_angles(&view).unwrap();
        assert_relative_eq!(r[(2, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[(2, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[(2, 2)], -1.0, epsilon = 1e-12);
        assert!(r.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn oblique_east_view() {
        // zenith 45, azimuth 90: projection direction (sqrt2/2, 0, sqrt2/2)
        let view = ViewAngles::new(45.0, 90.0).unwrap();
        let r = rotation_from_view_angles(&view).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(r[(2, 0)], -s, epsilon = 1e-12);
        assert_relative_eq!(r[(2, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[(2, 2)], -s, epsilon = 1e-12);
    }

    #[test]
    fn roll_is_rejected() {
        let view = ViewAngles::with_roll(10.0, 20.0, Some(5.0)).unwrap();
        assert!(matches!(
            rotation_from_view_angles(&view),
            Err(SimError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn out_of_range_angles_are_rejected() {
        assert!(ViewAngles::new(90.0, 0.0).is_err());
        assert!(ViewAngles::new(-1.0, 0.0).is_err());
        assert!(ViewAngles::new(0.0, 360.0).is_err());
        assert!(ViewAngles::new(0.0, -0.1).is_err());
    }
}
