use nalgebra::{Matrix2, Matrix3, SMatrix, Vector2, Vector3};

use super::{rotation_from_view_angles, ViewAngles};
use crate::error::{SimError, SimResult};

/// Weak-perspective camera `P = [K R | t]`.
///
/// `p` projects homogeneous 3D points in local (east, north, up) meters to
/// pixels. `r` keeps the full rotation so the renderer can pose a camera
/// consistent with the projection.
#[derive(Debug, Clone)]
pub struct AffineCamera {
    pub p: SMatrix<f64, 2, 4>,
    pub k: Matrix2<f64>,
    pub r: Matrix3<f64>,
    pub t: Vector2<f64>,
}

impl AffineCamera {
    /// Builds the camera from an orientation, the image size in pixels and
    /// an isotropic resolution in pixels per meter. The principal point is
    /// the image center.
    pub fn build(
        view: &ViewAngles,
        image_xy_size: (u32, u32),
        pixels_per_meter: f64,
    ) -> SimResult<Self> {
        view.ensure_no_roll()?;
        if pixels_per_meter <= 0.0 || !pixels_per_meter.is_finite() {
            return Err(SimError::InvalidInput(format!(
                "resolution {pixels_per_meter} px/m is not positive"
            )));
        }

        let r = rotation_from_view_angles(view)?;
        let k = Matrix2::new(pixels_per_meter, 0.0, 0.0, pixels_per_meter);
        let kr = k * r.fixed_view::<2, 3>(0, 0);
        let t = Vector2::new(
            image_xy_size.0 as f64 / 2.0,
            image_xy_size.1 as f64 / 2.0,
        );

        let mut p = SMatrix::<f64, 2, 4>::zeros();
        p.fixed_view_mut::<2, 3>(0, 0).copy_from(&kr);
        p.set_column(3, &t);

        Ok(Self { p, k, r, t })
    }

    /// Pixel location of a local (east, north, up) point.
    pub fn project(&self, point_enu: &Vector3<f64>) -> Vector2<f64> {
        self.p * point_enu.to_homogeneous()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn origin_projects_to_principal_point() {
        for (zenith, azimuth, size, ppm) in [
            (0.0, 0.0, (600u32, 600u32), 3.193),
            (25.0, 210.0, (600, 400), 1.5),
            (45.0, 90.0, (1024, 768), 0.7),
        ] {
            let view = ViewAngles::new(zenith, azimuth).unwrap();
            let cam = AffineCamera::build(&view, size, ppm).unwrap();
            let center = cam.project(&Vector3::zeros());
            assert_relative_eq!(center.x, size.0 as f64 / 2.0, epsilon = 1e-12);
            assert_relative_eq!(center.y, size.1 as f64 / 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn nadir_projection_is_scaled_ground_coordinates() {
        let view = ViewAngles::new(0.0, 0.0).unwrap();
        let cam = AffineCamera::build(&view, (600, 600), 2.0).unwrap();
        // nadir rotation: right (1,0,0), up (0,-1,0), viewing (0,0,-1)
        let px = cam.project(&Vector3::new(10.0, 5.0, 7.0));
        assert_relative_eq!(px.x, 2.0 * 10.0 + 300.0, epsilon = 1e-12);
        assert_relative_eq!(px.y, -2.0 * 5.0 + 300.0, epsilon = 1e-12);
    }

    #[test]
    fn altitude_shifts_oblique_projections_only() {
        let nadir = ViewAngles::new(0.0, 0.0).unwrap();
        let cam = AffineCamera::build(&nadir, (600, 600), 2.0).unwrap();
        let low = cam.project(&Vector3::new(10.0, 5.0, 0.0));
        let high = cam.project(&Vector3::new(10.0, 5.0, 50.0));
        assert_relative_eq!(low.x, high.x, epsilon = 1e-12);
        assert_relative_eq!(low.y, high.y, epsilon = 1e-12);

        let oblique = ViewAngles::new(30.0, 90.0).unwrap();
        let cam = AffineCamera::build(&oblique, (600, 600), 2.0).unwrap();
        let low = cam.project(&Vector3::new(10.0, 5.0, 0.0));
        let high = cam.project(&Vector3::new(10.0, 5.0, 50.0));
        assert!((high - low).norm() > 1.0);
    }

    #[test]
    fn roll_is_rejected() {
        let view = ViewAngles::with_roll(5.0, 0.0, Some(1.0)).unwrap();
        assert!(matches!(
            AffineCamera::build(&view, (600, 600), 3.0),
            Err(SimError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn non_positive_resolution_is_rejected() {
        let view = ViewAngles::new(5.0, 0.0).unwrap();
        assert!(AffineCamera::build(&view, (600, 600), 0.0).is_err());
        assert!(AffineCamera::build(&view, (600, 600), f64::NAN).is_err());
    }
}
