//! Boundary to the external renderer.
//!
//! The renderer lives in its own coordinate convention: its camera frame
//! inverts the y and z axes relative to ours, takes the rotation transposed
//! and expects quaternion components ordered (w, x, y, z). The whole
//! convention lives behind [`renderer_quaternion`] and the script builder so
//! the geometric code stays agnostic of it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use nalgebra::{Matrix2, Matrix3, Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Distance of the virtual camera from the scene origin along the
/// projection direction. Orthographic rendering only needs it to clear the
/// scene geometry.
const CAMERA_DISTANCE: f64 = 200.0;

/// Rotation re-expressed in the renderer's axes: rows 1 and 2 flipped.
fn to_renderer_frame(r: &Matrix3<f64>) -> Matrix3<f64> {
    let mut m = *r;
    for j in 0..3 {
        m[(1, j)] = -m[(1, j)];
        m[(2, j)] = -m[(2, j)];
    }
    m
}

/// Quaternion handed to the renderer, components in its (w, x, y, z) order.
pub fn renderer_quaternion(r: &Matrix3<f64>) -> [f64; 4] {
    let m = to_renderer_frame(r);
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m.transpose()));
    [q.w, q.i, q.j, q.k]
}

/// Renderer configuration: the scene to load and the output raster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blender {
    pub scene_filename: PathBuf,
    pub image_xy_size: (u32, u32),
    pub image_settings_file_format: String,
    pub image_settings_color_mode: String,
    pub image_settings_color_depth: String,
}

impl Blender {
    pub fn new<P: Into<PathBuf>>(scene_filename: P, image_xy_size: (u32, u32)) -> Self {
        Self {
            scene_filename: scene_filename.into(),
            image_xy_size,
            image_settings_file_format: "TIFF".to_string(),
            image_settings_color_mode: "BW".to_string(),
            image_settings_color_depth: "16".to_string(),
        }
    }

    fn image_extension(&self) -> &str {
        match self.image_settings_file_format.as_str() {
            "TIFF" => "tif",
            "PNG" => "png",
            "JPEG" => "jpg",
            other => other,
        }
    }

    /// Output path pair for one render: the file the renderer will create
    /// and the base path it must be given. The tool appends the frame
    /// number and extension to the base on its own.
    pub fn output_paths(&self, images_dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
        let image = images_dir.join(format!("{stem}_0001.{}", self.image_extension()));
        let base = images_dir.join(format!("{stem}_"));
        (image, base)
    }

    /// Python script positioning the renderer's orthographic camera (and
    /// optionally its sun light) to match a camera rotation and intrinsics.
    pub fn camera_position_script(
        &self,
        r: &Matrix3<f64>,
        k: &Matrix2<f64>,
        r_sun: Option<&Matrix3<f64>>,
    ) -> String {
        let (width, height) = self.image_xy_size;
        let side = width.min(height) as f64;
        let renderer_r = to_renderer_frame(r);
        let quat = renderer_quaternion(r);

        let mut script = String::new();
        let s = &mut script;
        let _ = writeln!(s, "import bpy");
        let _ = writeln!(s, "cam = bpy.data.objects[\"Camera\"]");
        let _ = writeln!(s, "cam.data.type = \"ORTHO\"");
        let _ = writeln!(s, "cam.rotation_mode = \"QUATERNION\"");
        for (i, q) in quat.iter().enumerate() {
            let _ = writeln!(s, "cam.rotation_quaternion[{i}] = {q}");
        }
        // the camera sits along the projection direction, which in the
        // renderer frame is its viewing-axis row
        for i in 0..3 {
            let _ = writeln!(s, "cam.location[{i}] = {}", renderer_r[(2, i)] * CAMERA_DISTANCE);
        }
        let _ = writeln!(
            s,
            "cam.data.ortho_scale = {}",
            side / ((k[(0, 0)] + k[(1, 1)]) / 2.0)
        );
        let _ = writeln!(s, "bpy.context.scene.render.resolution_x = {width}");
        let _ = writeln!(s, "bpy.context.scene.render.resolution_y = {height}");
        let _ = writeln!(
            s,
            "bpy.context.scene.render.image_settings.file_format = \"{}\"",
            self.image_settings_file_format
        );
        let _ = writeln!(
            s,
            "bpy.context.scene.render.image_settings.color_mode = \"{}\"",
            self.image_settings_color_mode
        );
        let _ = writeln!(
            s,
            "bpy.context.scene.render.image_settings.color_depth = \"{}\"",
            self.image_settings_color_depth
        );

        if let Some(r_sun) = r_sun {
            let sun_quat = renderer_quaternion(r_sun);
            let _ = writeln!(s, "#-----------------------------");
            let _ = writeln!(s, "sun = bpy.data.objects[\"Light\"]");
            let _ = writeln!(s, "sun.rotation_mode = \"QUATERNION\"");
            for (i, q) in sun_quat.iter().enumerate() {
                let _ = writeln!(s, "sun.rotation_quaternion[{i}] = {q}");
            }
        }

        script
    }

    /// Renderer invocation: load the scene headless, run the positioning
    /// script, render frame 1 to the output base.
    pub fn command_line(
        &self,
        script_filename: &Path,
        render_filename_base: &Path,
    ) -> Vec<String> {
        vec![
            "blender".to_string(),
            "-b".to_string(),
            self.scene_filename.display().to_string(),
            "-P".to_string(),
            script_filename.display().to_string(),
            "-o".to_string(),
            render_filename_base.display().to_string(),
            "-f".to_string(),
            "1".to_string(),
        ]
    }

    /// Blocking render. Fails on a nonzero exit status or when the expected
    /// output file is missing afterwards; no timeout is applied.
    pub fn render(
        &self,
        script_filename: &Path,
        render_filename_base: &Path,
        expected_output: &Path,
    ) -> SimResult<()> {
        let line = self.command_line(script_filename, render_filename_base);
        log::info!("rendering: {}", line.join(" "));
        let status = Command::new(&line[0])
            .args(&line[1..])
            .status()
            .map_err(|e| SimError::RenderFailure(format!("failed to launch {}: {e}", line[0])))?;
        if !status.success() {
            return Err(SimError::RenderFailure(format!(
                "renderer exited with {status}"
            )));
        }
        if !expected_output.is_file() {
            return Err(SimError::RenderFailure(format!(
                "renderer did not produce {}",
                expected_output.display()
            )));
        }
        Ok(())
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let blender = serde_json::from_str(&text)?;
        Ok(blender)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::camera::{rotation_from_view_angles, ViewAngles};

    #[test]
    fn nadir_rotation_maps_to_identity_quaternion() {
        let view = ViewAngles::new(0.0, 0.0).unwrap();
        let r = rotation_from_view_angles(&view).unwrap();
        let quat = renderer_quaternion(&r);
        assert_relative_eq!(quat[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(quat[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(quat[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(quat[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn quaternion_reproduces_the_flipped_transpose() {
        let view = ViewAngles::new(25.0, 210.0).unwrap();
        let r = rotation_from_view_angles(&view).unwrap();
        let quat = renderer_quaternion(&r);
        let norm: f64 = quat.iter().map(|q| q * q).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);

        let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            quat[0], quat[1], quat[2], quat[3],
        ));
        let rebuilt = q.to_rotation_matrix().into_inner();
        let expected = to_renderer_frame(&r).transpose();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rebuilt[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn script_positions_camera_and_sun() {
        let blender = Blender::new("scene.blend", (600, 400));
        let view = ViewAngles::new(5.0, 0.0).unwrap();
        let sun = ViewAngles::new(35.0, 40.0).unwrap();
        let r = rotation_from_view_angles(&view).unwrap();
        let r_sun = rotation_from_view_angles(&sun).unwrap();
        let k = Matrix2::new(2.0, 0.0, 0.0, 2.0);

        let script = blender.camera_position_script(&r, &k, Some(&r_sun));
        assert!(script.starts_with("import bpy"));
        assert!(script.contains("cam.data.type = \"ORTHO\""));
        // ortho scale covers the short image side at 2 px/m
        assert!(script.contains("cam.data.ortho_scale = 200"));
        assert!(script.contains("bpy.context.scene.render.resolution_x = 600"));
        assert!(script.contains("bpy.context.scene.render.resolution_y = 400"));
        assert!(script.contains("image_settings.color_depth = \"16\""));
        assert!(script.contains("sun.rotation_mode = \"QUATERNION\""));

        let no_sun = blender.camera_position_script(&r, &k, None);
        assert!(!no_sun.contains("sun."));
    }

    #[test]
    fn output_paths_follow_the_frame_convention() {
        let blender = Blender::new("scene.blend", (600, 600));
        let (image, base) = blender.output_paths(Path::new("/tmp/IMAGES"), "view_a");
        assert_eq!(image, Path::new("/tmp/IMAGES/view_a_0001.tif"));
        assert_eq!(base, Path::new("/tmp/IMAGES/view_a_"));
    }

    #[test]
    fn command_line_is_headless_single_frame() {
        let blender = Blender::new("/models/city.blend", (600, 600));
        let line = blender.command_line(Path::new("cam.py"), Path::new("/out/img_"));
        assert_eq!(
            line,
            vec!["blender", "-b", "/models/city.blend", "-P", "cam.py", "-o", "/out/img_", "-f", "1"]
        );
    }

    #[test]
    fn missing_renderer_is_reported() {
        // whether the tool is absent, rejects the missing scene, or runs and
        // produces nothing, the outcome is the same failure kind
        let blender = Blender::new("scene-that-does-not-exist.blend", (8, 8));
        let dir = tempfile::tempdir().unwrap();
        let result = blender.render(
            &dir.path().join("cam.py"),
            &dir.path().join("img_"),
            &dir.path().join("img_0001.tif"),
        );
        assert!(matches!(result, Err(SimError::RenderFailure(_))));
    }
}
