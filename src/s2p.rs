//! Configuration generator for the external stereo-reconstruction pipeline.
//!
//! Consumes two rendered (image, RPC) pairs and writes the JSON
//! configuration the tool expects, with image and RPC paths relative to the
//! configuration file when requested.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::SimResult;

/// Relative path from `base` to `target`, component-wise. Both paths must
/// be rooted the same way (both absolute or both relative to the same
/// directory).
fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Image basename without extension and without the frame suffix the
/// renderer appends.
fn image_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_suffix("_0001").unwrap_or(&stem).to_string()
}

pub struct S2pConfigurator {
    /// Directory receiving the configs and the reconstruction output dirs.
    pub base_dir: PathBuf,
    /// Store image and RPC paths relative to the config file.
    pub relative_paths_in_config: bool,
    /// When known, the disparity range is derived from these altitudes.
    pub altitude_range: Option<[f64; 2]>,
    pub tile_size: u32,
    pub dsm_resolution: f64,
    pub config: Value,
}

impl S2pConfigurator {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        let mut configurator = Self {
            base_dir: base_dir.into(),
            relative_paths_in_config: true,
            altitude_range: None,
            tile_size: 600,
            dsm_resolution: 0.3,
            config: Self::template_configuration(),
        };
        configurator.set_init_parameters();
        configurator
    }

    /// Starts from a template file instead of the built-in defaults.
    pub fn with_template_file<P: Into<PathBuf>>(
        base_dir: P,
        template_config_filename: &Path,
    ) -> SimResult<Self> {
        let mut configurator = Self::new(base_dir);
        configurator.load_config(template_config_filename)?;
        configurator.set_init_parameters();
        Ok(configurator)
    }

    fn set_init_parameters(&mut self) {
        if let Some([alt_min, alt_max]) = self.altitude_range {
            self.set_parameter("alt_min", json!(alt_min));
            self.set_parameter("alt_max", json!(alt_max));
            self.set_parameter("disp_range_method", json!("fixed_altitude_range"));
        }
        let dsm_resolution = json!(self.dsm_resolution);
        let tile_size = json!(self.tile_size);
        self.set_parameter("dsm_resolution", dsm_resolution);
        self.set_parameter("tile_size", tile_size);
    }

    pub fn set_altitude_range(&mut self, altitude_range: [f64; 2]) {
        self.altitude_range = Some(altitude_range);
        self.set_init_parameters();
    }

    pub fn set_parameter(&mut self, name: &str, value: Value) {
        self.config[name] = value;
    }

    fn set_filenames(
        &mut self,
        ref_image_filename: &Path,
        ref_rpc_filename: &Path,
        sec_image_filename: &Path,
        sec_rpc_filename: &Path,
        config_directory: &Path,
        output_dir: &Path,
    ) {
        if self.relative_paths_in_config {
            let rel = |p: &Path| relative_path(p, config_directory).display().to_string();
            self.config["out_dir"] = json!(rel(output_dir));
            self.config["images"][0]["img"] = json!(rel(ref_image_filename));
            self.config["images"][1]["img"] = json!(rel(sec_image_filename));
            self.config["images"][0]["rpc"] = json!(rel(ref_rpc_filename));
            self.config["images"][1]["rpc"] = json!(rel(sec_rpc_filename));
        } else {
            self.config["out_dir"] = json!(output_dir.display().to_string());
            self.config["images"][0]["img"] = json!(ref_image_filename.display().to_string());
            self.config["images"][1]["img"] = json!(sec_image_filename.display().to_string());
            self.config["images"][0]["rpc"] = json!(ref_rpc_filename.display().to_string());
            self.config["images"][1]["rpc"] = json!(sec_rpc_filename.display().to_string());
        }
    }

    /// Writes the configuration for one stereo pair and returns its path.
    /// An existing config is kept unless `overwrite` is set.
    pub fn create_config(
        &mut self,
        ref_image_filename: &Path,
        ref_rpc_filename: &Path,
        sec_image_filename: &Path,
        sec_rpc_filename: &Path,
        overwrite: bool,
    ) -> SimResult<PathBuf> {
        let ref_stem = image_stem(ref_image_filename);
        let sec_stem = image_stem(sec_image_filename);
        let config_filename = self
            .base_dir
            .join(format!("s2p_config_ref_{ref_stem}_sec_{sec_stem}.json"));
        let output_dir = self.base_dir.join(format!("ref_{ref_stem}_sec_{sec_stem}"));

        let config_directory = self.base_dir.clone();
        self.set_filenames(
            ref_image_filename,
            ref_rpc_filename,
            sec_image_filename,
            sec_rpc_filename,
            &config_directory,
            &output_dir,
        );

        if !config_filename.is_file() || overwrite {
            std::fs::create_dir_all(&self.base_dir)?;
            self.save_config(&config_filename)?;
        }
        Ok(config_filename)
    }

    pub fn save_config(&self, path: &Path) -> SimResult<()> {
        let text = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load_config(&mut self, path: &Path) -> SimResult<()> {
        let text = std::fs::read_to_string(path)?;
        self.config = serde_json::from_str(&text)?;
        Ok(())
    }

    fn template_configuration() -> Value {
        json!({
            "out_dir": "",
            "images": [
                {
                    "clr": null,
                    "img": "",
                    "rpc": "",
                    "wat": null,
                    "roi": null,
                    "cld": null
                },
                {
                    "img": "",
                    "rpc": ""
                }
            ],
            "full_img": true,
            "tile_size": 600,
            "dsm_resolution": 0.3,
            "dsm_radius": 1,
            "dsm_sigma": null,
            "msk_erosion": 0,
            "debug": false,
            "clean_intermediate": false,
            "clean_tmp": true,
            "matching_algorithm": "mgm_multi",
            "rpc_alt_range_scale_factor": 1,
            "triangulation_mode": "pairwise",
            "max_pointing_error": 10,
            "vertical_margin": 5,
            "horizontal_margin": 20,
            "skip_existing": false,
            "use_global_pointing_for_geometric_triangulation": false,
            "n_gcp_per_axis": 5,
            "max_processes": null,
            "omp_num_threads": 1,
            "temporary_dir": "/tmp",
            "disp_min": null,
            "disp_max": null,
            "disp_range_method": "fixed_altitude_range",
            "disp_range_extra_margin": 0.2,
            "disp_range_exogenous_low_margin": -10,
            "disp_range_exogenous_high_margin": 100,
            "disp_range_srtm_low_margin": -20,
            "disp_range_srtm_high_margin": 50,
            "disable_srtm": true,
            "exogenous_dem": null,
            "exogenous_dem_geoid_mode": true,
            "alt_min": -5,
            "alt_max": 35,
            "register_with_shear": true,
            "sift_match_thresh": 0.6,
            "relative_sift_match_thresh": true,
            "epipolar_thresh": 0.5,
            "stereo_speckle_filter": 25,
            "stereo_regularity_multiplier": 1.0,
            "census_ncc_win": 5,
            "fusion_operator": "average_if_close",
            "fusion_thresh": 3,
            "subsampling_factor": 1
        })
    }
}
