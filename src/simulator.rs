//! Simulation session: owns the output directory tree and orchestrates one
//! image + RPC generation per view/sun orientation.

use std::path::PathBuf;

use crate::camera::{rotation_from_view_angles, AffineCamera, ViewAngles};
use crate::error::{SimError, SimResult};
use crate::location::Location;
use crate::render::Blender;
use crate::rpc::{compute_rpc_from_affine_camera, RpcFitConfig, RpcModel};
use crate::satellite::Satellite;

const CONFIG_DIR: &str = "SIMULATION_CONFIG";
const IMAGES_DIR: &str = "IMAGES";
const BLENDER_CAMERA_DIR: &str = "BLENDER_CAMERA";
const BLENDER_COMMAND_DIR: &str = "BLENDER_COMMAND";
const BLENDER_MODEL_DIR: &str = "BLENDER_MODEL";
const RPCFIT_DIR: &str = "RPCFIT";
const SATELLITE_FILENAME: &str = "satellite.json";
const BLENDER_FILENAME: &str = "blender.json";
const LOCATION_FILENAME: &str = "location.json";

pub struct Simulator {
    pub base_dir: PathBuf,
    pub satellite: Satellite,
    pub blender: Blender,
    pub location: Location,
    /// Fit parameters for the RPC stage; defaults match production use.
    pub rpc_fit: RpcFitConfig,
}

impl Simulator {
    /// Creates a fresh session tree under `base_dir`, copies the scene into
    /// it and persists the configuration. Fails if the directory exists.
    pub fn create<P: Into<PathBuf>>(
        base_dir: P,
        satellite: Satellite,
        mut blender: Blender,
        location: Location,
    ) -> SimResult<Self> {
        let base_dir = base_dir.into();
        if base_dir.exists() {
            return Err(SimError::InvalidInput(format!(
                "simulation directory {} already exists, open it instead",
                base_dir.display()
            )));
        }
        for dir in [
            CONFIG_DIR,
            IMAGES_DIR,
            BLENDER_CAMERA_DIR,
            BLENDER_COMMAND_DIR,
            BLENDER_MODEL_DIR,
            RPCFIT_DIR,
        ] {
            std::fs::create_dir_all(base_dir.join(dir))?;
        }

        // the session keeps its own copy of the scene
        let scene_name = blender.scene_filename.file_name().ok_or_else(|| {
            SimError::InvalidInput(format!(
                "scene path {} has no file name",
                blender.scene_filename.display()
            ))
        })?;
        let scene_copy = base_dir.join(BLENDER_MODEL_DIR).join(scene_name);
        std::fs::copy(&blender.scene_filename, &scene_copy)?;
        blender.scene_filename = scene_copy;

        let simulator = Self {
            base_dir,
            satellite,
            blender,
            location,
            rpc_fit: RpcFitConfig::default(),
        };
        simulator.save_config()?;
        Ok(simulator)
    }

    /// Opens an existing session from its persisted configuration.
    pub fn open<P: Into<PathBuf>>(base_dir: P) -> SimResult<Self> {
        let base_dir = base_dir.into();
        let config_dir = base_dir.join(CONFIG_DIR);
        if !config_dir.join(SATELLITE_FILENAME).is_file() {
            return Err(SimError::InvalidInput(format!(
                "{} is not a simulation directory (missing {})",
                base_dir.display(),
                config_dir.join(SATELLITE_FILENAME).display()
            )));
        }
        let satellite = Satellite::from_json_file(config_dir.join(SATELLITE_FILENAME))?;
        let blender = Blender::from_json_file(config_dir.join(BLENDER_FILENAME))?;
        let location = Location::from_json_file(config_dir.join(LOCATION_FILENAME))?;
        Ok(Self {
            base_dir,
            satellite,
            blender,
            location,
            rpc_fit: RpcFitConfig::default(),
        })
    }

    pub fn open_or_create<P: Into<PathBuf>>(
        base_dir: P,
        satellite: Satellite,
        blender: Blender,
        location: Location,
    ) -> SimResult<Self> {
        let base_dir = base_dir.into();
        if base_dir.exists() {
            log::info!(
                "simulation directory {} exists, loading its configuration",
                base_dir.display()
            );
            Self::open(base_dir)
        } else {
            Self::create(base_dir, satellite, blender, location)
        }
    }

    fn save_config(&self) -> SimResult<()> {
        let config_dir = self.base_dir.join(CONFIG_DIR);
        self.satellite.to_json_file(config_dir.join(SATELLITE_FILENAME))?;
        self.blender.to_json_file(config_dir.join(BLENDER_FILENAME))?;
        self.location.to_json_file(config_dir.join(LOCATION_FILENAME))?;
        Ok(())
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base_dir.join(IMAGES_DIR)
    }

    pub fn rpcfit_dir(&self) -> PathBuf {
        self.base_dir.join(RPCFIT_DIR)
    }

    /// Generates the image and the RPC file for one view and sun
    /// orientation; returns their paths. Existing outputs are reused unless
    /// `overwrite` is set.
    pub fn simulate_image_and_rpcfit(
        &self,
        view: &ViewAngles,
        sun: &ViewAngles,
        overwrite: bool,
    ) -> SimResult<(PathBuf, PathBuf)> {
        let result = self.simulate_inner(view, sun, overwrite);
        if let Err(err) = &result {
            log::error!(
                "simulation failed for view (ze {:.1}, az {:.1}) sun (ze {:.1}, az {:.1}) over {}: {err}",
                view.zenith_deg,
                view.azimuth_deg,
                sun.zenith_deg,
                sun.azimuth_deg,
                self.location.name
            );
        }
        result
    }

    fn simulate_inner(
        &self,
        view: &ViewAngles,
        sun: &ViewAngles,
        overwrite: bool,
    ) -> SimResult<(PathBuf, PathBuf)> {
        let view_and_sun_name = format!(
            "view_ze_{:05.1}_view_az_{:05.1}_sun_ze_{:05.1}_sun_az_{:05.1}",
            view.zenith_deg, view.azimuth_deg, sun.zenith_deg, sun.azimuth_deg
        );
        let view_name = format!(
            "view_ze_{:05.1}_view_az_{:05.1}",
            view.zenith_deg, view.azimuth_deg
        );

        let (image_filename, render_base) =
            self.blender.output_paths(&self.images_dir(), &view_and_sun_name);
        let camera_script_filename = self
            .base_dir
            .join(BLENDER_CAMERA_DIR)
            .join(format!("blender_camera_{view_and_sun_name}.py"));
        let command_filename = self
            .base_dir
            .join(BLENDER_COMMAND_DIR)
            .join(format!("blender_command_{view_and_sun_name}.sh"));
        let rpcfit_filename = self
            .rpcfit_dir()
            .join(format!("rpcfit_{view_name}.txt"));

        if image_filename.is_file() && rpcfit_filename.is_file() && !overwrite {
            if RpcModel::read_from_file(&rpcfit_filename).is_ok() {
                log::info!("outputs for {view_and_sun_name} already exist, skipping");
                return Ok((image_filename, rpcfit_filename));
            }
            log::warn!(
                "existing rpc {} is unreadable, regenerating",
                rpcfit_filename.display()
            );
        }

        let camera = AffineCamera::build(
            view,
            self.blender.image_xy_size,
            self.satellite.view_pixels_per_meter(view.zenith_deg),
        )?;

        compute_rpc_from_affine_camera(
            &camera.p,
            &self.location.aoi,
            self.location.altitude_range,
            &rpcfit_filename,
            Some(self.location.lon_lat_alt_origin),
            &self.rpc_fit,
        )?;

        let r_sun = rotation_from_view_angles(sun)?;
        let camera_script = self
            .blender
            .camera_position_script(&camera.r, &camera.k, Some(&r_sun));
        std::fs::write(&camera_script_filename, camera_script)?;

        let command_line = self.blender.command_line(&camera_script_filename, &render_base);
        std::fs::write(&command_filename, command_line.join(" ") + "\n")?;

        self.blender
            .render(&camera_script_filename, &render_base, &image_filename)?;

        Ok((image_filename, rpcfit_filename))
    }
}
