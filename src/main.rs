#![recursion_limit = "256"]
/// nalgebra
/// https://docs.rs/nalgebra/latest/nalgebra/
///
/// ndarray
/// https://docs.rs/ndarray/latest/ndarray/all.html
mod camera;
mod config;
mod dataset;
mod error;
mod geo;
mod location;
mod render;
mod rpc;
mod s2p;
mod satellite;
mod simulator;
mod sunpos;
mod voi;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::dataset::StereoAcquisition;
use crate::location::Location;
use crate::render::Blender;
use crate::s2p::S2pConfigurator;
use crate::satellite::Satellite;
use crate::simulator::Simulator;

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    let mut args = std::env::args().skip(1);
    let base_dir = args
        .next()
        .unwrap_or_else(|| "data/SIMULATION_EXAMPLE".to_string());
    let scene_filename = args
        .next()
        .unwrap_or_else(|| "data/model/city_scene.blend".to_string());
    let acquisition_list = args.next();

    log::info!("simulation directory: {base_dir}");
    log::info!("scene: {scene_filename}");

    let satellite = Satellite::default();
    let blender = Blender::new(&scene_filename, (600, 600));
    let location = Location::default();
    let simulator = Simulator::open_or_create(&base_dir, satellite, blender, location)
        .context("setting up the simulation directory")?;
    log::info!("{}", simulator.satellite);
    log::info!("{}", simulator.location);

    let acquisitions = match acquisition_list {
        Some(path) => read_list(Path::new(&path))?,
        None => vec![default_pair(&simulator)?],
    };

    let s2p_dir = PathBuf::from(&base_dir).join("S2P_CONFIGS");
    let template = s2p_dir.join("s2p_config_template.json");
    let mut configurator = if template.is_file() {
        log::info!("using stereo config template {}", template.display());
        S2pConfigurator::with_template_file(&s2p_dir, &template)?
    } else {
        S2pConfigurator::new(&s2p_dir)
    };
    configurator.set_altitude_range(simulator.location.altitude_range);

    for acquisition in &acquisitions {
        let (ref_image, ref_rpc) =
            simulator.simulate_image_and_rpcfit(&acquisition.ref_view, &acquisition.ref_sun, false)?;
        let (sec_image, sec_rpc) =
            simulator.simulate_image_and_rpcfit(&acquisition.sec_view, &acquisition.sec_sun, false)?;

        let config_path =
            configurator.create_config(&ref_image, &ref_rpc, &sec_image, &sec_rpc, false)?;
        log::info!("stereo configuration written to {}", config_path.display());
    }

    Ok(())
}

fn read_list(path: &Path) -> anyhow::Result<Vec<StereoAcquisition>> {
    let acquisitions = dataset::read_acquisition_list(path)?;
    log::info!(
        "{} acquisition pairs read from {}",
        acquisitions.len(),
        path.display()
    );
    Ok(acquisitions)
}

/// Near-nadir reference from the north against an oblique secondary view
/// from the south-west, both lit by the sun as seen from the scene origin
/// on a mid-morning reference instant.
fn default_pair(simulator: &Simulator) -> anyhow::Result<StereoAcquisition> {
    let [lon, lat, _] = simulator.location.lon_lat_alt_origin;
    let when = sunpos::UtcMoment {
        year: 2022,
        month: 3,
        day: 23,
        hour: 14,
        minute: 0,
        second: 0,
    };
    let (sun_zenith, sun_azimuth) = sunpos::sun_zenith_azimuth(&when, lat, lon);
    log::info!("sun over {}: zenith {sun_zenith:.1} azimuth {sun_azimuth:.1}", simulator.location.name);
    let acquisition = StereoAcquisition::new(
        5.0,
        0.0,
        sun_zenith,
        sun_azimuth,
        25.0,
        210.0,
        sun_zenith,
        sun_azimuth,
    )?;
    Ok(acquisition)
}
