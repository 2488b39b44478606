//! Acquisition lists: batches of stereo pairs to simulate, read from CSV.
//!
//! Columns: ref_zenith, ref_azimuth, ref_sun_zenith, ref_sun_azimuth,
//! sec_zenith, sec_azimuth, sec_sun_zenith, sec_sun_azimuth. A header row
//! is expected.

use std::path::Path;

use anyhow::Context;

use crate::camera::ViewAngles;
use crate::error::SimResult;

/// One stereo pair: reference and secondary view with their sun
/// orientations.
#[derive(Debug, Clone, Copy)]
pub struct StereoAcquisition {
    pub ref_view: ViewAngles,
    pub ref_sun: ViewAngles,
    pub sec_view: ViewAngles,
    pub sec_sun: ViewAngles,
}

impl StereoAcquisition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ref_zenith: f64,
        ref_azimuth: f64,
        ref_sun_zenith: f64,
        ref_sun_azimuth: f64,
        sec_zenith: f64,
        sec_azimuth: f64,
        sec_sun_zenith: f64,
        sec_sun_azimuth: f64,
    ) -> SimResult<Self> {
        Ok(Self {
            ref_view: ViewAngles::new(ref_zenith, ref_azimuth)?,
            ref_sun: ViewAngles::new(ref_sun_zenith, ref_sun_azimuth)?,
            sec_view: ViewAngles::new(sec_zenith, sec_azimuth)?,
            sec_sun: ViewAngles::new(sec_sun_zenith, sec_sun_azimuth)?,
        })
    }

}

pub fn read_acquisition_list(path: &Path) -> anyhow::Result<Vec<StereoAcquisition>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening acquisition list {}", path.display()))?;
    let mut acquisitions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |index: usize| -> anyhow::Result<f64> {
            let raw = record
                .get(index)
                .ok_or_else(|| anyhow::anyhow!("row {row}: missing column {index}"))?;
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("row {row}: bad angle {raw:?}"))
        };
        let acquisition = StereoAcquisition::new(
            field(0)?,
            field(1)?,
            field(2)?,
            field(3)?,
            field(4)?,
            field(5)?,
            field(6)?,
            field(7)?,
        )
        .with_context(|| format!("row {row}: invalid view angles"))?;
        acquisitions.push(acquisition);
    }
    Ok(acquisitions)
}
