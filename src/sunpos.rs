//! Sun position from UTC time and observer location.
//!
//! Low-precision solar ephemeris (J2000 day number, mean longitude and
//! anomaly, ecliptic longitude, obliquity, sidereal time, hour angle),
//! accurate to a fraction of a degree between 1901 and 2099. Azimuth is
//! measured from north over east; elevation from the horizon.

/// A UTC instant, second resolution.
#[derive(Debug, Clone, Copy)]
pub struct UtcMoment {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

fn into_range(x: f64, range_min: f64, range_max: f64) -> f64 {
    let shifted = x - range_min;
    let delta = range_max - range_min;
    ((shifted % delta) + delta) % delta + range_min
}

/// (azimuth, elevation) of the sun in degrees.
pub fn sun_position(when: &UtcMoment, latitude: f64, longitude: f64, refraction: bool) -> (f64, f64) {
    let rlat = latitude.to_radians();
    let rlon = longitude.to_radians();

    let greenwich_hours =
        when.hour as f64 + when.minute as f64 / 60.0 + when.second as f64 / 3600.0;

    // days from J2000
    let year = when.year as i64;
    let month = when.month as i64;
    let day = when.day as i64;
    let daynum = (367 * year - 7 * (year + (month + 9) / 12) / 4 + 275 * month / 9 + day) as f64
        - 730531.5
        + greenwich_hours / 24.0;

    let mean_long = daynum * 0.01720279239 + 4.894967873;
    let mean_anom = daynum * 0.01720197034 + 6.240040768;
    let eclip_long = mean_long
        + 0.03342305518 * mean_anom.sin()
        + 0.0003490658504 * (2.0 * mean_anom).sin();
    let obliquity = 0.4090877234 - 0.000000006981317008 * daynum;

    let rasc = (obliquity.cos() * eclip_long.sin()).atan2(eclip_long.cos());
    let decl = (obliquity.sin() * eclip_long.sin()).asin();

    let sidereal = 4.894961213 + 6.300388099 * daynum + rlon;
    let hour_ang = sidereal - rasc;

    let elevation =
        (decl.sin() * rlat.sin() + decl.cos() * rlat.cos() * hour_ang.cos()).asin();
    let azimuth = (-(decl.cos()) * rlat.cos() * hour_ang.sin())
        .atan2(decl.sin() - rlat.sin() * elevation.sin());

    let azimuth = into_range(azimuth.to_degrees(), 0.0, 360.0);
    let mut elevation = into_range(elevation.to_degrees(), -180.0, 180.0);

    if refraction {
        let targ = (elevation + 10.3 / (elevation + 5.11)).to_radians();
        elevation += (1.02 / targ.tan()) / 60.0;
    }

    (azimuth, elevation)
}

/// Sun orientation as the (zenith, azimuth) pair the simulator consumes.
pub fn sun_zenith_azimuth(when: &UtcMoment, latitude: f64, longitude: f64) -> (f64, f64) {
    let (azimuth, elevation) = sun_position(when, latitude, longitude, false);
    (90.0 - elevation, azimuth)
}
