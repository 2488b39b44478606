//! WGS84 <-> UTM conversion.
//!
//! Series expansion of the transverse Mercator projection on the WGS84
//! ellipsoid, accurate to well under a millimeter inside a zone.

use crate::error::{SimError, SimResult};

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity squared.
const WGS84_E2: f64 = 0.006_694_379_990_14;
/// UTM central meridian scale factor.
const K0: f64 = 0.9996;
/// False easting applied to every zone.
const FALSE_EASTING: f64 = 500_000.0;
/// False northing applied in the southern hemisphere.
const FALSE_NORTHING: f64 = 10_000_000.0;

const E2: f64 = WGS84_E2 * WGS84_E2;
const E3: f64 = E2 * WGS84_E2;
/// Second eccentricity squared, e^2 / (1 - e^2).
const E_P2: f64 = WGS84_E2 / (1.0 - WGS84_E2);

// Meridian arc series coefficients.
const M1: f64 = 1.0 - WGS84_E2 / 4.0 - 3.0 * E2 / 64.0 - 5.0 * E3 / 256.0;
const M2: f64 = 3.0 * WGS84_E2 / 8.0 + 3.0 * E2 / 32.0 + 45.0 * E3 / 1024.0;
const M3: f64 = 15.0 * E2 / 256.0 + 45.0 * E3 / 1024.0;
const M4: f64 = 35.0 * E3 / 3072.0;

const ZONE_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";

/// UTM zone number for a geodetic point, with the Norway and Svalbard
/// exceptions of the grid.
pub fn latlon_to_zone_number(lat: f64, lon: f64) -> u8 {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
        if lon < 9.0 {
            return 31;
        } else if lon < 21.0 {
            return 33;
        } else if lon < 33.0 {
            return 35;
        } else if lon < 42.0 {
            return 37;
        }
    }
    (((lon + 180.0) / 6.0) as u32 % 60 + 1) as u8
}

/// Latitude band letter (C..X, omitting I and O) for latitudes in [-80, 84].
pub fn latitude_to_zone_letter(lat: f64) -> SimResult<char> {
    if !(-80.0..=84.0).contains(&lat) {
        return Err(SimError::InvalidInput(format!(
            "latitude {lat} outside the UTM band range [-80, 84]"
        )));
    }
    let index = ((lat + 80.0) / 8.0) as usize;
    Ok(ZONE_LETTERS[index.min(ZONE_LETTERS.len() - 1)] as char)
}

fn central_meridian_deg(zone_number: u8) -> f64 {
    (zone_number as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn zone_letter_is_northern(zone_letter: char) -> bool {
    zone_letter >= 'N'
}

/// Geodetic (lat, lon) in degrees to UTM (easting, northing, zone number,
/// zone letter). The zone is derived from the point itself.
pub fn from_latlon(lat: f64, lon: f64) -> SimResult<(f64, f64, u8, char)> {
    let zone_number = latlon_to_zone_number(lat, lon);
    let zone_letter = latitude_to_zone_letter(lat)?;
    let (easting, northing) = from_latlon_with_zone(lat, lon, zone_number);
    Ok((easting, northing, zone_number, zone_letter))
}

/// Forward projection into an explicit zone. Used to keep every point of a
/// mesh in the zone of the AOI even when it straddles a zone boundary.
pub fn from_latlon_with_zone(lat: f64, lon: f64, zone_number: u8) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lat_sin = lat_rad.sin();
    let lat_cos = lat_rad.cos();
    let lat_tan = lat_sin / lat_cos;
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    let lon_rad = lon.to_radians();
    let central_rad = central_meridian_deg(zone_number).to_radians();

    let n = WGS84_A / (1.0 - WGS84_E2 * lat_sin * lat_sin).sqrt();
    let c = E_P2 * lat_cos * lat_cos;

    let a = lat_cos * (lon_rad - central_rad);
    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let m = WGS84_A
        * (M1 * lat_rad - M2 * (2.0 * lat_rad).sin() + M3 * (4.0 * lat_rad).sin()
            - M4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * E_P2))
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * E_P2)));
    if lat < 0.0 {
        northing += FALSE_NORTHING;
    }

    (easting, northing)
}

/// UTM (easting, northing, zone) back to geodetic (lat, lon) in degrees.
pub fn to_latlon(easting: f64, northing: f64, zone_number: u8, zone_letter: char) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if zone_letter_is_northern(zone_letter) {
        northing
    } else {
        northing - FALSE_NORTHING
    };

    let m = y / K0;
    let mu = m / (WGS84_A * M1);

    let e1 = (1.0 - (1.0 - WGS84_E2).sqrt()) / (1.0 + (1.0 - WGS84_E2).sqrt());
    let p2 = e1;
    let p3 = 3.0 / 2.0 * p2 - 27.0 / 32.0 * p2.powi(3);
    let p4 = 21.0 / 16.0 * p2 * p2 - 55.0 / 32.0 * p2.powi(4);
    let p5 = 151.0 / 96.0 * p2.powi(3) - 607.0 / 1344.0 * p2.powi(5);

    let p_rad =
        mu + p3 * (2.0 * mu).sin() + p4 * (4.0 * mu).sin() + p5 * (6.0 * mu).sin();

    let p_sin = p_rad.sin();
    let p_sin2 = p_sin * p_sin;
    let p_cos = p_rad.cos();
    let p_tan = p_sin / p_cos;
    let p_tan2 = p_tan * p_tan;
    let p_tan4 = p_tan2 * p_tan2;

    let n = WGS84_A / (1.0 - WGS84_E2 * p_sin2).sqrt();
    let r = (1.0 - WGS84_E2) / (1.0 - WGS84_E2 * p_sin2);

    let c = E_P2 * p_cos * p_cos;
    let c2 = c * c;

    let d = x / (n * K0);
    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat_rad = p_rad
        - (p_tan / r)
            * (d2 / 2.0 - d4 / 24.0 * (5.0 + 3.0 * p_tan2 + 10.0 * c - 4.0 * c2 - 9.0 * E_P2)
                + d6 / 720.0
                    * (61.0 + 90.0 * p_tan2 + 298.0 * c + 45.0 * p_tan4
                        - 252.0 * E_P2
                        - 3.0 * c2));

    let lon_rad = (d - d3 / 6.0 * (1.0 + 2.0 * p_tan2 + c)
        + d5 / 120.0
            * (5.0 - 2.0 * c + 28.0 * p_tan2 - 3.0 * c2 + 8.0 * E_P2 + 24.0 * p_tan4))
        / p_cos
        + central_meridian_deg(zone_number).to_radians();

    (lat_rad.to_degrees(), lon_rad.to_degrees())
}
