//! Sun and moon geometry for a single instant and observer.
//!
//! Positions come from the `astro` crate (Meeus' solar and ELP lunar
//! series). Altitudes are topocentric for the moon, geocentric for the sun,
//! and ignore atmospheric refraction.

use astro::{coords, ecliptic, lunar, sun, time};
use chrono::{DateTime, Utc};

const MS_PER_DAY: f64 = 86_400_000.0;
const JULIAN_UNIX_EPOCH: f64 = 2_440_587.5;
const AU_KM: f64 = 149_597_870.7;
const EARTH_RADIUS_KM: f64 = 6_378.14;

/// Source of sun/moon geometry for the scorer.
pub trait Ephemeris: Send + Sync {
    /// Sun altitude above the horizon in radians.
    fn sun_altitude(&self, at: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> f64;
    /// Moon altitude above the horizon in radians.
    fn moon_altitude(&self, at: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> f64;
    /// Illuminated fraction of the lunar disc, 0.0 (new) to 1.0 (full).
    fn moon_illumination(&self, at: DateTime<Utc>) -> f64;
}

/// Ephemeris backed by the `astro` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Meeus;

impl Ephemeris for Meeus {
    fn sun_altitude(&self, at: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> f64 {
        let jd = julian_day(at);
        let (point, _) = sun::geocent_ecl_pos(jd);
        horizon_altitude(jd, point, lat_deg, lon_deg)
    }

    fn moon_altitude(&self, at: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> f64 {
        let jd = julian_day(at);
        let (point, distance_km) = lunar::geocent_ecl_pos(jd);
        let geocentric = horizon_altitude(jd, point, lat_deg, lon_deg);
        // horizontal parallax lowers the moon by up to a degree
        let parallax = (EARTH_RADIUS_KM / distance_km).asin();
        geocentric - parallax * geocentric.cos()
    }

    fn moon_illumination(&self, at: DateTime<Utc>) -> f64 {
        let jd = julian_day(at);
        let (sun_point, sun_au) = sun::geocent_ecl_pos(jd);
        let (moon_point, moon_km) = lunar::geocent_ecl_pos(jd);
        let sun_km = sun_au * AU_KM;

        let elongation = (moon_point.lat.cos() * (moon_point.long - sun_point.long).cos())
            .clamp(-1.0, 1.0)
            .acos();
        let phase_angle = (sun_km * elongation.sin()).atan2(moon_km - sun_km * elongation.cos());
        (1.0 + phase_angle.cos()) / 2.0
    }
}

fn julian_day(at: DateTime<Utc>) -> f64 {
    JULIAN_UNIX_EPOCH + at.timestamp_millis() as f64 / MS_PER_DAY
}

fn horizon_altitude(jd: f64, point: coords::EclPoint, lat_deg: f64, lon_deg: f64) -> f64 {
    let obliquity = ecliptic::mn_oblq_laskar(jd);
    let right_ascension = coords::asc_frm_ecl(point.long, point.lat, obliquity);
    let declination = coords::dec_frm_ecl(point.long, point.lat, obliquity);
    let hour_angle = time::mn_sidr(jd) + lon_deg.to_radians() - right_ascension;
    coords::alt_frm_eq(hour_angle, declination, lat_deg.to_radians())
}
