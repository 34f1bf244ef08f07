use crate::ephemeris::Ephemeris;
use crate::errors::ClientError;
use crate::models::{HourlySample, Site};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

const HOURLY_VARIABLES: &str =
    "cloud_cover,relative_humidity_2m,temperature_2m,dewpoint_2m,windspeed_250hPa,wind_speed_10m";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Real-world UTC offsets stay within +/-18 hours.
const MAX_UTC_OFFSET_SECONDS: i64 = 18 * 3600;

/// Hourly forecast as returned by the forecast API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub utc_offset_seconds: i64,
    #[serde(default)]
    pub hourly: HourlySeries,
}

/// Time-aligned arrays; nulls mark hours without data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub cloud_cover: Vec<Option<f64>>,
    pub relative_humidity_2m: Vec<Option<f64>>,
    pub temperature_2m: Vec<Option<f64>>,
    pub dewpoint_2m: Vec<Option<f64>>,
    #[serde(rename = "windspeed_250hPa")]
    pub windspeed_250hpa: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<Option<f64>>,
}

#[derive(Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetches the hourly forecast for one local calendar day.
    pub async fn fetch_day(&self, site: &Site, date: NaiveDate) -> Result<Forecast, ClientError> {
        let day = date.to_string();
        debug!(lat = site.latitude, lon = site.longitude, %day, "requesting forecast");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", site.latitude.to_string()),
                ("longitude", site.longitude.to_string()),
                ("elevation", site.elevation_m.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("start_date", day.clone()),
                ("end_date", day),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: upstream_reason(&body),
            });
        }

        let forecast: Forecast =
            serde_json::from_str(&body).map_err(|err| ClientError::Malformed(err.to_string()))?;
        check_offset(&forecast)?;
        info!(hours = forecast.hourly.time.len(), "forecast received");
        Ok(forecast)
    }
}

fn check_offset(forecast: &Forecast) -> Result<(), ClientError> {
    if forecast.utc_offset_seconds.abs() > MAX_UTC_OFFSET_SECONDS {
        return Err(ClientError::Malformed(format!(
            "utc_offset_seconds {} is out of range",
            forecast.utc_offset_seconds
        )));
    }
    Ok(())
}

/// Joins the forecast arrays with sun and moon geometry for each hour.
pub fn build_samples(forecast: &Forecast, site: &Site, ephemeris: &dyn Ephemeris) -> Vec<HourlySample> {
    let hourly = &forecast.hourly;
    let Some(offset) = TimeDelta::try_seconds(forecast.utc_offset_seconds) else {
        warn!(offset = forecast.utc_offset_seconds, "forecast offset unusable, no hours kept");
        return Vec::new();
    };

    hourly
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, stamp)| {
            let local_time = match NaiveDateTime::parse_from_str(stamp, TIME_FORMAT) {
                Ok(t) => t,
                Err(err) => {
                    warn!(%stamp, error = %err, "skipping unparsable forecast hour");
                    return None;
                }
            };
            let Some(time) = local_time.checked_sub_signed(offset).map(|t| t.and_utc()) else {
                warn!(%stamp, offset = forecast.utc_offset_seconds, "skipping hour outside the calendar");
                return None;
            };

            Some(HourlySample {
                time,
                local_time,
                cloud_cover_percent: value_at(&hourly.cloud_cover, i),
                relative_humidity_percent: value_at(&hourly.relative_humidity_2m, i),
                dew_point_c: value_at(&hourly.dewpoint_2m, i),
                temperature_c: value_at(&hourly.temperature_2m, i),
                wind_speed_aloft_kmh: value_at(&hourly.windspeed_250hpa, i),
                wind_speed_surface_kmh: value_at(&hourly.wind_speed_10m, i),
                sun_altitude_rad: ephemeris.sun_altitude(time, site.latitude, site.longitude),
                moon_altitude_rad: ephemeris.moon_altitude(time, site.latitude, site.longitude),
                moon_illumination_fraction: ephemeris.moon_illumination(time),
            })
        })
        .collect()
}

fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten().filter(|v| v.is_finite())
}

fn upstream_reason(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedSky;

    impl Ephemeris for FixedSky {
        fn sun_altitude(&self, at: DateTime<Utc>, _lat: f64, _lon: f64) -> f64 {
            if at.format("%H").to_string() == "15" { -0.5 } else { 0.1 }
        }
        fn moon_altitude(&self, _at: DateTime<Utc>, _lat: f64, _lon: f64) -> f64 {
            -0.1
        }
        fn moon_illumination(&self, _at: DateTime<Utc>) -> f64 {
            0.25
        }
    }

    const SITE: Site = Site {
        latitude: 35.0,
        longitude: 139.0,
        elevation_m: 1200.0,
    };

    #[test]
    fn parses_forecast_with_nulls_and_offset() {
        let body = r#"{
            "utc_offset_seconds": 32400,
            "hourly": {
                "time": ["2025-11-21T00:00", "2025-11-21T01:00"],
                "cloud_cover": [12, null],
                "relative_humidity_2m": [70, 72],
                "temperature_2m": [3.5, 3.1],
                "dewpoint_2m": [-1.0, -0.8],
                "windspeed_250hPa": [40.2, 38.0],
                "wind_speed_10m": [4.0]
            }
        }"#;
        let forecast: Forecast = serde_json::from_str(body).unwrap();
        let samples = build_samples(&forecast, &SITE, &FixedSky);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].time, Utc.with_ymd_and_hms(2025, 11, 20, 15, 0, 0).unwrap());
        assert_eq!(samples[0].cloud_cover_percent, Some(12.0));
        assert_eq!(samples[0].sun_altitude_rad, -0.5);
        assert_eq!(samples[1].cloud_cover_percent, None);
        assert_eq!(samples[1].wind_speed_surface_kmh, None);
        assert_eq!(samples[1].moon_illumination_fraction, 0.25);
    }

    #[test]
    fn skips_bad_timestamps() {
        let forecast = Forecast {
            utc_offset_seconds: 0,
            hourly: HourlySeries {
                time: vec!["not-a-time".to_string(), "2025-11-21T03:00".to_string()],
                ..HourlySeries::default()
            },
        };
        let samples = build_samples(&forecast, &SITE, &FixedSky);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].dew_gap_c(), None);
    }

    #[test]
    fn absurd_offsets_are_rejected_without_panicking() {
        let body = r#"{
            "utc_offset_seconds": 9223372036854775,
            "hourly": { "time": ["2025-11-21T00:00"], "cloud_cover": [0] }
        }"#;
        let forecast: Forecast = serde_json::from_str(body).unwrap();
        assert!(build_samples(&forecast, &SITE, &FixedSky).is_empty());
        assert!(matches!(check_offset(&forecast), Err(ClientError::Malformed(_))));

        let edge = Forecast {
            utc_offset_seconds: 86_400 * 365 * 300_000,
            hourly: HourlySeries {
                time: vec!["2025-11-21T00:00".to_string()],
                ..HourlySeries::default()
            },
        };
        assert!(build_samples(&edge, &SITE, &FixedSky).is_empty());
    }

    #[test]
    fn real_offsets_pass_the_check() {
        for offset in [-12 * 3600, 0, 5 * 3600 + 1800, 14 * 3600] {
            let forecast = Forecast {
                utc_offset_seconds: offset,
                ..Forecast::default()
            };
            assert!(check_offset(&forecast).is_ok());
        }
    }

    #[test]
    fn upstream_reason_prefers_json_reason() {
        assert_eq!(upstream_reason(r#"{"error":true,"reason":"bad latitude"}"#), "bad latitude");
        assert_eq!(upstream_reason("plain failure"), "plain failure");
    }
}
