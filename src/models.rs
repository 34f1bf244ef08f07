use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observer location for a forecast request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

/// One forecast hour joined with sun and moon geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySample {
    pub time: DateTime<Utc>,
    pub local_time: NaiveDateTime,
    pub cloud_cover_percent: Option<f64>,
    pub relative_humidity_percent: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub temperature_c: Option<f64>,
    pub wind_speed_aloft_kmh: Option<f64>,
    pub wind_speed_surface_kmh: Option<f64>,
    pub sun_altitude_rad: f64,
    pub moon_altitude_rad: f64,
    pub moon_illumination_fraction: f64,
}

impl HourlySample {
    pub fn dew_gap_c(&self) -> Option<f64> {
        Some(self.temperature_c? - self.dew_point_c?)
    }

    pub fn moon_is_up(&self) -> bool {
        self.moon_altitude_rad > 0.0
    }
}

/// Persisted user settings: the three scalar values kept between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fit_access_token: String,
    pub gemini_api_key: String,
    pub daily_goal_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fit_access_token: String::new(),
            gemini_api_key: String::new(),
            daily_goal_minutes: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub fit_access_token: Option<String>,
    pub gemini_api_key: Option<String>,
    pub daily_goal_minutes: Option<u32>,
}

/// Settings as shown to the client; secrets are reduced to a presence flag.
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub fit_access_token_set: bool,
    pub gemini_api_key_set: bool,
    pub daily_goal_minutes: u32,
}

impl From<&Settings> for SettingsResponse {
    fn from(settings: &Settings) -> Self {
        Self {
            fit_access_token_set: !settings.fit_access_token.is_empty(),
            gemini_api_key_set: !settings.gemini_api_key.is_empty(),
            daily_goal_minutes: settings.daily_goal_minutes,
        }
    }
}

/// One recorded activity with its aggregated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_minutes: f64,
    pub steps: u64,
    pub distance_m: f64,
    pub calories_kcal: f64,
    pub avg_heart_rate_bpm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub minutes: f64,
    pub steps: u64,
    pub distance_m: f64,
    pub calories_kcal: f64,
    pub total_heart_rate: f64,
    pub heart_rate_weight: f64,
    pub avg_heart_rate: f64,
    pub duration_ms: i64,
    pub avg_speed_kmh: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub daily: PeriodMetrics,
    pub weekly: PeriodMetrics,
    pub monthly: PeriodMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FitnessResponse {
    pub sessions: Vec<Session>,
    pub summary: Option<Summary>,
    pub daily_goal_minutes: u32,
    pub goal_met: bool,
}

#[derive(Debug, Deserialize)]
pub struct SkyQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elevation: Option<f64>,
    pub bortle: Option<u8>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopwatchResponse {
    pub started_at: Option<DateTime<Utc>>,
    pub recorded_minutes: Option<f64>,
}
