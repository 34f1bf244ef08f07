use crate::retry::RetryPolicy;
use crate::scoring::ScoringProfile;
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_FIT_API_URL: &str = "https://www.googleapis.com/fitness/v1/users/me";
pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub weather_api_url: String,
    pub fit_api_url: String,
    pub gemini_api_url: String,
    pub scoring_profile: ScoringProfile,
    pub http_timeout: Duration,
    pub ai_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_path: PathBuf::from("data/settings.json"),
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            fit_api_url: DEFAULT_FIT_API_URL.to_string(),
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            scoring_profile: ScoringProfile::classic(),
            http_timeout: Duration::from_millis(15_000),
            ai_retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let scoring_profile = match env::var("SCORING_PROFILE") {
            Ok(name) => ScoringProfile::by_name(name.trim()).unwrap_or_else(|| {
                warn!(profile = %name, "unknown scoring profile, using classic");
                ScoringProfile::classic()
            }),
            Err(_) => defaults.scoring_profile,
        };

        let ai_retry = RetryPolicy {
            max_attempts: parse_var("AI_MAX_ATTEMPTS", defaults.ai_retry.max_attempts),
            base_delay: Duration::from_millis(parse_var(
                "AI_BASE_DELAY_MS",
                defaults.ai_retry.base_delay.as_millis() as u64,
            )),
            max_jitter: Duration::from_millis(parse_var(
                "AI_MAX_JITTER_MS",
                defaults.ai_retry.max_jitter.as_millis() as u64,
            )),
        };

        Self {
            port: parse_var("PORT", defaults.port),
            data_path: env::var("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            weather_api_url: env::var("WEATHER_API_URL").unwrap_or(defaults.weather_api_url),
            fit_api_url: env::var("FIT_API_URL").unwrap_or(defaults.fit_api_url),
            gemini_api_url: env::var("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            scoring_profile,
            http_timeout: Duration::from_millis(parse_var(
                "HTTP_TIMEOUT_MS",
                defaults.http_timeout.as_millis() as u64,
            )),
            ai_retry,
        }
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(var = name, value = %value, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
