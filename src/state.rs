use crate::config::Config;
use crate::ephemeris::{Ephemeris, Meeus};
use crate::fit::FitClient;
use crate::gemini::GeminiClient;
use crate::models::{Analysis, Session, Settings, Summary};
use crate::scoring::{ScoringProfile, SkyReport};
use crate::weather::WeatherClient;
use chrono::{DateTime, Utc};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

/// Results of the most recent actions. Each fetch replaces its part wholesale.
#[derive(Debug, Default)]
pub struct Dashboard {
    pub sessions: Vec<Session>,
    pub summary: Option<Summary>,
    pub analysis: Option<Analysis>,
    pub sky: Option<SkyReport>,
    pub last_error: Option<String>,
    pub stopwatch_started: Option<DateTime<Utc>>,
}

/// One lock per user action; a held lock means a request is in flight.
#[derive(Debug, Default)]
pub struct ActionLocks {
    pub sky: Mutex<()>,
    pub fetch: Mutex<()>,
    pub analyze: Mutex<()>,
    pub record: Mutex<()>,
}

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub settings: Arc<Mutex<Settings>>,
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub actions: Arc<ActionLocks>,
    pub weather: WeatherClient,
    pub fit: FitClient,
    pub gemini: GeminiClient,
    pub ephemeris: Arc<dyn Ephemeris>,
    pub profile: Arc<ScoringProfile>,
}

impl AppState {
    pub fn new(config: &Config, settings: Settings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            data_path: config.data_path.clone(),
            settings: Arc::new(Mutex::new(settings)),
            dashboard: Arc::new(Mutex::new(Dashboard::default())),
            actions: Arc::new(ActionLocks::default()),
            weather: WeatherClient::new(http.clone(), config.weather_api_url.clone()),
            fit: FitClient::new(http.clone(), config.fit_api_url.clone()),
            gemini: GeminiClient::new(http, config.gemini_api_url.clone(), config.ai_retry),
            ephemeris: Arc::new(Meeus),
            profile: Arc::new(config.scoring_profile.clone()),
        })
    }
}
