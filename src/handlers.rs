use crate::errors::{AppError, ClientError};
use crate::events::{event_on, MeteorShower, NO_EVENT_MESSAGE};
use crate::models::{
    Analysis, EventQuery, FitnessResponse, Session, SettingsResponse, SettingsUpdate, Site,
    SkyQuery, StopwatchResponse, Summary,
};
use crate::prompt::{analysis_prompt, split_title};
use crate::scoring::{best_window, Bortle, SkyReport};
use crate::state::AppState;
use crate::stats::summarize;
use crate::storage::persist_settings;
use crate::ui::{DashboardView, HtmlPage, Render};
use crate::weather::build_samples;
use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{error, info};

const DEFAULT_BORTLE: u8 = 4;
const FETCH_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub date: NaiveDate,
    pub event: Option<MeteorShower>,
    pub message: String,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let settings = SettingsResponse::from(&*state.settings.lock().await);
    let dashboard = state.dashboard.lock().await;
    let today = today();
    let view = DashboardView {
        today,
        settings,
        dashboard: &dashboard,
        event: event_on(today),
    };
    Html(HtmlPage.render(&view))
}

pub async fn get_sky(
    State(state): State<AppState>,
    Query(query): Query<SkyQuery>,
) -> Result<Json<SkyReport>, AppError> {
    let (Some(latitude), Some(longitude)) = (query.lat, query.lon) else {
        return Err(AppError::bad_request("select a location first"));
    };
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::bad_request("latitude or longitude out of range"));
    }
    let bortle = Bortle::new(query.bortle.unwrap_or(DEFAULT_BORTLE))
        .ok_or_else(|| AppError::bad_request("bortle class must be between 1 and 9"))?;
    let site = Site {
        latitude,
        longitude,
        elevation_m: query.elevation.unwrap_or(0.0),
    };
    let date = query.date.unwrap_or_else(today);

    let _busy = state
        .actions
        .sky
        .try_lock()
        .map_err(|_| AppError::conflict("a sky forecast is already being fetched"))?;

    let forecast = match state.weather.fetch_day(&site, date).await {
        Ok(forecast) => forecast,
        Err(err) => return Err(record_failure(&state, "weather forecast", err).await),
    };
    let samples = build_samples(&forecast, &site, state.ephemeris.as_ref());
    let assessment = best_window(&samples, bortle, &state.profile);
    let report = SkyReport::new(date, bortle, &state.profile, assessment, event_on(date));
    info!(%date, score = report.score, limiting = ?report.limiting_factor, "sky scored");

    let mut dashboard = state.dashboard.lock().await;
    dashboard.sky = Some(report.clone());
    dashboard.last_error = None;
    Ok(Json(report))
}

pub async fn get_events(Query(query): Query<EventQuery>) -> Json<EventResponse> {
    let date = query.date.unwrap_or_else(today);
    let event = event_on(date);
    let message = match &event {
        Some(shower) => shower.headline(),
        None => NO_EVENT_MESSAGE.to_string(),
    };
    Json(EventResponse { date, event, message })
}

pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let settings = state.settings.lock().await;
    Json(SettingsResponse::from(&*settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, AppError> {
    if update.daily_goal_minutes == Some(0) {
        return Err(AppError::bad_request("daily goal must be at least one minute"));
    }

    let mut settings = state.settings.lock().await;
    if let Some(token) = update.fit_access_token {
        settings.fit_access_token = token.trim().to_string();
    }
    if let Some(key) = update.gemini_api_key {
        settings.gemini_api_key = key.trim().to_string();
    }
    if let Some(goal) = update.daily_goal_minutes {
        settings.daily_goal_minutes = goal;
    }

    persist_settings(&state.data_path, &settings).await?;
    info!("settings saved");
    Ok(Json(SettingsResponse::from(&*settings)))
}

pub async fn fetch_fitness(State(state): State<AppState>) -> Result<Json<FitnessResponse>, AppError> {
    let _busy = state
        .actions
        .fetch
        .try_lock()
        .map_err(|_| AppError::conflict("activity data is already being fetched"))?;
    Ok(Json(refresh_fitness(&state).await?))
}

pub async fn get_fitness(State(state): State<AppState>) -> Json<FitnessResponse> {
    let goal = state.settings.lock().await.daily_goal_minutes;
    let dashboard = state.dashboard.lock().await;
    Json(fitness_response(&dashboard.sessions, dashboard.summary.clone(), goal))
}

pub async fn analyze(State(state): State<AppState>) -> Result<Json<Analysis>, AppError> {
    let _busy = state
        .actions
        .analyze
        .try_lock()
        .map_err(|_| AppError::conflict("advice is already being generated"))?;

    let (api_key, goal) = {
        let settings = state.settings.lock().await;
        (settings.gemini_api_key.clone(), settings.daily_goal_minutes)
    };
    if api_key.is_empty() {
        return Err(AppError::bad_request("generative API key is not configured"));
    }
    let Some(summary) = state.dashboard.lock().await.summary.clone() else {
        return Err(AppError::bad_request("fetch activity data first"));
    };

    let prompt = analysis_prompt(&summary, goal);
    let text = match state.gemini.generate(&api_key, &prompt).await {
        Ok(text) => text,
        Err(err) => {
            let failure = record_failure(&state, "advice", err).await;
            state.dashboard.lock().await.analysis = None;
            return Err(failure);
        }
    };

    let analysis = split_title(&text);
    let mut dashboard = state.dashboard.lock().await;
    dashboard.analysis = Some(analysis.clone());
    dashboard.last_error = None;
    Ok(Json(analysis))
}

pub async fn start_activity(State(state): State<AppState>) -> Result<Json<StopwatchResponse>, AppError> {
    let mut dashboard = state.dashboard.lock().await;
    if dashboard.stopwatch_started.is_some() {
        return Err(AppError::conflict("an activity is already being timed"));
    }
    let started = Utc::now();
    dashboard.stopwatch_started = Some(started);
    info!(%started, "activity timer started");
    Ok(Json(StopwatchResponse {
        started_at: Some(started),
        recorded_minutes: None,
    }))
}

pub async fn stop_activity(State(state): State<AppState>) -> Result<Json<StopwatchResponse>, AppError> {
    let _busy = state
        .actions
        .record
        .try_lock()
        .map_err(|_| AppError::conflict("an activity is already being recorded"))?;

    let Some(started) = state.dashboard.lock().await.stopwatch_started else {
        return Err(AppError::bad_request("no activity is being timed"));
    };
    let token = state.settings.lock().await.fit_access_token.clone();
    let ended = Utc::now();
    let (start_ms, end_ms) = (started.timestamp_millis(), ended.timestamp_millis());

    if let Err(err) = state.fit.write_session(&token, start_ms, end_ms).await {
        return Err(record_failure(&state, "recording activity", err).await);
    }
    state.dashboard.lock().await.stopwatch_started = None;

    let _fetching = state.actions.fetch.lock().await;
    refresh_fitness(&state).await?;

    Ok(Json(StopwatchResponse {
        started_at: None,
        recorded_minutes: Some(end_ms.saturating_sub(start_ms) as f64 / 60_000.0),
    }))
}

/// Re-reads the last month of sessions and rebuilds the summary.
async fn refresh_fitness(state: &AppState) -> Result<FitnessResponse, AppError> {
    let (token, goal) = {
        let settings = state.settings.lock().await;
        (settings.fit_access_token.clone(), settings.daily_goal_minutes)
    };
    let (start, end) = fetch_window(Local::now());

    let sessions = match state.fit.fetch_sessions(&token, start, end).await {
        Ok(sessions) => sessions,
        Err(err) => return Err(record_failure(state, "activity fetch", err).await),
    };
    let summary = summarize(&sessions);
    info!(sessions = sessions.len(), today_minutes = summary.daily.minutes, "activity summarized");

    let mut dashboard = state.dashboard.lock().await;
    let response = fitness_response(&sessions, Some(summary.clone()), goal);
    dashboard.sessions = sessions;
    dashboard.summary = Some(summary);
    dashboard.analysis = None;
    dashboard.last_error = None;
    Ok(response)
}

fn fitness_response(sessions: &[Session], summary: Option<Summary>, goal: u32) -> FitnessResponse {
    let goal_met = summary
        .as_ref()
        .is_some_and(|s| s.daily.minutes >= f64::from(goal));
    FitnessResponse {
        sessions: sessions.to_vec(),
        summary,
        daily_goal_minutes: goal,
        goal_met,
    }
}

async fn record_failure(state: &AppState, action: &str, err: ClientError) -> AppError {
    error!(action, error = %err, "upstream call failed");
    let failure = AppError::from(err);
    state.dashboard.lock().await.last_error = Some(format!("{action} failed: {}", failure.message));
    failure
}

/// From local midnight `FETCH_DAYS` ago to the last millisecond of today.
fn fetch_window(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let midnight = |date: NaiveDate| {
        let naive = date.and_time(NaiveTime::MIN);
        naive
            .and_local_timezone(Local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc())
    };
    (
        midnight(today - Duration::days(FETCH_DAYS)),
        midnight(today + Duration::days(1)) - Duration::milliseconds(1),
    )
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
