//! Fitness REST client: session listing, per-session aggregates, session writes.

use crate::errors::ClientError;
use crate::models::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Activity type code the API uses for walking.
pub const WALKING_ACTIVITY: i64 = 7;
const UNKNOWN_ACTIVITY: i64 = 0;
const HEART_RATE_BUCKET_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Steps,
    Distance,
    Calories,
    HeartRate,
}

impl Metric {
    const ALL: [Metric; 4] = [Metric::Steps, Metric::Distance, Metric::Calories, Metric::HeartRate];

    fn data_type(self) -> &'static str {
        match self {
            Metric::Steps => "com.google.step_count.delta",
            Metric::Distance => "com.google.distance.delta",
            Metric::Calories => "com.google.calories.expended",
            Metric::HeartRate => "com.google.heart_rate.bpm",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionList {
    #[serde(default)]
    session: Vec<RawSession>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    #[serde(deserialize_with = "millis")]
    start_time_millis: i64,
    #[serde(deserialize_with = "millis")]
    end_time_millis: i64,
    #[serde(default)]
    activity_type: i64,
}

impl RawSession {
    fn duration_ms(&self) -> i64 {
        self.end_time_millis.saturating_sub(self.start_time_millis).max(0)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AggregateResponse {
    #[serde(default)]
    pub bucket: Vec<Bucket>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub dataset: Vec<Dataset>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub point: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub value: Vec<PointValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValue {
    pub fp_val: Option<f64>,
    pub int_val: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionWrite {
    id: String,
    name: String,
    description: String,
    start_time_millis: String,
    end_time_millis: String,
    activity_type: i64,
}

/// The API encodes int64 as JSON strings; accept either form.
fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Sum of all point values, or their mean when `average` is set.
pub fn extract_value(buckets: &[Bucket], average: bool) -> f64 {
    let values: Vec<f64> = buckets
        .iter()
        .flat_map(|b| &b.dataset)
        .flat_map(|d| &d.point)
        .map(|p| {
            p.value
                .first()
                .and_then(|v| v.fp_val.or(v.int_val.map(|i| i as f64)))
                .unwrap_or(0.0)
        })
        .collect();

    let total: f64 = values.iter().sum();
    if average {
        if values.is_empty() { 0.0 } else { total / values.len() as f64 }
    } else {
        total
    }
}

/// HH:MM:SS for a span in milliseconds.
pub fn format_duration(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}

#[derive(Clone)]
pub struct FitClient {
    http: Client,
    base_url: String,
}

impl FitClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists sessions in `[start, end]` and aggregates metrics for each one.
    /// Requests go out one at a time.
    pub async fn fetch_sessions(
        &self,
        token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, ClientError> {
        let token = require_token(token)?;
        let request = self
            .http
            .get(format!("{}/sessions", self.base_url))
            .query(&[
                ("startTime", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("endTime", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("includeDeleted", "false".to_string()),
            ]);
        let list: SessionList = send_json(request.bearer_auth(token)).await?;
        info!(count = list.session.len(), "fitness sessions listed");

        let mut sessions = Vec::new();
        for raw in list.session.iter().filter(|s| s.activity_type != UNKNOWN_ACTIVITY) {
            sessions.push(self.session_details(token, raw).await?);
        }
        Ok(sessions)
    }

    async fn session_details(&self, token: &str, raw: &RawSession) -> Result<Session, ClientError> {
        let duration_ms = raw.duration_ms();
        let mut values = [0.0; 4];
        for (slot, metric) in values.iter_mut().zip(Metric::ALL) {
            let bucket_ms = match metric {
                Metric::HeartRate => HEART_RATE_BUCKET_MS,
                _ => duration_ms.max(1),
            };
            let buckets = self
                .aggregate(token, metric, raw.start_time_millis, raw.end_time_millis, bucket_ms)
                .await?;
            *slot = extract_value(&buckets, metric == Metric::HeartRate);
        }
        let [steps, distance_m, calories_kcal, avg_heart_rate_bpm] = values;

        debug!(start = raw.start_time_millis, steps, distance_m, "session aggregated");
        Ok(Session {
            start_ms: raw.start_time_millis,
            end_ms: raw.end_time_millis,
            duration_minutes: duration_ms as f64 / 60_000.0,
            steps: steps.round().max(0.0) as u64,
            distance_m,
            calories_kcal,
            avg_heart_rate_bpm,
        })
    }

    async fn aggregate(
        &self,
        token: &str,
        metric: Metric,
        start_ms: i64,
        end_ms: i64,
        bucket_ms: i64,
    ) -> Result<Vec<Bucket>, ClientError> {
        let body = json!({
            "aggregateBy": [{ "dataTypeName": metric.data_type() }],
            "bucketByTime": { "durationMillis": bucket_ms },
            "startTimeMillis": start_ms,
            "endTimeMillis": end_ms,
        });
        let request = self
            .http
            .post(format!("{}/dataset:aggregate", self.base_url))
            .bearer_auth(token)
            .json(&body);
        let response: AggregateResponse = send_json(request).await?;
        Ok(response.bucket)
    }

    /// Records a walking session covering `[start_ms, end_ms]`.
    pub async fn write_session(&self, token: &str, start_ms: i64, end_ms: i64) -> Result<(), ClientError> {
        let token = require_token(token)?;
        let id = format!("activity-tracker-{start_ms}-{end_ms}");
        let day = DateTime::<Utc>::from_timestamp_millis(start_ms)
            .map(|t| t.date_naive().to_string())
            .unwrap_or_default();
        let body = SessionWrite {
            id: id.clone(),
            name: format!("Recorded activity ({day})"),
            description: format!("Active time: {}", format_duration(end_ms.saturating_sub(start_ms))),
            start_time_millis: start_ms.to_string(),
            end_time_millis: end_ms.to_string(),
            activity_type: WALKING_ACTIVITY,
        };

        let response = self
            .http
            .put(format!("{}/sessions/{id}", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        info!(%id, "activity session written");
        Ok(())
    }
}

fn require_token(token: &str) -> Result<&str, ClientError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ClientError::MissingCredential("fitness access token"));
    }
    Ok(token)
}

async fn check_status(response: Response) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            message: google_error_message(&body),
        });
    }
    Ok(body)
}

async fn send_json<T: for<'de> Deserialize<'de>>(request: RequestBuilder) -> Result<T, ClientError> {
    let body = check_status(request.send().await?).await?;
    serde_json::from_str(&body).map_err(|err| ClientError::Malformed(err.to_string()))
}

/// Pulls `error.message` out of a Google API error body.
pub fn google_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
