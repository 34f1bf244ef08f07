use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Local;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::sleep;

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static GEMINI_CALLS: AtomicU32 = AtomicU32::new(0);

/// Stand-in for the forecast, fitness and generative APIs. Runs on its own
/// thread so it outlives any single test runtime.
static UPSTREAM: Lazy<String> = Lazy::new(|| {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock upstream");
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("mock runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("mock listener");
            axum::serve(listener, Router::new().fallback(mock_upstream))
                .await
                .expect("mock upstream");
        });
    });
    format!("http://{addr}")
});

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

/// Local noon today, so the mock session always lands on today's date.
fn local_noon_ms() -> i64 {
    Local::now()
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_local_timezone(Local)
        .earliest()
        .unwrap()
        .timestamp_millis()
}

fn forecast(date: &str) -> Value {
    let times: Vec<String> = (0..24).map(|h| format!("{date}T{h:02}:00")).collect();
    json!({
        "utc_offset_seconds": 0,
        "hourly": {
            "time": times,
            "cloud_cover": vec![0.0; 24],
            "relative_humidity_2m": vec![60.0; 24],
            "temperature_2m": vec![5.0; 24],
            "dewpoint_2m": vec![-2.0; 24],
            "windspeed_250hPa": vec![15.0; 24],
            "wind_speed_10m": vec![3.0; 24],
        }
    })
}

async fn mock_upstream(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path();
    match path {
        "/forecast" if method == Method::GET => {
            let date = uri
                .query()
                .unwrap_or_default()
                .split('&')
                .find_map(|pair| pair.strip_prefix("start_date="))
                .unwrap_or("2025-01-01")
                .to_string();
            Json(forecast(&date)).into_response()
        }
        "/fit/sessions" if method == Method::GET => {
            let end = local_noon_ms();
            let start = end - 30 * 60_000;
            Json(json!({
                "session": [
                    { "startTimeMillis": start.to_string(), "endTimeMillis": end.to_string(), "activityType": 7 },
                    { "startTimeMillis": start.to_string(), "endTimeMillis": end.to_string(), "activityType": 0 }
                ]
            }))
            .into_response()
        }
        "/fit/dataset:aggregate" if method == Method::POST => {
            let request: Value = serde_json::from_slice(&body).unwrap_or_default();
            let value = match request.pointer("/aggregateBy/0/dataTypeName").and_then(Value::as_str) {
                Some("com.google.step_count.delta") => json!({ "intVal": 1000 }),
                Some("com.google.distance.delta") => json!({ "fpVal": 2500.0 }),
                Some("com.google.calories.expended") => json!({ "fpVal": 150.0 }),
                _ => json!({ "fpVal": 120.0 }),
            };
            Json(json!({ "bucket": [{ "dataset": [{ "point": [{ "value": [value] }] }] }] }))
                .into_response()
        }
        p if method == Method::PUT && p.starts_with("/fit/sessions/") => Json(json!({})).into_response(),
        "/gemini" if method == Method::POST => {
            if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": "bad key" } })))
                    .into_response();
            }
            // every other call is rate limited
            if GEMINI_CALLS.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": { "message": "overloaded" } })),
                )
                    .into_response();
            }
            Json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "# Keep going\nWalk ten more minutes." }] } }]
            }))
            .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("skyfit_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/settings")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let upstream = UPSTREAM.as_str();
    let child = Command::new(env!("CARGO_BIN_EXE_skyfit"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_data_path())
        .env("WEATHER_API_URL", format!("{upstream}/forecast"))
        .env("FIT_API_URL", format!("{upstream}/fit"))
        .env("GEMINI_API_URL", format!("{upstream}/gemini"))
        .env("AI_BASE_DELAY_MS", "1")
        .env("AI_MAX_JITTER_MS", "0")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn get_json(client: &Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn post_json(client: &Client, url: String, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn http_sky_requires_a_location() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/sky?bortle=3", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("{}/api/sky?lat=35&lon=139&bortle=12", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_sky_scores_a_clear_winter_night() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, report) = get_json(
        &client,
        format!(
            "{}/api/sky?lat=51.48&lon=0&elevation=45&bortle=1&date=2025-12-21",
            server.base_url
        ),
    )
    .await;

    assert!(status.is_success());
    let score = report["score"].as_i64().unwrap();
    assert!((90..=99).contains(&score), "score {score}");
    assert_eq!(report["best"]["score"].as_i64(), Some(score));
    assert!(report["best"]["sample"]["sun_altitude_rad"].as_f64().unwrap() <= -0.314);
    assert_eq!(report["event"]["name"], "Ursids");

    let page = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains(&format!(">{score}</span>")));
}

#[tokio::test]
async fn http_sky_polar_summer_has_no_window() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, report) = get_json(
        &client,
        format!("{}/api/sky?lat=78.2&lon=15.6&bortle=1&date=2025-06-21", server.base_url),
    )
    .await;

    assert!(status.is_success());
    assert_eq!(report["score"], -1);
    assert!(report["best"].is_null());
}

#[tokio::test]
async fn http_events_lists_active_shower() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (_, body) = get_json(&client, format!("{}/api/events?date=2025-08-12", server.base_url)).await;
    assert_eq!(body["event"]["name"], "Perseids");

    let (_, body) = get_json(&client, format!("{}/api/events?date=2025-03-03", server.base_url)).await;
    assert!(body["event"].is_null());
}

#[tokio::test]
async fn http_settings_are_saved_and_masked() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, body) = post_json(
        &client,
        format!("{}/api/settings", server.base_url),
        json!({ "daily_goal_minutes": 45, "gemini_api_key": "test-key" }),
    )
    .await;
    assert!(status.is_success());
    assert_eq!(body["daily_goal_minutes"], 45);
    assert_eq!(body["gemini_api_key_set"], true);
    assert!(body.get("gemini_api_key").is_none());

    let (_, body) = get_json(&client, format!("{}/api/settings", server.base_url)).await;
    assert_eq!(body["daily_goal_minutes"], 45);

    let (status, _) = post_json(
        &client,
        format!("{}/api/settings", server.base_url),
        json!({ "daily_goal_minutes": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_fetch_then_analyze_activity() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, _) = post_json(
        &client,
        format!("{}/api/settings", server.base_url),
        json!({ "fit_access_token": "fit-token", "gemini_api_key": "test-key", "daily_goal_minutes": 30 }),
    )
    .await;
    assert!(status.is_success());

    let (status, body) = post_json(&client, format!("{}/api/fitness/fetch", server.base_url), json!({})).await;
    assert!(status.is_success());
    assert_eq!(body["sessions"].as_array().map(Vec::len), Some(1));
    let daily = &body["summary"]["daily"];
    assert!((daily["minutes"].as_f64().unwrap() - 30.0).abs() < 0.01);
    assert_eq!(daily["steps"], 1000);
    assert!((daily["avg_speed_kmh"].as_f64().unwrap() - 5.0).abs() < 0.01);
    assert_eq!(body["goal_met"], true);

    let (status, analysis) =
        post_json(&client, format!("{}/api/fitness/analyze", server.base_url), json!({})).await;
    assert!(status.is_success());
    assert_eq!(analysis["title"], "Keep going");
    assert_eq!(analysis["content"], "Walk ten more minutes.");
}

#[tokio::test]
async fn http_activity_timer_records_a_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, _) = post_json(
        &client,
        format!("{}/api/settings", server.base_url),
        json!({ "fit_access_token": "fit-token" }),
    )
    .await;
    assert!(status.is_success());

    let (status, _) = post_json(&client, format!("{}/api/activity/stop", server.base_url), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, started) =
        post_json(&client, format!("{}/api/activity/start", server.base_url), json!({})).await;
    assert!(status.is_success());
    assert!(started["started_at"].is_string());

    let (status, _) = post_json(&client, format!("{}/api/activity/start", server.base_url), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stopped) =
        post_json(&client, format!("{}/api/activity/stop", server.base_url), json!({})).await;
    assert!(status.is_success());
    assert!(stopped["recorded_minutes"].as_f64().unwrap() >= 0.0);

    let (_, summary) = get_json(&client, format!("{}/api/fitness/summary", server.base_url)).await;
    assert!(summary["summary"].is_object());
}
