use crate::events::{MeteorShower, NO_EVENT_MESSAGE};
use crate::models::{PeriodMetrics, SettingsResponse};
use crate::scoring::SkyReport;
use crate::state::Dashboard;
use chrono::NaiveDate;

/// Everything a front-end needs to draw the dashboard once.
pub struct DashboardView<'a> {
    pub today: NaiveDate,
    pub settings: SettingsResponse,
    pub dashboard: &'a Dashboard,
    pub event: Option<MeteorShower>,
}

/// A front-end that turns a dashboard snapshot into a page.
pub trait Render {
    fn render(&self, view: &DashboardView<'_>) -> String;
}

/// Server-rendered HTML page.
pub struct HtmlPage;

impl Render for HtmlPage {
    fn render(&self, view: &DashboardView<'_>) -> String {
        let dashboard = view.dashboard;
        let sky = SkyFields::from_report(dashboard.sky.as_ref());
        let event = view
            .event
            .map(|e| e.headline())
            .unwrap_or_else(|| NO_EVENT_MESSAGE.to_string());
        let (daily, weekly, monthly) = match &dashboard.summary {
            Some(s) => (metrics_line(&s.daily), metrics_line(&s.weekly), metrics_line(&s.monthly)),
            None => {
                let empty = "No data fetched yet".to_string();
                (empty.clone(), empty.clone(), empty)
            }
        };
        let (analysis_title, analysis) = match &dashboard.analysis {
            Some(a) => (a.title.as_str(), a.content.as_str()),
            None => ("AI advice", ""),
        };
        let timer = dashboard
            .stopwatch_started
            .map(|t| format!("Timing since {}", t.format("%H:%M:%S UTC")))
            .unwrap_or_else(|| "Stopped".to_string());

        INDEX_HTML
            .replace("{{TODAY}}", &view.today.to_string())
            .replace("{{EVENT}}", &escape(&event))
            .replace("{{SCORE}}", &sky.score)
            .replace("{{GAUGE_DEG}}", &sky.gauge_degrees.to_string())
            .replace("{{CLOUD}}", &sky.cloud)
            .replace("{{WIND}}", &sky.wind)
            .replace("{{DEW}}", &sky.dew)
            .replace("{{MOON}}", &sky.moon)
            .replace("{{SKY_MESSAGE}}", &escape(&sky.message))
            .replace("{{GOAL}}", &view.settings.daily_goal_minutes.to_string())
            .replace("{{FIT_TOKEN_HINT}}", &secret_hint("Fitness access token", view.settings.fit_access_token_set))
            .replace("{{GEMINI_KEY_HINT}}", &secret_hint("Generative API key", view.settings.gemini_api_key_set))
            .replace("{{DAILY}}", &daily)
            .replace("{{WEEKLY}}", &weekly)
            .replace("{{MONTHLY}}", &monthly)
            .replace("{{ANALYSIS_TITLE}}", &escape(analysis_title))
            .replace("{{ANALYSIS}}", &escape(analysis))
            .replace("{{TIMER}}", &timer)
            .replace("{{ERROR}}", &escape(dashboard.last_error.as_deref().unwrap_or("")))
    }
}

/// Display strings for the winning hour's contributing factors.
#[derive(Debug, PartialEq)]
pub struct SkyFields {
    pub score: String,
    pub gauge_degrees: f64,
    pub cloud: String,
    pub wind: String,
    pub dew: String,
    pub moon: String,
    pub message: String,
}

impl SkyFields {
    pub fn from_report(report: Option<&SkyReport>) -> Self {
        let blank = || "--".to_string();
        let Some(report) = report else {
            return Self {
                score: blank(),
                gauge_degrees: 0.0,
                cloud: blank(),
                wind: blank(),
                dew: blank(),
                moon: blank(),
                message: "Pick a location and date to score the night.".to_string(),
            };
        };
        let Some(best) = &report.best else {
            return Self {
                score: blank(),
                gauge_degrees: 0.0,
                cloud: blank(),
                wind: blank(),
                dew: blank(),
                moon: blank(),
                message: report.message.clone(),
            };
        };

        let sample = &best.sample;
        let fmt = |value: Option<f64>, decimals: usize| {
            value.map(|v| format!("{v:.decimals$}")).unwrap_or_else(blank)
        };
        Self {
            score: best.score.to_string(),
            gauge_degrees: f64::from(best.score) * 3.6,
            cloud: fmt(sample.cloud_cover_percent, 0),
            wind: fmt(sample.wind_speed_aloft_kmh, 0),
            dew: fmt(sample.dew_gap_c(), 1),
            moon: if sample.moon_is_up() {
                format!("{:.0}%", sample.moon_illumination_fraction * 100.0)
            } else {
                "set".to_string()
            },
            message: format!(
                "{} Best at {} (limited by {}, SQM ~{:.1}).",
                report.message,
                sample.local_time.format("%H:%M"),
                best.limiting_factor.label(),
                best.sqm_estimate
            ),
        }
    }
}

fn secret_hint(label: &str, saved: bool) -> String {
    if saved {
        format!("{label} (saved)")
    } else {
        label.to_string()
    }
}

fn metrics_line(metrics: &PeriodMetrics) -> String {
    format!(
        "{:.1} min, {} steps, {:.2} km, {:.0} kcal, {:.1} km/h, {:.0} bpm",
        metrics.minutes,
        metrics.steps,
        metrics.distance_m / 1000.0,
        metrics.calories_kcal,
        metrics.avg_speed_kmh,
        metrics.avg_heart_rate
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            // keeps upstream text from forming template placeholders
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Skyfit</title>
  <style>
    :root {
      --bg: #07070b;
      --card: #14141c;
      --ink: #f2d7d7;
      --muted: #9a8585;
      --accent: #ff4d4d;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 28px 16px 48px;
    }

    body.normal-mode {
      --ink: #f5f5f5;
      --muted: #a0a0a8;
      --accent: #4da3ff;
    }

    .app {
      width: min(880px, 100%);
      display: grid;
      gap: 22px;
    }

    .card {
      background: var(--card);
      border-radius: 18px;
      padding: 22px;
      display: grid;
      gap: 14px;
    }

    h1, h2 {
      margin: 0;
    }

    .row {
      display: flex;
      flex-wrap: wrap;
      gap: 10px;
      align-items: center;
    }

    input, button {
      font: inherit;
      border-radius: 10px;
      border: 1px solid #333;
      padding: 8px 12px;
      background: #0d0d12;
      color: var(--ink);
    }

    button {
      cursor: pointer;
      border-color: var(--accent);
    }

    #gauge {
      width: 160px;
      height: 160px;
      border-radius: 50%;
      display: grid;
      place-items: center;
      background: conic-gradient(var(--accent) {{GAUGE_DEG}}deg, #111 0deg);
    }

    #score-value {
      font-size: 2.6rem;
      font-weight: 700;
      background: var(--card);
      border-radius: 50%;
      width: 120px;
      height: 120px;
      display: grid;
      place-items: center;
    }

    .factors {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
      gap: 10px;
    }

    .label {
      color: var(--muted);
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
    }

    .status {
      color: var(--accent);
      min-height: 1.2em;
    }

    pre {
      white-space: pre-wrap;
      margin: 0;
    }
  </style>
</head>
<body>
  <main class="app">
    <header class="row">
      <h1>Skyfit</h1>
      <button class="mode-toggle-btn" type="button" id="mode-btn">Switch to normal mode</button>
    </header>

    <section class="card">
      <h2>Tonight's sky</h2>
      <p id="event-text">{{EVENT}}</p>
      <form class="row" id="sky-form">
        <input name="lat" placeholder="Latitude" required />
        <input name="lon" placeholder="Longitude" required />
        <input name="elevation" placeholder="Elevation (m)" />
        <input name="bortle" placeholder="Bortle 1-9" />
        <input name="date" type="date" value="{{TODAY}}" />
        <button type="submit">Analyse</button>
      </form>
      <div class="row">
        <div id="gauge"><span id="score-value">{{SCORE}}</span></div>
        <div class="factors">
          <div><span class="label">Cloud %</span><div id="val-cloud">{{CLOUD}}</div></div>
          <div><span class="label">Wind aloft km/h</span><div id="val-wind">{{WIND}}</div></div>
          <div><span class="label">Dew gap °C</span><div id="val-dew">{{DEW}}</div></div>
          <div><span class="label">Moon</span><div id="val-moon">{{MOON}}</div></div>
        </div>
      </div>
      <p id="sky-output">{{SKY_MESSAGE}}</p>
    </section>

    <section class="card">
      <h2>Activity</h2>
      <p><span class="label">Daily goal</span> {{GOAL}} min</p>
      <p><span class="label">Today</span> <span id="daily">{{DAILY}}</span></p>
      <p><span class="label">This week</span> <span id="weekly">{{WEEKLY}}</span></p>
      <p><span class="label">This month</span> <span id="monthly">{{MONTHLY}}</span></p>
      <div class="row">
        <button type="button" id="fetch-btn">Fetch activity</button>
        <button type="button" id="analyze-btn">Get advice</button>
        <button type="button" id="start-btn">Start timer</button>
        <button type="button" id="stop-btn">Stop and record</button>
        <span id="timer">{{TIMER}}</span>
      </div>
      <h2 id="analysis-title">{{ANALYSIS_TITLE}}</h2>
      <pre id="analysis">{{ANALYSIS}}</pre>
    </section>

    <section class="card">
      <h2>Settings</h2>
      <form class="row" id="settings-form">
        <input name="fit_access_token" type="password" autocomplete="off" placeholder="{{FIT_TOKEN_HINT}}" />
        <input name="gemini_api_key" type="password" autocomplete="off" placeholder="{{GEMINI_KEY_HINT}}" />
        <label class="row"><span class="label">Goal (min)</span>
          <input name="daily_goal_minutes" type="number" min="1" value="{{GOAL}}" />
        </label>
      </form>
    </section>

    <div class="status" id="status">{{ERROR}}</div>
  </main>

  <script>
    const statusEl = document.getElementById('status');
    const setStatus = (message) => { statusEl.textContent = message; };

    const call = async (method, url, body) => {
      const init = { method };
      if (body !== undefined) {
        init.headers = { 'Content-Type': 'application/json' };
        init.body = JSON.stringify(body);
      }
      const res = await fetch(url, init);
      if (!res.ok) {
        throw new Error((await res.text()) || 'Request failed');
      }
      return res.json();
    };

    const run = (method, url) => {
      setStatus('Working...');
      call(method, url)
        .then(() => window.location.reload())
        .catch((err) => setStatus(err.message));
    };

    document.getElementById('sky-form').addEventListener('submit', (event) => {
      event.preventDefault();
      const params = new URLSearchParams();
      new FormData(event.target).forEach((value, key) => {
        if (value) params.append(key, value);
      });
      run('GET', `/api/sky?${params}`);
    });

    document.getElementById('fetch-btn').addEventListener('click', () => run('POST', '/api/fitness/fetch'));
    document.getElementById('analyze-btn').addEventListener('click', () => run('POST', '/api/fitness/analyze'));
    document.getElementById('start-btn').addEventListener('click', () => run('POST', '/api/activity/start'));
    document.getElementById('stop-btn').addEventListener('click', () => run('POST', '/api/activity/stop'));

    const settingsForm = document.getElementById('settings-form');
    settingsForm.addEventListener('submit', (event) => event.preventDefault());
    settingsForm.addEventListener('change', (event) => {
      const { name, value } = event.target;
      const update = { [name]: name === 'daily_goal_minutes' ? Number(value) : value };
      call('POST', '/api/settings', update)
        .then(() => {
          if (event.target.type === 'password') event.target.value = '';
          setStatus('Settings saved');
        })
        .catch((err) => setStatus(err.message));
    });

    document.getElementById('mode-btn').addEventListener('click', (event) => {
      const normal = document.body.classList.toggle('normal-mode');
      event.target.textContent = normal ? 'Switch to red mode' : 'Switch to normal mode';
    });
  </script>
</body>
</html>
"#;
