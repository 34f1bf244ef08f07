use crate::models::{PeriodMetrics, Session, Summary};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Day,
    /// Sunday through today.
    Week,
    /// First of the month through today.
    Month,
}

pub fn summarize(sessions: &[Session]) -> Summary {
    summarize_at(&Local::now(), sessions)
}

/// Buckets sessions by end time into today / this week / this month.
pub fn summarize_at<Tz: TimeZone>(now: &DateTime<Tz>, sessions: &[Session]) -> Summary {
    let mut summary = Summary::default();
    let today = now.date_naive();

    for session in sessions {
        let Some(ended) = local_date(now, session.end_ms) else {
            continue;
        };
        let windows = [
            (Window::Day, &mut summary.daily),
            (Window::Week, &mut summary.weekly),
            (Window::Month, &mut summary.monthly),
        ];
        for (window, metrics) in windows {
            if is_within(ended, today, window) {
                accumulate(metrics, session);
            }
        }
    }

    for metrics in [&mut summary.daily, &mut summary.weekly, &mut summary.monthly] {
        finish(metrics);
    }
    summary
}

pub fn is_within(date: NaiveDate, today: NaiveDate, window: Window) -> bool {
    if date > today {
        return false;
    }
    match window {
        Window::Day => date == today,
        Window::Week => date >= week_start(today),
        Window::Month => date.year() == today.year() && date.month() == today.month(),
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

fn local_date<Tz: TimeZone>(now: &DateTime<Tz>, millis: i64) -> Option<NaiveDate> {
    now.timezone()
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.date_naive())
}

fn accumulate(metrics: &mut PeriodMetrics, session: &Session) {
    metrics.minutes += session.duration_minutes;
    metrics.steps = metrics.steps.saturating_add(session.steps);
    metrics.distance_m += session.distance_m;
    metrics.calories_kcal += session.calories_kcal;
    // heart rate is weighted by session length
    metrics.total_heart_rate += session.avg_heart_rate_bpm * session.duration_minutes;
    metrics.heart_rate_weight += session.duration_minutes;
    metrics.duration_ms = metrics
        .duration_ms
        .saturating_add(session.end_ms.saturating_sub(session.start_ms).max(0));
}

fn finish(metrics: &mut PeriodMetrics) {
    if metrics.heart_rate_weight > 0.0 {
        metrics.avg_heart_rate = metrics.total_heart_rate / metrics.heart_rate_weight;
    }
    if metrics.duration_ms > 0 {
        let hours = metrics.duration_ms as f64 / 3_600_000.0;
        metrics.avg_speed_kmh = (metrics.distance_m / 1000.0) / hours;
    }
}
