use crate::models::{Analysis, PeriodMetrics, Summary};

pub const DEFAULT_TITLE: &str = "AI advice";

/// Builds the coaching prompt from the aggregated summary and daily goal.
pub fn analysis_prompt(summary: &Summary, daily_goal_minutes: u32) -> String {
    let goal = f64::from(daily_goal_minutes);
    let today = summary.daily.minutes;
    let status = if today >= goal { "met" } else { "not met" };

    format!(
        "You are a professional fitness coach. Analyse the activity data below
and give advice that takes the user's goal into account.

## Activity data and goal
- Daily goal: {daily_goal_minutes} min
- Today: {today:.1} min (goal {status}, difference {difference:+.1} min)
{week}{month}
Answer in Markdown, starting with a level-one heading, covering:
1. **Goal progress:** judge today's result and the weekly and monthly activity level, with tips for staying motivated.
2. **Intensity:** assess intensity from average heart rate and speed and suggest concrete adjustments.
3. **Next steps:** summarise overall health insights and propose one or two concrete goals for the coming week.
",
        difference = today - goal,
        week = period_block("This week", &summary.weekly),
        month = period_block("This month", &summary.monthly),
    )
}

fn period_block(label: &str, metrics: &PeriodMetrics) -> String {
    format!(
        "
### {label}
- Active time: {:.1} min
- Steps: {}
- Distance: {:.2} km
- Calories: {:.0} kcal
- Average speed: {:.1} km/h
- Average heart rate: {:.0} bpm
",
        metrics.minutes,
        metrics.steps,
        metrics.distance_m / 1000.0,
        metrics.calories_kcal,
        metrics.avg_speed_kmh,
        metrics.avg_heart_rate
    )
}

/// Splits generated text into a title (its first heading) and the rest.
pub fn split_title(text: &str) -> Analysis {
    let mut lines = text.trim().lines();
    match lines.next() {
        Some(first) if first.starts_with('#') => Analysis {
            title: first.trim_start_matches('#').trim().to_string(),
            content: lines.collect::<Vec<_>>().join("\n").trim().to_string(),
        },
        _ => Analysis {
            title: DEFAULT_TITLE.to_string(),
            content: text.trim().to_string(),
        },
    }
}
