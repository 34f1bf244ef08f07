//! Observability scoring: how good is each dark hour for deep-sky work.

use crate::events::MeteorShower;
use crate::models::HourlySample;
use chrono::NaiveDate;
use serde::Serialize;

/// Sun altitude (radians) at or below which the sky counts as fully dark.
pub const ASTRONOMICAL_NIGHT_RAD: f64 = -0.314;

/// Light-pollution class on the Bortle scale, 1 (darkest) to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Bortle(u8);

impl Bortle {
    pub fn new(class: u8) -> Option<Self> {
        (1..=9).contains(&class).then_some(Self(class))
    }

    pub fn class(self) -> u8 {
        self.0
    }

    /// Typical zenith sky brightness for the class, mag/arcsec^2.
    fn baseline_sqm(self) -> f64 {
        const SQM: [f64; 9] = [21.99, 21.89, 21.69, 20.49, 19.50, 18.94, 18.38, 17.80, 17.50];
        SQM[usize::from(self.0 - 1)]
    }
}

/// Penalty that starts growing linearly once the input passes a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearThreshold {
    pub threshold: f64,
    pub slope: f64,
}

impl LinearThreshold {
    fn penalty(&self, value: f64) -> f64 {
        if value > self.threshold {
            (value - self.threshold) * self.slope
        } else {
            0.0
        }
    }
}

/// Coefficients for one revision of the scoring formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringProfile {
    pub name: &'static str,
    pub bortle_exponent: f64,
    pub cloud_divisor: f64,
    pub cloud_exponent: f64,
    pub moon_exponent: f64,
    pub moon_weight: f64,
    pub wind_aloft: LinearThreshold,
    pub wind_surface: Option<LinearThreshold>,
    pub dew_gap_threshold_c: f64,
    pub dew_penalty: f64,
    pub humidity: Option<LinearThreshold>,
}

impl ScoringProfile {
    pub fn classic() -> Self {
        Self {
            name: "classic",
            bortle_exponent: 1.6,
            cloud_divisor: 4.2,
            cloud_exponent: 2.5,
            moon_exponent: 3.0,
            moon_weight: 85.0,
            wind_aloft: LinearThreshold {
                threshold: 22.0,
                slope: 1.4,
            },
            wind_surface: None,
            dew_gap_threshold_c: 2.5,
            dew_penalty: 35.0,
            humidity: None,
        }
    }

    /// Classic plus humidity and ground-wind terms.
    pub fn humid() -> Self {
        Self {
            name: "humid",
            wind_surface: Some(LinearThreshold {
                threshold: 30.0,
                slope: 0.5,
            }),
            humidity: Some(LinearThreshold {
                threshold: 85.0,
                slope: 1.5,
            }),
            ..Self::classic()
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "classic" => Some(Self::classic()),
            "humid" => Some(Self::humid()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    LightPollution,
    Cloud,
    Moon,
    WindAloft,
    WindSurface,
    Dew,
    Humidity,
    None,
}

impl Factor {
    pub fn label(self) -> &'static str {
        match self {
            Factor::LightPollution => "light pollution",
            Factor::Cloud => "cloud cover",
            Factor::Moon => "moonlight",
            Factor::WindAloft => "jet-stream seeing",
            Factor::WindSurface => "ground wind",
            Factor::Dew => "dew risk",
            Factor::Humidity => "humidity",
            Factor::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Penalties {
    pub light_pollution: f64,
    pub cloud: f64,
    pub moon: f64,
    pub wind_aloft: f64,
    pub wind_surface: f64,
    pub dew: f64,
    pub humidity: f64,
}

impl Penalties {
    pub fn compute(sample: &HourlySample, bortle: Bortle, profile: &ScoringProfile) -> Self {
        let cloud = sample
            .cloud_cover_percent
            .map(|c| (c.max(0.0) / profile.cloud_divisor).powf(profile.cloud_exponent))
            .unwrap_or(0.0);

        let moon = if sample.moon_is_up() {
            sample
                .moon_illumination_fraction
                .clamp(0.0, 1.0)
                .powf(profile.moon_exponent)
                * profile.moon_weight
        } else {
            0.0
        };

        let dew = match sample.dew_gap_c() {
            Some(gap) if gap < profile.dew_gap_threshold_c => profile.dew_penalty,
            _ => 0.0,
        };

        Self {
            light_pollution: f64::from(bortle.class()).powf(profile.bortle_exponent),
            cloud,
            moon,
            wind_aloft: sample
                .wind_speed_aloft_kmh
                .map(|w| profile.wind_aloft.penalty(w))
                .unwrap_or(0.0),
            wind_surface: match (profile.wind_surface, sample.wind_speed_surface_kmh) {
                (Some(rule), Some(w)) => rule.penalty(w),
                _ => 0.0,
            },
            dew,
            humidity: match (profile.humidity, sample.relative_humidity_percent) {
                (Some(rule), Some(rh)) => rule.penalty(rh),
                _ => 0.0,
            },
        }
    }

    pub fn total(&self) -> f64 {
        self.entries().iter().map(|(_, value)| value).sum()
    }

    /// The largest single deduction; earlier factors win ties.
    pub fn limiting(&self) -> Factor {
        let mut worst = (Factor::None, 0.0);
        for (factor, value) in self.entries() {
            if value > worst.1 {
                worst = (factor, value);
            }
        }
        worst.0
    }

    fn entries(&self) -> [(Factor, f64); 7] {
        [
            (Factor::LightPollution, self.light_pollution),
            (Factor::Cloud, self.cloud),
            (Factor::Moon, self.moon),
            (Factor::WindAloft, self.wind_aloft),
            (Factor::WindSurface, self.wind_surface),
            (Factor::Dew, self.dew),
            (Factor::Humidity, self.humidity),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub score: u8,
    pub sample: HourlySample,
    pub penalties: Penalties,
    pub limiting_factor: Factor,
    pub sqm_estimate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Window(ScoredCandidate),
    NoWindow { reason: String },
}

impl Assessment {
    /// Winning score, or -1 when no hour was dark enough.
    pub fn score(&self) -> i32 {
        match self {
            Assessment::Window(best) => i32::from(best.score),
            Assessment::NoWindow { .. } => -1,
        }
    }
}

pub fn score_sample(sample: &HourlySample, bortle: Bortle, profile: &ScoringProfile) -> ScoredCandidate {
    let penalties = Penalties::compute(sample, bortle, profile);
    let raw = (100.0 - penalties.total()).round();
    let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 100.0) };

    ScoredCandidate {
        score: score as u8,
        sample: sample.clone(),
        penalties,
        limiting_factor: penalties.limiting(),
        sqm_estimate: estimate_sqm(sample, bortle),
    }
}

/// Picks the best astronomically dark hour.
pub fn best_window(samples: &[HourlySample], bortle: Bortle, profile: &ScoringProfile) -> Assessment {
    if samples.is_empty() {
        return Assessment::NoWindow {
            reason: "no forecast hours were returned".to_string(),
        };
    }

    let mut best: Option<ScoredCandidate> = None;
    for sample in samples
        .iter()
        .filter(|s| s.sun_altitude_rad <= ASTRONOMICAL_NIGHT_RAD)
    {
        let candidate = score_sample(sample, bortle, profile);
        if best.as_ref().is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    match best {
        Some(candidate) => Assessment::Window(candidate),
        None => Assessment::NoWindow {
            reason: "the sun never reaches astronomical twilight on this date".to_string(),
        },
    }
}

/// Heuristic sky brightness in mag/arcsec^2; larger is darker.
pub fn estimate_sqm(sample: &HourlySample, bortle: Bortle) -> f64 {
    let moonlight = if sample.moon_is_up() {
        3.0 * sample.moon_illumination_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cloud = 1.5 * sample.cloud_cover_percent.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0;
    (bortle.baseline_sqm() - moonlight - cloud).max(16.0)
}

pub fn verdict(score: u8) -> &'static str {
    if score > 75 {
        "Excellent conditions."
    } else {
        "Conditions are tough."
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkyReport {
    pub date: NaiveDate,
    pub profile: &'static str,
    pub bortle: u8,
    pub score: i32,
    pub message: String,
    pub best: Option<ScoredCandidate>,
    pub limiting_factor: Option<&'static str>,
    pub event: Option<MeteorShower>,
}

impl SkyReport {
    pub fn new(
        date: NaiveDate,
        bortle: Bortle,
        profile: &ScoringProfile,
        assessment: Assessment,
        event: Option<MeteorShower>,
    ) -> Self {
        let score = assessment.score();
        let (message, best) = match assessment {
            Assessment::Window(best) => (verdict(best.score).to_string(), Some(best)),
            Assessment::NoWindow { reason } => (reason, None),
        };
        Self {
            date,
            profile: profile.name,
            bortle: bortle.class(),
            score,
            message,
            limiting_factor: best.as_ref().map(|b| b.limiting_factor.label()),
            best,
            event,
        }
    }
}
