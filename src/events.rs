use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// An annual meteor shower and its active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeteorShower {
    pub name: &'static str,
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
    pub peak_hours: &'static str,
}

impl MeteorShower {
    const fn new(
        name: &'static str,
        (start_month, start_day): (u32, u32),
        (end_month, end_day): (u32, u32),
        peak_hours: &'static str,
    ) -> Self {
        Self {
            name,
            start_month,
            start_day,
            end_month,
            end_day,
            peak_hours,
        }
    }

    pub fn is_active(&self, date: NaiveDate) -> bool {
        let day = (date.month(), date.day());
        let start = (self.start_month, self.start_day);
        let end = (self.end_month, self.end_day);
        if start <= end {
            start <= day && day <= end
        } else {
            day >= start || day <= end
        }
    }

    pub fn headline(&self) -> String {
        format!("{} is active; best rates {}.", self.name, self.peak_hours)
    }
}

pub const METEOR_SHOWERS: [MeteorShower; 5] = [
    MeteorShower::new("Quadrantids", (1, 1), (1, 7), "from 21:00 until dawn"),
    MeteorShower::new("Lyrids", (4, 16), (4, 25), "from 23:00 until dawn"),
    MeteorShower::new("Perseids", (7, 17), (8, 24), "from 22:00 until dawn"),
    MeteorShower::new("Geminids", (12, 4), (12, 17), "from 20:00 until dawn"),
    MeteorShower::new("Ursids", (12, 17), (12, 26), "from 21:00 until midnight"),
];

pub const NO_EVENT_MESSAGE: &str = "No notable meteor shower tonight; a good night for deep-sky imaging.";

/// First catalogued shower active on `date`.
pub fn event_on(date: NaiveDate) -> Option<MeteorShower> {
    METEOR_SHOWERS.iter().copied().find(|shower| shower.is_active(date))
}
