//! End-of-day summary gate.
//!
//! The summary is shown at most once per local calendar date; the date it
//! was last shown is persisted under [`SUMMARY_MARKER_KEY`].

use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::views::Progress;

pub const SUMMARY_MARKER_KEY: &str = "focusboard-summary-shown-date";
pub const SUMMARY_HOUR: u8 = 23;
pub const FOCUS_MINUTES_PER_TASK: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub date: Date,
    pub hour: u8,
}

impl LocalClock {
    pub fn at(now_ms: u64, offset: UtcOffset) -> Self {
        let secs = (now_ms / 1000) as i64;
        let dt = OffsetDateTime::from_unix_timestamp(secs)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            .to_offset(offset);
        Self {
            date: dt.date(),
            hour: dt.hour(),
        }
    }

    pub fn date_key(&self) -> String {
        date_key(self.date)
    }
}

pub fn date_key(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub date_key: String,
    pub completed: usize,
    pub minutes: u32,
}

pub fn daily_summary_due(
    progress: &Progress,
    clock: &LocalClock,
    last_shown: Option<&str>,
) -> Option<DailySummary> {
    if progress.total == 0 || progress.completed == 0 {
        return None;
    }
    if clock.hour < SUMMARY_HOUR {
        return None;
    }
    let today = clock.date_key();
    if last_shown == Some(today.as_str()) {
        return None;
    }
    let completed = progress.completed;
    Some(DailySummary {
        date_key: today,
        completed,
        minutes: (completed as u32).saturating_mul(FOCUS_MINUTES_PER_TASK),
    })
}
