use chrono::Utc;

use crate::models::SetupOverview;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
        }
    }
}

fn now_secs() -> i64 {
    (Utc::now().timestamp_millis() as f64 / 1000.0).round() as i64
}

/// Seconds since the setup was created, `-1` without a creation time.
pub fn calc_setup_time(setup: Option<&SetupOverview>) -> i64 {
    calc_setup_time_at(setup, now_secs())
}

pub fn calc_setup_time_at(setup: Option<&SetupOverview>, now: i64) -> i64 {
    match setup.and_then(|s| s.creation_time) {
        Some(created) => now - created,
        None => -1,
    }
}

/// `"created <n> <unit>(s) ago"`, `None` without a usable creation time.
pub fn calc_setup_time_message(setup: Option<&SetupOverview>) -> Option<String> {
    calc_setup_time_message_at(setup, now_secs())
}

pub fn calc_setup_time_message_at(setup: Option<&SetupOverview>, now: i64) -> Option<String> {
    let elapsed = calc_setup_time_at(setup, now);
    if elapsed < 0 {
        return None;
    }

    let (amount, unit) = if elapsed <= MINUTE {
        (elapsed, TimeUnit::Second)
    } else if elapsed <= HOUR {
        (rounded_div(elapsed, MINUTE), TimeUnit::Minute)
    } else if elapsed <= DAY {
        (rounded_div(elapsed, HOUR), TimeUnit::Hour)
    } else {
        (rounded_div(elapsed, DAY), TimeUnit::Day)
    };

    Some(format!("created {} {}(s) ago", amount, unit.as_str()))
}

fn rounded_div(value: i64, unit: i64) -> i64 {
    (value as f64 / unit as f64).round() as i64
}

/// Clock-style `HH:MM:SS` for a positive number of seconds.
///
/// Hours wrap at 24 like a time of day.
pub fn format_hms(seconds: i64) -> Option<String> {
    if seconds <= 0 {
        return None;
    }
    let hours = (seconds / HOUR) % 24;
    let minutes = (seconds % HOUR) / MINUTE;
    let secs = seconds % MINUTE;
    Some(format!("{hours:02}:{minutes:02}:{secs:02}"))
}
