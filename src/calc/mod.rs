//! Display-ready summaries derived from setup and session records.
//!
//! All functions here signal invalid input with sentinel values (`-1` or
//! `None`) instead of errors; overview pages render the sentinel directly.

pub mod progress;
pub mod time;

pub use progress::{
    calc_average_time_iteration, calc_average_time_session, calc_percent_finished,
    calc_session_status, SessionStatus, UNLIMITED_PERCENT,
};
pub use time::{
    calc_setup_time, calc_setup_time_at, calc_setup_time_message, calc_setup_time_message_at,
    format_hms, TimeUnit,
};
