use crate::models::{FeedbackMode, SessionOverview, SetupOverview, UNLIMITED_ITERATIONS};

/// Percent reported for a started session without an iteration budget.
pub const UNLIMITED_PERCENT: i64 = 49;

const STATUS_FAILURE: &str = "Failure while computing Session status";
const UNKNOWN_FEEDBACK_MODE: &str = "Unknown feedback mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    NotStarted,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::NotStarted => "not started",
            SessionStatus::Finished => "finished",
        }
    }

    pub fn from_percent(percent: i64) -> Option<SessionStatus> {
        match percent {
            100 => Some(SessionStatus::Finished),
            0 => Some(SessionStatus::NotStarted),
            1..=99 => Some(SessionStatus::Active),
            _ => None,
        }
    }
}

/// Completion of a session in percent, `-1` on invalid input.
pub fn calc_percent_finished(setup: Option<&SetupOverview>, session: Option<&SessionOverview>) -> i64 {
    let (Some(setup), Some(session)) = (setup, session) else {
        return -1;
    };
    let (Some(total), Some(done)) = (setup.iterations, session.iteration) else {
        return -1;
    };

    if done < 0 || total == 0 || total < UNLIMITED_ITERATIONS {
        return -1;
    }

    if total == UNLIMITED_ITERATIONS {
        if done == 0 {
            return 0;
        }
        if session.finished == Some(true) {
            return 100;
        }
        return UNLIMITED_PERCENT;
    }

    if done > total {
        return -1;
    }

    (done as f64 / total as f64 * 100.0).round() as i64
}

/// Status text for a session, `None` on invalid input.
///
/// Unbudgeted setups have no meaningful percentage, so their feedback mode
/// is reported instead.
pub fn calc_session_status(
    setup: Option<&SetupOverview>,
    session: Option<&SessionOverview>,
) -> Option<String> {
    let (setup_view, session_view) = (setup?, session?);
    let iterations = setup_view.iterations?;
    session_view.iteration?;
    let feedback_mode = setup_view.feedback_mode?;

    if iterations == UNLIMITED_ITERATIONS {
        let text = match feedback_mode {
            FeedbackMode::Unknown => UNKNOWN_FEEDBACK_MODE.to_string(),
            known => format!("{} mode", known.as_str()),
        };
        return Some(text);
    }

    let percent = calc_percent_finished(setup, session);
    let text = match SessionStatus::from_percent(percent) {
        Some(status) => status.as_str().to_string(),
        // Only reachable when the percent guard rejected the input.
        None => STATUS_FAILURE.to_string(),
    };
    Some(text)
}

/// Mean time of the finished sessions in seconds.
///
/// `-1` if the list is missing or any entry lacks `finished`/`inProgress`;
/// `0` when nothing has finished yet.
pub fn calc_average_time_session(sessions: Option<&[SessionOverview]>) -> i64 {
    let Some(sessions) = sessions else {
        return -1;
    };

    let mut finished = 0i64;
    let mut total = 0i64;
    for session in sessions {
        let (Some(is_finished), Some(in_progress)) = (session.finished, session.in_progress) else {
            return -1;
        };
        if is_finished {
            total += in_progress;
            finished += 1;
        }
    }

    if finished == 0 {
        return 0;
    }
    (total as f64 / finished as f64).round() as i64
}

/// Seconds per iteration, `-1` on missing or inconsistent data.
pub fn calc_average_time_iteration(session: Option<&SessionOverview>) -> i64 {
    let Some(session) = session else {
        return -1;
    };
    let (Some(total_time), Some(iteration)) = (session.in_progress, session.iteration) else {
        return -1;
    };

    if iteration < 0 || total_time < 0 || (iteration != 0 && total_time == 0) {
        return -1;
    }
    if iteration == 0 {
        return 0;
    }
    total_time.div_euclid(iteration)
}
