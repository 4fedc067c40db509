//! Lightweight views used by overview pages.
//!
//! Overview listings are fetched without the large arrays and may omit any
//! field, so every field is optional here. The calculators in `crate::calc`
//! treat a missing field as invalid input.

use serde::{Deserialize, Serialize};

use super::{FeedbackMode, Session, Setup};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupOverview {
    pub iterations: Option<i64>,
    pub feedback_mode: Option<FeedbackMode>,
    pub creation_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOverview {
    pub iteration: Option<i64>,
    pub in_progress: Option<i64>,
    pub finished: Option<bool>,
}

impl From<&Setup> for SetupOverview {
    fn from(setup: &Setup) -> Self {
        Self {
            iterations: Some(setup.iterations),
            feedback_mode: Some(setup.feedback_mode),
            creation_time: Some(setup.creation_time),
        }
    }
}

impl From<&Session> for SessionOverview {
    fn from(session: &Session) -> Self {
        Self {
            iteration: Some(session.iteration),
            in_progress: Some(session.in_progress),
            finished: Some(session.finished),
        }
    }
}
