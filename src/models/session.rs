use serde::{Deserialize, Serialize};

use super::Label;

/// One user's run through a setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub setup: i64,
    #[serde(default)]
    pub user: Option<i64>,
    pub iteration: i64,
    /// Seconds spent in the session so far.
    pub in_progress: i64,
    pub finished: bool,
    pub pauses: i64,
    pub rewinds: i64,
    pub labels: Vec<Label>,
    pub final_labels: Vec<String>,
    pub history: Vec<Vec<usize>>,
    pub heatmaps: Vec<Vec<String>>,
    #[serde(rename = "userlabelMatchesAPI")]
    pub userlabel_matches_api: Vec<Vec<bool>>,
}

impl Session {
    /// A fresh session over `point_count` unlabeled points.
    pub fn new(setup: i64, user: Option<i64>, point_count: usize) -> Self {
        Self {
            id: 0,
            setup,
            user,
            iteration: 0,
            in_progress: 0,
            finished: false,
            pauses: 0,
            rewinds: 0,
            labels: vec![Label::Undefined; point_count],
            final_labels: vec![Label::Undefined.final_code().to_string(); point_count],
            history: Vec::new(),
            heatmaps: Vec::new(),
            userlabel_matches_api: Vec::new(),
        }
    }

    /// Display name, `<user>_<setup>_s<id>`.
    pub fn display_name(&self, user_name: &str, setup_name: &str) -> String {
        format!("{user_name}_{setup_name}_s{}", self.id)
    }

    /// Whether the per-iteration records agree with the iteration counter.
    pub fn records_consistent(&self) -> bool {
        let completed = (self.iteration - 1).max(0) as usize;
        self.history.len() == completed
            && self.heatmaps.len() == completed
            && self.userlabel_matches_api.len() == completed
    }
}
