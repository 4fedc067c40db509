//! Setup records: the admin-side configuration of a labeling campaign.

use serde::{Deserialize, Serialize};

use super::{FeedbackMode, HistoryMode};

/// `iterations` value meaning "no iteration budget".
pub const UNLIMITED_ITERATIONS: i64 = -1;
/// `maxAnswerTime` value meaning "no answer deadline".
pub const UNLIMITED_ANSWER_TIME: i64 = -1;

/// A sampling grid for one subspace, points as `[x, y]`.
pub type Grid = Vec<[f64; 2]>;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClassifierParams {
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub params: ClassifierParams,
    pub raw_data: bool,
    pub rewindable: bool,
    /// 1-based dimension pairs.
    pub subspaces: Vec<[usize; 2]>,
    pub subspace_grids: Vec<Grid>,
    pub subspace_grids_normalized: Vec<Grid>,
    pub max_answer_time: i64,
    pub creation_time: i64,
    pub finished_creation: bool,
    #[serde(default)]
    pub creator: Option<i64>,
    pub iterations: i64,
    pub query_strategy: String,
    pub history_mode: HistoryMode,
    pub feedback_mode: FeedbackMode,
    pub dataset: i64,
    pub classifier: String,
}

impl Setup {
    /// Number of heatmaps shown per iteration.
    pub fn subspaces_shown(&self) -> usize {
        self.subspaces.len()
    }

    pub fn is_budgeted(&self) -> bool {
        self.iterations != UNLIMITED_ITERATIONS
    }

    pub fn has_answer_deadline(&self) -> bool {
        self.max_answer_time != UNLIMITED_ANSWER_TIME
    }

    pub fn grids_consistent(&self) -> bool {
        self.subspaces.len() == self.subspace_grids.len()
            && self.subspaces.len() == self.subspace_grids_normalized.len()
    }
}
