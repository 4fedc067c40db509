use serde::{Deserialize, Serialize};

/// Decides who picks the next point to label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackMode {
    System,
    User,
    Hybrid,
    #[serde(other)]
    Unknown,
}

impl FeedbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackMode::System => "system",
            FeedbackMode::User => "user",
            FeedbackMode::Hybrid => "hybrid",
            FeedbackMode::Unknown => "unknown",
        }
    }

    /// Whether the oracle's query point is shown to the user as a suggestion.
    pub fn suggests_points(&self) -> bool {
        matches!(self, FeedbackMode::System | FeedbackMode::Hybrid)
    }
}

/// What a user may look up about past iterations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HistoryMode {
    #[serde(rename = "noHistory")]
    NoHistory,
    #[serde(rename = "decisions")]
    Decisions,
    #[serde(rename = "heatmaps")]
    Heatmaps,
}

impl HistoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryMode::NoHistory => "noHistory",
            HistoryMode::Decisions => "decisions",
            HistoryMode::Heatmaps => "heatmaps",
        }
    }
}
