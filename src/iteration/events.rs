use serde::Serialize;

use super::state::IterationSnapshot;

/// Notifications pushed to whoever renders the labeling view.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IterationEvent {
    /// One second of session time passed.
    Tick { snapshot: IterationSnapshot },
    StateChanged { snapshot: IterationSnapshot },
    #[serde(rename_all = "camelCase")]
    HeatmapReady { index: usize, payload: String },
    /// The oracle failed; the session view was closed.
    OracleUnavailable { message: String },
    /// Any other failure that closed the session view.
    Aborted { message: String },
    #[serde(rename_all = "camelCase")]
    SessionFinished { session_id: i64 },
}

impl IterationEvent {
    /// Whether the session view is over after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IterationEvent::OracleUnavailable { .. }
                | IterationEvent::Aborted { .. }
                | IterationEvent::SessionFinished { .. }
        )
    }
}
