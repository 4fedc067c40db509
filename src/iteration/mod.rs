//! Session labeling: the iteration state machine and its async driver.

mod controller;
mod events;
mod state;

pub use controller::IterationController;
pub use events::IterationEvent;
pub use state::{
    IterationPhase, IterationSnapshot, IterationState, Submission, TickOutcome, EMPTY_HEATMAP,
};
