pub mod dataset;
pub mod label;
pub mod modes;
pub mod overview;
pub mod session;
pub mod setup;

pub use dataset::{Dataset, NormalizeFactor};
pub use label::{final_to_user, user_to_final, Label};
pub use modes::{FeedbackMode, HistoryMode};
pub use overview::{SessionOverview, SetupOverview};
pub use session::Session;
pub use setup::{ClassifierParams, Grid, Setup, UNLIMITED_ANSWER_TIME, UNLIMITED_ITERATIONS};
