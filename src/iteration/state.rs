//! The per-session iteration state machine.
//!
//! One iteration: the user selects a point, picks a label, and submits.
//! Submitting records the decision, then either finishes the session or
//! asks the oracle for the next round. While that request is in flight the
//! state refuses every further submission and the clock stands still.
//!
//! Only a single selected point per iteration is supported; the selection
//! and label buffers always hold at most one entry.

use serde::Serialize;

use crate::calc::{calc_percent_finished, calc_session_status, format_hms};
use crate::models::{Dataset, Label, Session, SessionOverview, Setup, SetupOverview};
use crate::ocal::OcalOutput;
use crate::plot::{HeatmapRenderer, HeatmapRequest};
use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Placeholder for a heatmap slot not rendered this iteration.
pub const EMPTY_HEATMAP: &str = "EMPTY";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IterationPhase {
    AwaitingSelection,
    PointSelected,
    Labeled,
    /// A continue or rewind is waiting for the oracle.
    AwaitingOracle,
    Finished,
    /// The oracle or backend failed; the view must be left.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is stopped.
    Idle,
    Ticked,
    /// The answer time ran out; the iteration should be submitted.
    Deadline,
}

/// What an accepted continue asks the controller to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Persist the final session.
    Finished(Session),
    /// Persist and ask the oracle for the next iteration.
    Requery(Session),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IterationSnapshot {
    pub session_id: i64,
    pub iteration: i64,
    pub in_progress: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub elapsed: Option<String>,
    pub iteration_time: i64,
    pub phase: IterationPhase,
    pub selected_point: Option<usize>,
    pub selected_label: Option<Label>,
    pub rewound: bool,
    pub can_rewind: bool,
    pub heatmaps: Vec<String>,
    pub subspace_captions: Vec<String>,
    pub displayed_subspace: usize,
    pub suggested_point: Option<i64>,
    pub percent_finished: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IterationState {
    session: Session,
    setup: Setup,
    dataset: Dataset,
    ocal: Option<OcalOutput>,
    selected_points: Vec<usize>,
    selected_labels: Vec<Label>,
    previous_points: Vec<usize>,
    previous_labels: Vec<Label>,
    heatmaps: Vec<String>,
    iteration_time: i64,
    rewound: bool,
    awaiting_oracle: bool,
    aborted: bool,
    subspace_captions: Vec<String>,
    displayed_subspace: usize,
}

impl IterationState {
    /// Opens or resumes `session`. The first open starts iteration 1, every
    /// later one counts as a pause. Rewinding stays blocked until the first
    /// continue, and the clock waits for the first oracle answer.
    pub fn open(mut session: Session, setup: Setup, dataset: Dataset) -> Self {
        if session.iteration > 0 {
            session.pauses += 1;
        } else {
            session.iteration = 1;
        }

        let subspace_captions = setup
            .subspaces
            .iter()
            .map(|&subspace| {
                dataset
                    .subspace_caption(subspace)
                    .unwrap_or_else(|| format!("{} x {}", subspace[0], subspace[1]))
            })
            .collect();

        let mut state = Self {
            session,
            setup,
            dataset,
            ocal: None,
            selected_points: Vec::new(),
            selected_labels: Vec::new(),
            previous_points: Vec::new(),
            previous_labels: Vec::new(),
            heatmaps: Vec::new(),
            iteration_time: 0,
            rewound: true,
            awaiting_oracle: true,
            aborted: false,
            subspace_captions,
            displayed_subspace: 0,
        };
        state.reset_iteration_data();
        state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn ocal(&self) -> Option<&OcalOutput> {
        self.ocal.as_ref()
    }

    pub fn heatmaps(&self) -> &[String] {
        &self.heatmaps
    }

    pub fn displayed_subspace(&self) -> usize {
        self.displayed_subspace
    }

    pub fn is_finished(&self) -> bool {
        self.session.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether the clock should advance.
    pub fn is_ticking(&self) -> bool {
        !self.awaiting_oracle && !self.aborted && !self.session.finished
    }

    fn accepts_input(&self) -> bool {
        !self.aborted && !self.session.finished
    }

    pub fn phase(&self) -> IterationPhase {
        if self.aborted {
            IterationPhase::Aborted
        } else if self.session.finished {
            IterationPhase::Finished
        } else if self.awaiting_oracle {
            IterationPhase::AwaitingOracle
        } else if self.selected_points.is_empty() {
            IterationPhase::AwaitingSelection
        } else if self.selected_labels.is_empty() {
            IterationPhase::PointSelected
        } else {
            IterationPhase::Labeled
        }
    }

    fn reset_iteration_data(&mut self) {
        self.iteration_time = 0;
        self.selected_points.clear();
        self.selected_labels.clear();
        self.heatmaps = vec![EMPTY_HEATMAP.to_string(); self.setup.subspaces_shown()];
    }

    /// Takes a fresh oracle answer; its global prediction replaces the
    /// session's final labels and the clock resumes.
    pub fn apply_oracle_output(&mut self, output: OcalOutput) {
        self.session.final_labels = output.prediction_global.clone();
        self.ocal = Some(output);
        self.awaiting_oracle = false;
    }

    pub fn abort(&mut self) {
        self.aborted = true;
        self.awaiting_oracle = false;
    }

    /// Records the point picked in a heatmap. Indices outside the raw data
    /// are ignored.
    pub fn select_point(&mut self, index: i64) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Ok(point) = usize::try_from(index) else {
            return false;
        };
        if point >= self.dataset.raw_data.len() {
            return false;
        }

        match self.selected_points.first_mut() {
            Some(slot) => *slot = point,
            None => self.selected_points.push(point),
        }
        true
    }

    /// Chooses the label at `index` of [`Label::ALL`] for the selected point.
    pub fn select_label(&mut self, index: i64) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(label) = usize::try_from(index).ok().and_then(Label::from_index) else {
            return false;
        };

        match self.selected_labels.first_mut() {
            Some(slot) => *slot = label,
            None => self.selected_labels.push(label),
        }
        true
    }

    /// One second of session time.
    ///
    /// When the answer time runs out, selected points without a label get
    /// the oracle's last prediction for them.
    pub fn timestep(&mut self) -> TickOutcome {
        if !self.is_ticking() {
            return TickOutcome::Idle;
        }

        self.session.in_progress += 1;
        self.iteration_time += 1;
        if !self.setup.has_answer_deadline() || self.iteration_time != self.setup.max_answer_time {
            return TickOutcome::Ticked;
        }

        for i in self.selected_labels.len()..self.selected_points.len() {
            let point = self.selected_points[i];
            let label = self
                .ocal
                .as_ref()
                .and_then(|ocal| ocal.prediction_for(point))
                .and_then(Label::from_final)
                .unwrap_or(Label::Undefined);
            self.selected_labels.push(label);
        }
        TickOutcome::Deadline
    }

    /// Whether each labeled point agrees with the current final labels.
    fn calculate_matches(&self) -> Vec<bool> {
        self.selected_points
            .iter()
            .zip(&self.selected_labels)
            .map(|(&point, label)| {
                let predicted = self.session.final_labels.get(point).map(String::as_str);
                match label {
                    Label::Inlier | Label::Outlier => predicted == Some(label.final_code()),
                    Label::Undefined => false,
                }
            })
            .collect()
    }

    /// Submits the iteration.
    ///
    /// `None` without a selected point, label or heatmap slot, or while a
    /// previous submission is still open; the state is left untouched then.
    pub fn continue_iteration(&mut self, finish: bool) -> Option<Submission> {
        if self.selected_points.is_empty()
            || self.selected_labels.is_empty()
            || self.heatmaps.is_empty()
            || self.awaiting_oracle
            || !self.accepts_input()
        {
            return None;
        }

        self.iteration_time = 0;
        let matches = self.calculate_matches();
        self.session.userlabel_matches_api.push(matches);
        self.session.history.push(self.selected_points.clone());

        self.previous_points = self.selected_points.clone();
        self.previous_labels.clear();
        for (&point, &label) in self.selected_points.iter().zip(&self.selected_labels) {
            if let Some(slot) = self.session.labels.get_mut(point) {
                self.previous_labels.push(*slot);
                *slot = label;
            }
        }
        self.session.heatmaps.push(self.heatmaps.clone());

        let budget_spent =
            self.setup.is_budgeted() && self.session.iteration >= self.setup.iterations;
        if finish || budget_spent {
            self.session.finished = true;
            return Some(Submission::Finished(self.session.clone()));
        }

        self.session.iteration += 1;
        self.rewound = false;
        self.awaiting_oracle = true;
        self.reset_iteration_data();
        Some(Submission::Requery(self.session.clone()))
    }

    pub fn can_rewind(&self) -> bool {
        !self.rewound
            && self.setup.rewindable
            && self.session.iteration >= 2
            && !self.awaiting_oracle
            && self.accepts_input()
    }

    /// Undoes the last completed iteration, at most once per iteration.
    /// Returns the session to send to the oracle.
    pub fn rewind(&mut self) -> Option<Session> {
        if !self.can_rewind() {
            return None;
        }

        self.rewound = true;
        self.session.rewinds += 1;
        self.session.iteration -= 1;
        self.session.history.pop();
        self.session.userlabel_matches_api.pop();
        for (&point, &label) in self.previous_points.iter().zip(&self.previous_labels) {
            if let Some(slot) = self.session.labels.get_mut(point) {
                *slot = label;
            }
        }
        self.session.heatmaps.pop();

        self.awaiting_oracle = true;
        self.reset_iteration_data();
        Some(self.session.clone())
    }

    /// Renders subspace `index` and returns the payload.
    ///
    /// The first rendering of a slot in an iteration is kept; later calls
    /// render again without replacing it.
    pub fn show_heatmap(&mut self, index: usize, renderer: &dyn HeatmapRenderer) -> Option<String> {
        if index >= self.setup.subspaces_shown() || self.awaiting_oracle || !self.accepts_input() {
            return None;
        }
        let ocal = self.ocal.as_ref()?;
        let request = HeatmapRequest::build(index, &self.setup, &self.dataset, ocal)?;

        let payload = match renderer.render(&request) {
            Ok(plot) => plot.to_string(),
            Err(err) => {
                log_warn!("Failed to render heatmap {} of session {}: {err:#}", index, self.session.id);
                return None;
            }
        };

        if let Some(slot) = self.heatmaps.get_mut(index) {
            if *slot == EMPTY_HEATMAP {
                *slot = payload.clone();
            }
        }
        self.displayed_subspace = index;
        Some(payload)
    }

    pub fn snapshot(&self) -> IterationSnapshot {
        let setup_view = SetupOverview::from(&self.setup);
        let session_view = SessionOverview::from(&self.session);
        let in_progress = self.session.in_progress;

        IterationSnapshot {
            session_id: self.session.id,
            iteration: self.session.iteration,
            in_progress,
            minutes: in_progress / 60,
            seconds: in_progress % 60,
            elapsed: format_hms(in_progress),
            iteration_time: self.iteration_time,
            phase: self.phase(),
            selected_point: self.selected_points.first().copied(),
            selected_label: self.selected_labels.first().copied(),
            rewound: self.rewound,
            can_rewind: self.can_rewind(),
            heatmaps: self.heatmaps.clone(),
            subspace_captions: self.subspace_captions.clone(),
            displayed_subspace: self.displayed_subspace,
            suggested_point: self.ocal.as_ref().and_then(OcalOutput::suggested_point),
            percent_finished: calc_percent_finished(Some(&setup_view), Some(&session_view)),
            status: calc_session_status(Some(&setup_view), Some(&session_view)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::plot::JsonHeatmapRenderer;

    fn opened() -> IterationState {
        let mut state = IterationState::open(fixtures::session(), fixtures::setup(), fixtures::dataset());
        state.apply_oracle_output(fixtures::output());
        state
    }

    fn submit(state: &mut IterationState, point: i64, label: i64) -> Submission {
        assert!(state.select_point(point));
        assert!(state.select_label(label));
        let submission = state.continue_iteration(false).unwrap();
        state.apply_oracle_output(fixtures::output());
        submission
    }

    #[test]
    fn first_open_starts_iteration_one() {
        let state = IterationState::open(fixtures::session(), fixtures::setup(), fixtures::dataset());
        assert_eq!(state.session().iteration, 1);
        assert_eq!(state.session().pauses, 0);
        assert_eq!(state.heatmaps(), &[EMPTY_HEATMAP.to_string()]);
        assert_eq!(state.phase(), IterationPhase::AwaitingOracle);
        assert_eq!(state.snapshot().subspace_captions, vec!["width x height"]);
    }

    #[test]
    fn reopening_counts_a_pause() {
        let mut session = fixtures::session();
        session.iteration = 3;
        let state = IterationState::open(session, fixtures::setup(), fixtures::dataset());
        assert_eq!(state.session().iteration, 3);
        assert_eq!(state.session().pauses, 1);
        assert!(!state.can_rewind());
    }

    #[test]
    fn oracle_output_replaces_final_labels() {
        let state = opened();
        assert_eq!(state.session().final_labels[3], "outlier");
        assert_eq!(state.phase(), IterationPhase::AwaitingSelection);
        assert_eq!(state.snapshot().suggested_point, Some(3));
    }

    #[test]
    fn point_selection_is_bounded_by_dataset() {
        let mut state = opened();
        assert!(!state.select_point(-1));
        assert!(!state.select_point(4));
        assert!(state.select_point(0));
        assert!(state.select_point(2));
        assert_eq!(state.snapshot().selected_point, Some(2));
        assert_eq!(state.phase(), IterationPhase::PointSelected);
    }

    #[test]
    fn point_selection_is_bounded_by_raw_data() {
        let mut dataset = fixtures::dataset();
        dataset.raw_data.truncate(2);
        let mut state = IterationState::open(fixtures::session(), fixtures::setup(), dataset);
        state.apply_oracle_output(fixtures::output());
        assert!(state.select_point(1));
        assert!(!state.select_point(2));
        assert_eq!(state.snapshot().selected_point, Some(1));
    }

    #[test]
    fn label_selection_overwrites_single_slot() {
        let mut state = opened();
        assert!(!state.select_label(-1));
        assert!(!state.select_label(3));
        assert!(state.select_label(1));
        assert!(state.select_label(2));
        assert_eq!(state.snapshot().selected_label, Some(Label::Outlier));
    }

    #[test]
    fn continue_without_selection_changes_nothing() {
        let mut state = opened();
        assert!(state.continue_iteration(false).is_none());
        state.select_label(1);
        assert!(state.continue_iteration(true).is_none());

        let session = state.session();
        assert!(session.history.is_empty());
        assert!(session.heatmaps.is_empty());
        assert_eq!(session.iteration, 1);
    }

    #[test]
    fn continue_records_iteration() {
        let mut state = opened();
        state.select_point(3);
        state.select_label(2);
        let Some(Submission::Requery(session)) = state.continue_iteration(false) else {
            panic!("expected a requery");
        };

        assert_eq!(session.iteration, 2);
        assert_eq!(session.history, vec![vec![3]]);
        assert_eq!(session.userlabel_matches_api, vec![vec![true]]);
        assert_eq!(session.labels[3], Label::Outlier);
        assert_eq!(session.heatmaps, vec![vec![EMPTY_HEATMAP.to_string()]]);
        assert!(session.records_consistent());
        assert_eq!(state.phase(), IterationPhase::AwaitingOracle);
        assert_eq!(state.snapshot().selected_point, None);
    }

    #[test]
    fn disagreement_and_undefined_do_not_match() {
        let mut state = opened();
        submit(&mut state, 0, 2);
        submit(&mut state, 1, 0);
        assert_eq!(state.session().userlabel_matches_api, vec![vec![false], vec![false]]);
    }

    #[test]
    fn only_one_submission_in_flight() {
        let mut state = opened();
        state.select_point(1);
        state.select_label(1);
        assert!(state.continue_iteration(false).is_some());
        state.select_point(2);
        state.select_label(1);
        assert!(state.continue_iteration(false).is_none());
        assert!(state.rewind().is_none());
        assert_eq!(state.timestep(), TickOutcome::Idle);
    }

    #[test]
    fn budget_finishes_session() {
        let mut setup = fixtures::setup();
        setup.iterations = 2;
        let mut state = IterationState::open(fixtures::session(), setup, fixtures::dataset());
        state.apply_oracle_output(fixtures::output());

        assert!(matches!(submit(&mut state, 0, 1), Submission::Requery(_)));
        state.select_point(1);
        state.select_label(1);
        let Some(Submission::Finished(session)) = state.continue_iteration(false) else {
            panic!("expected the session to finish");
        };
        assert!(session.finished);
        assert_eq!(session.iteration, 2);
        assert_eq!(session.history.len(), 2);
        assert_eq!(state.phase(), IterationPhase::Finished);
        assert!(!state.select_point(0));
    }

    #[test]
    fn explicit_finish_ends_unbudgeted_session() {
        let mut setup = fixtures::setup();
        setup.iterations = -1;
        let mut state = IterationState::open(fixtures::session(), setup, fixtures::dataset());
        state.apply_oracle_output(fixtures::output());
        state.select_point(0);
        state.select_label(1);
        assert!(matches!(state.continue_iteration(true), Some(Submission::Finished(_))));
        assert_eq!(state.snapshot().percent_finished, 100);
    }

    #[test]
    fn rewind_restores_previous_iteration() {
        let mut state = opened();
        submit(&mut state, 3, 1);
        assert_eq!(state.session().labels[3], Label::Inlier);

        let session = state.rewind().unwrap();
        assert_eq!(session.iteration, 1);
        assert_eq!(session.rewinds, 1);
        assert!(session.history.is_empty());
        assert!(session.userlabel_matches_api.is_empty());
        assert!(session.heatmaps.is_empty());
        assert_eq!(session.labels[3], Label::Undefined);
    }

    #[test]
    fn rewind_is_limited() {
        let mut state = opened();
        // Blocked right after opening and before two iterations.
        assert!(state.rewind().is_none());
        submit(&mut state, 0, 1);
        submit(&mut state, 1, 1);

        assert!(state.rewind().is_some());
        state.apply_oracle_output(fixtures::output());
        assert!(state.rewind().is_none());
        assert_eq!(state.session().iteration, 2);

        // A continue re-arms it.
        submit(&mut state, 2, 1);
        assert!(state.rewind().is_some());
    }

    #[test]
    fn rewind_needs_rewindable_setup() {
        let mut setup = fixtures::setup();
        setup.rewindable = false;
        let mut state = IterationState::open(fixtures::session(), setup, fixtures::dataset());
        state.apply_oracle_output(fixtures::output());
        submit(&mut state, 0, 1);
        assert!(state.rewind().is_none());
    }

    #[test]
    fn deadline_auto_labels_with_prediction() {
        let mut setup = fixtures::setup();
        setup.max_answer_time = 5;
        let mut state = IterationState::open(fixtures::session(), setup, fixtures::dataset());
        state.apply_oracle_output(fixtures::output());
        state.select_point(3);

        for _ in 0..4 {
            assert_eq!(state.timestep(), TickOutcome::Ticked);
        }
        assert_eq!(state.timestep(), TickOutcome::Deadline);
        assert_eq!(state.snapshot().selected_label, Some(Label::Outlier));
        assert_eq!(state.session().in_progress, 5);

        assert!(matches!(state.continue_iteration(false), Some(Submission::Requery(_))));
    }

    #[test]
    fn deadline_keeps_chosen_label() {
        let mut setup = fixtures::setup();
        setup.max_answer_time = 5;
        let mut state = IterationState::open(fixtures::session(), setup, fixtures::dataset());
        state.apply_oracle_output(fixtures::output());
        state.select_point(3);
        state.select_label(1);
        for _ in 0..5 {
            state.timestep();
        }
        assert_eq!(state.snapshot().selected_label, Some(Label::Inlier));
    }

    #[test]
    fn unlimited_answer_time_never_expires() {
        let mut state = opened();
        for _ in 0..120 {
            assert_eq!(state.timestep(), TickOutcome::Ticked);
        }
        let snapshot = state.snapshot();
        assert_eq!(snapshot.minutes, 2);
        assert_eq!(snapshot.seconds, 0);
        assert_eq!(snapshot.elapsed.as_deref(), Some("00:02:00"));
    }

    #[test]
    fn heatmap_slot_keeps_first_rendering() {
        let mut state = opened();
        assert!(state.show_heatmap(1, &JsonHeatmapRenderer).is_none());

        let first = state.show_heatmap(0, &JsonHeatmapRenderer).unwrap();
        assert_eq!(state.heatmaps()[0], first);

        let mut other = fixtures::output();
        other.query_ids = vec![0];
        state.apply_oracle_output(other);
        let second = state.show_heatmap(0, &JsonHeatmapRenderer).unwrap();
        assert_ne!(first, second);
        assert_eq!(state.heatmaps()[0], first);
    }

    #[test]
    fn heatmap_needs_oracle_output() {
        let mut state = IterationState::open(fixtures::session(), fixtures::setup(), fixtures::dataset());
        assert!(state.show_heatmap(0, &JsonHeatmapRenderer).is_none());
    }

    #[test]
    fn rendered_heatmaps_are_stored_on_continue() {
        let mut state = opened();
        let payload = state.show_heatmap(0, &JsonHeatmapRenderer).unwrap();
        state.select_point(0);
        state.select_label(1);
        state.continue_iteration(false);
        assert_eq!(state.session().heatmaps, vec![vec![payload]]);
        assert_eq!(state.heatmaps(), &[EMPTY_HEATMAP.to_string()]);
    }

    #[test]
    fn abort_stops_everything() {
        let mut state = opened();
        state.abort();
        assert_eq!(state.phase(), IterationPhase::Aborted);
        assert_eq!(state.timestep(), TickOutcome::Idle);
        assert!(!state.select_point(0));
    }
}
