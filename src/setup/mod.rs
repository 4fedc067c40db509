//! Setup creation: form validation and grid precomputation.

use serde::Deserialize;
use thiserror::Error;

use crate::grid::{normalize_subspace_grids, transform_subspace_grids};
use crate::models::{
    ClassifierParams, Dataset, FeedbackMode, HistoryMode, Setup, UNLIMITED_ANSWER_TIME,
    UNLIMITED_ITERATIONS,
};

pub const MAX_NAME_LEN: usize = 30;
/// Answer deadlines up to this many seconds leave no time to answer.
pub const MIN_ANSWER_TIME: i64 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Name may not be left blank")]
    NameMissing,
    #[error("Name too long, at most {MAX_NAME_LEN} characters")]
    NameTooLong,
    #[error("Name must contain at least one non-whitespace character")]
    NameBlank,
    #[error("Description may not be left blank")]
    DescriptionMissing,
    #[error("Description must contain at least one non-whitespace character")]
    DescriptionBlank,
    #[error("Parameter C may not be left blank")]
    CMissing,
    #[error("Invalid value for parameter C")]
    CInvalid,
    #[error("Parameter gamma may not be left blank")]
    GammaMissing,
    #[error("Invalid value for parameter gamma")]
    GammaInvalid,
    #[error("Subspaces may not be left blank")]
    SubspacesMissing,
    #[error("Invalid format in subspaces")]
    SubspacesFormat,
    #[error("Subspaces do not match the dimensions of the dataset")]
    SubspaceOutOfRange,
    #[error("The x and y axis of a subspace must use different dimensions")]
    SubspaceSameDimension,
    #[error("Amount of grid points may not be left blank")]
    GridMissing,
    #[error("Invalid amount of grid points")]
    GridInvalid,
    #[error("Invalid amount of iterations")]
    IterationsInvalid,
    #[error("0 is not a valid amount of iterations")]
    IterationsZero,
    #[error("Invalid maximum answer time")]
    AnswerTimeInvalid,
    #[error("A maximum answer time between 0 and {MIN_ANSWER_TIME} is not valid")]
    AnswerTimeTooShort,
    #[error("Dataset has been left blank")]
    DatasetMissing,
    #[error("Feedback mode has been left blank")]
    FeedbackModeMissing,
    #[error("History mode has been left blank")]
    HistoryModeMissing,
    #[error("Query strategy has been left blank")]
    QueryStrategyMissing,
    #[error("Classifier has been left blank")]
    ClassifierMissing,
    #[error("Selected dataset {0} does not match the loaded one")]
    DatasetMismatch(i64),
    #[error("Error while normalizing the grid points")]
    GridNormalization,
}

/// Raw setup form input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupDraft {
    pub name: String,
    pub description: String,
    #[serde(rename = "C")]
    pub c: Option<f64>,
    pub gamma: Option<f64>,
    pub raw_data: bool,
    pub rewindable: bool,
    /// `"x,y;x,y"` with 1-based dimensions.
    pub subspaces: String,
    #[serde(rename = "subspacesGrids")]
    pub grid_resolution: Option<i64>,
    pub iterations: Option<i64>,
    pub max_answer_time: Option<i64>,
    pub dataset: Option<i64>,
    pub feedback_mode: Option<FeedbackMode>,
    pub history_mode: Option<HistoryMode>,
    pub query_strategy: Option<String>,
    pub classifier: Option<String>,
    pub finished_creation: bool,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

impl SetupDraft {
    /// Checks every field in form order and normalizes the budgets.
    ///
    /// Returns `(iterations, max_answer_time, resolution)` with values below
    /// `-1` coerced to unlimited.
    pub fn validate(&self) -> Result<(i64, i64, usize), SetupError> {
        if self.name.is_empty() {
            return Err(SetupError::NameMissing);
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(SetupError::NameTooLong);
        }
        if self.name.trim().is_empty() {
            return Err(SetupError::NameBlank);
        }
        if self.description.is_empty() {
            return Err(SetupError::DescriptionMissing);
        }
        if self.description.trim().is_empty() {
            return Err(SetupError::DescriptionBlank);
        }

        let c = self.c.ok_or(SetupError::CMissing)?;
        if !(0.0..=1.0).contains(&c) {
            return Err(SetupError::CInvalid);
        }
        let gamma = self.gamma.ok_or(SetupError::GammaMissing)?;
        if gamma.is_nan() || gamma < 0.0 {
            return Err(SetupError::GammaInvalid);
        }

        if self.subspaces.is_empty() {
            return Err(SetupError::SubspacesMissing);
        }
        if !subspaces_well_formed(&self.subspaces) {
            return Err(SetupError::SubspacesFormat);
        }

        let resolution = match self.grid_resolution {
            None | Some(0) => return Err(SetupError::GridMissing),
            Some(r) if r < 0 => return Err(SetupError::GridInvalid),
            Some(r) => usize::try_from(r).map_err(|_| SetupError::GridInvalid)?,
        };

        let mut iterations = self.iterations.ok_or(SetupError::IterationsInvalid)?;
        if iterations < UNLIMITED_ITERATIONS {
            iterations = UNLIMITED_ITERATIONS;
        }
        if iterations == 0 {
            return Err(SetupError::IterationsZero);
        }

        let mut max_answer_time = self.max_answer_time.ok_or(SetupError::AnswerTimeInvalid)?;
        if (0..=MIN_ANSWER_TIME).contains(&max_answer_time) {
            return Err(SetupError::AnswerTimeTooShort);
        }
        if max_answer_time < UNLIMITED_ANSWER_TIME {
            max_answer_time = UNLIMITED_ANSWER_TIME;
        }

        if self.dataset.is_none() {
            return Err(SetupError::DatasetMissing);
        }
        if self.feedback_mode.is_none() {
            return Err(SetupError::FeedbackModeMissing);
        }
        if self.history_mode.is_none() {
            return Err(SetupError::HistoryModeMissing);
        }
        if blank(&self.query_strategy) {
            return Err(SetupError::QueryStrategyMissing);
        }
        if blank(&self.classifier) {
            return Err(SetupError::ClassifierMissing);
        }

        Ok((iterations, max_answer_time, resolution))
    }

    /// Validates the draft and assembles a setup with its grids, stamped
    /// with `now` (unix seconds).
    pub fn build(&self, dataset: &Dataset, now: i64) -> Result<Setup, SetupError> {
        let (iterations, max_answer_time, resolution) = self.validate()?;
        let dataset_id = self.dataset.ok_or(SetupError::DatasetMissing)?;
        if dataset.id != dataset_id {
            return Err(SetupError::DatasetMismatch(dataset_id));
        }

        let subspaces = parse_subspaces(&self.subspaces, dataset.dimensions())?;
        let subspace_grids = transform_subspace_grids(resolution, &subspaces, dataset)
            .ok_or(SetupError::GridInvalid)?;
        let subspace_grids_normalized =
            normalize_subspace_grids(&subspace_grids, &subspaces, Some(dataset))
                .ok_or(SetupError::GridNormalization)?;

        Ok(Setup {
            id: 0,
            name: self.name.clone(),
            description: self.description.clone(),
            params: ClassifierParams {
                c: self.c,
                gamma: self.gamma,
            },
            raw_data: self.raw_data,
            rewindable: self.rewindable,
            subspaces,
            subspace_grids,
            subspace_grids_normalized,
            max_answer_time,
            creation_time: now,
            finished_creation: self.finished_creation,
            creator: None,
            iterations,
            query_strategy: self.query_strategy.clone().unwrap_or_default(),
            history_mode: self.history_mode.unwrap_or(HistoryMode::NoHistory),
            feedback_mode: self.feedback_mode.unwrap_or(FeedbackMode::User),
            dataset: dataset_id,
            classifier: self.classifier.clone().unwrap_or_default(),
        })
    }
}

fn digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Syntax check for `"a,b;c,d"`.
pub fn subspaces_well_formed(input: &str) -> bool {
    input.split(';').all(|pair| match pair.split_once(',') {
        Some((x, y)) => digits(x) && digits(y),
        None => false,
    })
}

/// Parses `"a,b;c,d"` into 1-based dimension pairs within `1..=dimensions`.
pub fn parse_subspaces(input: &str, dimensions: usize) -> Result<Vec<[usize; 2]>, SetupError> {
    if !subspaces_well_formed(input) {
        return Err(SetupError::SubspacesFormat);
    }

    let mut subspaces = Vec::new();
    for pair in input.split(';') {
        let (x, y) = pair.split_once(',').ok_or(SetupError::SubspacesFormat)?;
        let mut dims = [0usize; 2];
        for (slot, text) in dims.iter_mut().zip([x, y]) {
            let dim: usize = text.parse().map_err(|_| SetupError::SubspacesFormat)?;
            if dim < 1 || dim > dimensions {
                return Err(SetupError::SubspaceOutOfRange);
            }
            *slot = dim;
        }
        if dims[0] == dims[1] {
            return Err(SetupError::SubspaceSameDimension);
        }
        subspaces.push(dims);
    }
    Ok(subspaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset {
            id: 4,
            name: "wine".into(),
            titles: vec!["alcohol".into(), "acid".into(), "ash".into()],
            normalize_factor: vec![[0.0, 10.0], [2.0, 2.0], [-1.0, 1.0]],
            ..Dataset::default()
        }
    }

    fn draft() -> SetupDraft {
        SetupDraft {
            name: "Wine study".into(),
            description: "first round".into(),
            c: Some(0.5),
            gamma: Some(0.1),
            rewindable: true,
            subspaces: "1,2;3,1".into(),
            grid_resolution: Some(10),
            iterations: Some(20),
            max_answer_time: Some(30),
            dataset: Some(4),
            feedback_mode: Some(FeedbackMode::Hybrid),
            history_mode: Some(HistoryMode::Decisions),
            query_strategy: Some("random".into()),
            classifier: Some("svdd".into()),
            ..SetupDraft::default()
        }
    }

    #[test]
    fn builds_setup_with_grids() {
        let setup = draft().build(&dataset(), 1_700_000_000).unwrap();
        assert_eq!(setup.subspaces, vec![[1, 2], [3, 1]]);
        assert!(setup.grids_consistent());
        assert_eq!(setup.subspace_grids[0].len(), 13 * 13);
        assert_eq!(setup.creation_time, 1_700_000_000);
        assert_eq!(setup.iterations, 20);
        // acid has min == max
        assert!(setup.subspace_grids_normalized[0].iter().all(|p| p[1] == 1.0));
    }

    #[test]
    fn name_and_description_checks() {
        let mut d = draft();
        d.name = String::new();
        assert_eq!(d.validate(), Err(SetupError::NameMissing));
        d.name = "x".repeat(31);
        assert_eq!(d.validate(), Err(SetupError::NameTooLong));
        d.name = "   ".into();
        assert_eq!(d.validate(), Err(SetupError::NameBlank));
        d.name = "ok".into();
        d.description = "\t".into();
        assert_eq!(d.validate(), Err(SetupError::DescriptionBlank));
    }

    #[test]
    fn classifier_parameter_ranges() {
        let mut d = draft();
        d.c = Some(1.5);
        assert_eq!(d.validate(), Err(SetupError::CInvalid));
        d.c = None;
        assert_eq!(d.validate(), Err(SetupError::CMissing));
        d.c = Some(1.0);
        d.gamma = Some(-0.1);
        assert_eq!(d.validate(), Err(SetupError::GammaInvalid));
    }

    #[test]
    fn budgets_are_coerced_or_rejected() {
        let mut d = draft();
        d.iterations = Some(-7);
        d.max_answer_time = Some(-3);
        let (iterations, answer, _) = d.validate().unwrap();
        assert_eq!(iterations, UNLIMITED_ITERATIONS);
        assert_eq!(answer, UNLIMITED_ANSWER_TIME);

        d.iterations = Some(0);
        assert_eq!(d.validate(), Err(SetupError::IterationsZero));
        d.iterations = Some(5);
        for short in [0, 1, 4] {
            d.max_answer_time = Some(short);
            assert_eq!(d.validate(), Err(SetupError::AnswerTimeTooShort));
        }
        d.max_answer_time = Some(5);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn grid_resolution_must_be_positive() {
        let mut d = draft();
        d.grid_resolution = Some(-2);
        assert_eq!(d.validate(), Err(SetupError::GridInvalid));
        d.grid_resolution = None;
        assert_eq!(d.validate(), Err(SetupError::GridMissing));
    }

    #[test]
    fn required_choices() {
        let mut d = draft();
        d.classifier = Some(String::new());
        assert_eq!(d.validate(), Err(SetupError::ClassifierMissing));
        d.feedback_mode = None;
        assert_eq!(d.validate(), Err(SetupError::FeedbackModeMissing));
        d.dataset = None;
        assert_eq!(d.validate(), Err(SetupError::DatasetMissing));
    }

    #[test]
    fn subspace_syntax() {
        assert!(subspaces_well_formed("1,2"));
        assert!(subspaces_well_formed("1,2;10,3"));
        assert!(!subspaces_well_formed("1,2,3"));
        assert!(!subspaces_well_formed("1;2"));
        assert!(!subspaces_well_formed("1,2;"));
        assert!(!subspaces_well_formed("a,b"));
        assert!(!subspaces_well_formed(" 1,2"));
    }

    #[test]
    fn subspace_dimension_checks() {
        assert_eq!(parse_subspaces("1,3", 3), Ok(vec![[1, 3]]));
        assert_eq!(parse_subspaces("0,1", 3), Err(SetupError::SubspaceOutOfRange));
        assert_eq!(parse_subspaces("1,4", 3), Err(SetupError::SubspaceOutOfRange));
        assert_eq!(parse_subspaces("2,2", 3), Err(SetupError::SubspaceSameDimension));
    }

    #[test]
    fn build_rejects_other_dataset() {
        let mut d = draft();
        d.dataset = Some(9);
        assert_eq!(
            d.build(&dataset(), 0).unwrap_err(),
            SetupError::DatasetMismatch(9)
        );
    }
}
