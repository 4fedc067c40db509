//! Shared records for unit tests.

use crate::models::{
    ClassifierParams, Dataset, FeedbackMode, HistoryMode, Session, Setup,
};
use crate::ocal::OcalOutput;

/// Four points in two dimensions, one subspace `[1, 2]`.
pub fn dataset() -> Dataset {
    Dataset {
        id: 2,
        name: "toy".into(),
        typename: None,
        description: "toy data".into(),
        titles: vec!["width".into(), "height".into()],
        values: vec![
            vec![0.0, 0.0],
            vec![1.0, 2.0],
            vec![2.0, 4.0],
            vec![4.0, 8.0],
        ],
        values_normalized: vec![
            vec![0.0, 0.0],
            vec![0.25, 0.25],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
        ],
        raw_data: (0..4)
            .map(|i| serde_json::json!({ "file": format!("point_{i}.png") }))
            .collect(),
        normalize_factor: vec![[0.0, 4.0], [0.0, 8.0]],
    }
}

pub fn setup() -> Setup {
    Setup {
        id: 1,
        name: "toy setup".into(),
        description: "for tests".into(),
        params: ClassifierParams {
            c: Some(0.4),
            gamma: Some(0.2),
        },
        raw_data: false,
        rewindable: true,
        subspaces: vec![[1, 2]],
        subspace_grids: vec![vec![[0.0, 0.0], [4.0, 8.0]]],
        subspace_grids_normalized: vec![vec![[0.0, 0.0], [1.0, 1.0]]],
        max_answer_time: -1,
        creation_time: 0,
        finished_creation: true,
        creator: None,
        iterations: 5,
        query_strategy: "random".into(),
        history_mode: HistoryMode::Decisions,
        feedback_mode: FeedbackMode::Hybrid,
        dataset: 2,
        classifier: "svdd".into(),
    }
}

pub fn session() -> Session {
    Session {
        id: 3,
        ..Session::new(1, Some(7), 4)
    }
}

/// Oracle output predicting point 3 as the only outlier.
pub fn output() -> OcalOutput {
    OcalOutput {
        prediction_global: vec![
            "inlier".into(),
            "inlier".into(),
            "inlier".into(),
            "outlier".into(),
        ],
        prediction_subspaces: vec![vec![
            "inlier".into(),
            "inlier".into(),
            "inlier".into(),
            "outlier".into(),
        ]],
        query_ids: vec![3],
        score_subspace_grids: vec![vec![0.1, -0.4]],
    }
}
