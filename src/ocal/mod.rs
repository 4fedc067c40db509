//! The classification oracle ("Ocal") seam.
//!
//! The oracle receives the whole labeling state of a session and answers
//! with fresh predictions, the next query point and per-subspace scores.
//! An unavailable oracle answers with a `detail` or `error` field instead.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{ClassifierParams, Dataset, Grid, Label, Session, Setup};

pub use http::HttpOracle;

/// Detail reported when the oracle cannot be reached.
pub const CONNECTION_FAILED: &str = "Connection to API failed";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("OcalAPI: {0}")]
    Unavailable(String),
    #[error("OcalAPI: reply is missing {0}")]
    Incomplete(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcalParams {
    #[serde(flatten)]
    pub classifier_params: ClassifierParams,
    pub classifier: String,
    pub query_strategy: String,
}

/// Request body posted to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcalRequest {
    /// Normalized feature values.
    pub data: Vec<Vec<f64>>,
    /// User-facing label codes, one per point.
    pub labels: Vec<String>,
    pub params: OcalParams,
    pub query_history: Vec<Vec<usize>>,
    pub subspaces: Vec<[usize; 2]>,
    pub subspace_grids: Vec<Grid>,
}

impl OcalRequest {
    fn build(setup: &Setup, dataset: &Dataset, labels: Vec<String>, history: Vec<Vec<usize>>) -> Self {
        Self {
            data: dataset.values_normalized.clone(),
            labels,
            params: OcalParams {
                classifier_params: setup.params.clone(),
                classifier: setup.classifier.clone(),
                query_strategy: setup.query_strategy.clone(),
            },
            query_history: history,
            subspaces: setup.subspaces.clone(),
            subspace_grids: setup.subspace_grids_normalized.clone(),
        }
    }

    /// Request for a running session: its labels and query history.
    pub fn for_session(setup: &Setup, dataset: &Dataset, session: &Session) -> Self {
        let labels = session
            .labels
            .iter()
            .map(|label| label.user_code().to_string())
            .collect();
        Self::build(setup, dataset, labels, session.history.clone())
    }

    /// Request for a setup preview: nothing labeled, no history.
    pub fn for_setup(setup: &Setup, dataset: &Dataset) -> Self {
        let labels = vec![Label::Undefined.user_code().to_string(); dataset.values_normalized.len()];
        Self::build(setup, dataset, labels, Vec::new())
    }
}

/// Raw oracle answer. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OcalReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_global: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_subspaces: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_subspace_grids: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

impl OcalReply {
    pub fn unavailable(detail: &str) -> Self {
        Self {
            detail: Some(Value::String(detail.to_string())),
            ..Self::default()
        }
    }

    pub fn connection_failed() -> Self {
        Self::unavailable(CONNECTION_FAILED)
    }

    /// A present `detail` always fails; `error` fails when truthy.
    pub fn failure(&self) -> Option<String> {
        if let Some(detail) = &self.detail {
            return Some(value_text(detail));
        }
        self.error.as_ref().filter(|e| truthy(e)).map(value_text)
    }

    pub fn into_output(self) -> Result<OcalOutput, OracleError> {
        if let Some(message) = self.failure() {
            return Err(OracleError::Unavailable(message));
        }
        Ok(OcalOutput {
            prediction_global: self
                .prediction_global
                .ok_or(OracleError::Incomplete("prediction_global"))?,
            prediction_subspaces: self
                .prediction_subspaces
                .ok_or(OracleError::Incomplete("prediction_subspaces"))?,
            query_ids: self.query_ids.ok_or(OracleError::Incomplete("query_ids"))?,
            score_subspace_grids: self
                .score_subspace_grids
                .ok_or(OracleError::Incomplete("score_subspace_grids"))?,
        })
    }
}

/// A successful oracle answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OcalOutput {
    /// Final label codes for every point.
    pub prediction_global: Vec<String>,
    /// Final label codes per subspace and point.
    pub prediction_subspaces: Vec<Vec<String>>,
    pub query_ids: Vec<i64>,
    /// Scores per subspace, aligned with that subspace's grid.
    pub score_subspace_grids: Vec<Vec<f64>>,
}

impl OcalOutput {
    /// The point the oracle wants labeled next.
    pub fn suggested_point(&self) -> Option<i64> {
        self.query_ids.first().copied()
    }

    /// Last predicted final label for a point.
    pub fn prediction_for(&self, point: usize) -> Option<&str> {
        self.prediction_global.get(point).map(String::as_str)
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Never fails outright; unavailability comes back as a reply with
    /// `detail` set.
    async fn query(&self, request: &OcalRequest) -> OcalReply;
}
