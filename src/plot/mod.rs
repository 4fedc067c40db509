//! Heatmap payloads for one subspace of an iteration.
//!
//! Rendering itself happens in the client. This module only gathers what a
//! contour plot of a subspace needs and hands it to a [`HeatmapRenderer`],
//! whose output is stored opaquely as a JSON string per heatmap slot.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Dataset, FeedbackMode, Setup};
use crate::ocal::OcalOutput;

/// Everything needed to plot subspace `index`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRequest {
    pub index: usize,
    /// 1-based dimensions.
    pub subspace: [usize; 2],
    pub x_title: String,
    pub y_title: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Predicted final label per point in this subspace.
    pub labels: Vec<String>,
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub scores: Vec<f64>,
    pub feedback_mode: FeedbackMode,
    pub suggested_point: Option<i64>,
    pub typename: Option<String>,
    /// Only filled when the setup lets users see raw records.
    pub raw_data: Option<Vec<Value>>,
}

impl HeatmapRequest {
    /// `None` when `index` is not a configured subspace or the oracle output
    /// has no entry for it.
    pub fn build(index: usize, setup: &Setup, dataset: &Dataset, output: &OcalOutput) -> Option<Self> {
        let subspace = *setup.subspaces.get(index)?;
        let grid = setup.subspace_grids.get(index)?;
        let labels = output.prediction_subspaces.get(index)?.clone();
        let scores = output.score_subspace_grids.get(index)?.clone();

        let (x_dim, y_dim) = (subspace[0].checked_sub(1)?, subspace[1].checked_sub(1)?);
        let x_title = dataset.titles.get(x_dim)?.clone();
        let y_title = dataset.titles.get(y_dim)?.clone();
        let column = |dim: usize| -> Option<Vec<f64>> {
            dataset.values.iter().map(|row| row.get(dim).copied()).collect()
        };

        Some(Self {
            index,
            subspace,
            x_title,
            y_title,
            x: column(x_dim)?,
            y: column(y_dim)?,
            labels,
            grid_x: grid.iter().map(|point| point[0]).collect(),
            grid_y: grid.iter().map(|point| point[1]).collect(),
            scores,
            feedback_mode: setup.feedback_mode,
            suggested_point: output.suggested_point(),
            typename: dataset.typename.clone(),
            raw_data: setup.raw_data.then(|| dataset.raw_data.clone()),
        })
    }
}

pub trait HeatmapRenderer: Send + Sync {
    fn render(&self, request: &HeatmapRequest) -> Result<Value>;
}

/// Emits a plain JSON document describing the plot.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHeatmapRenderer;

impl HeatmapRenderer for JsonHeatmapRenderer {
    fn render(&self, request: &HeatmapRequest) -> Result<Value> {
        if request.grid_x.len() != request.scores.len() {
            return Err(anyhow!(
                "subspace {} has {} grid points but {} scores",
                request.index,
                request.grid_x.len(),
                request.scores.len()
            ));
        }

        let suggested = request
            .feedback_mode
            .suggests_points()
            .then_some(request.suggested_point)
            .flatten();
        // Users pick points themselves unless the system decides alone.
        let selectable = !matches!(request.feedback_mode, FeedbackMode::System);

        Ok(serde_json::json!({
            "subspace": request.subspace,
            "layout": {
                "xaxis": { "title": request.x_title },
                "yaxis": { "title": request.y_title },
            },
            "points": {
                "x": request.x,
                "y": request.y,
                "labels": request.labels,
            },
            "contour": {
                "x": request.grid_x,
                "y": request.grid_y,
                "z": request.scores,
            },
            "suggestedPoint": suggested,
            "selectable": selectable,
            "typename": request.typename,
            "rawData": request.raw_data,
        }))
    }
}
