use serde::{Deserialize, Serialize};

/// Per-dimension `[min, max]` used for value and grid normalization.
pub type NormalizeFactor = [f64; 2];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub typename: Option<String>,
    #[serde(default)]
    pub description: String,
    pub titles: Vec<String>,
    /// Feature values, one row per point.
    pub values: Vec<Vec<f64>>,
    pub values_normalized: Vec<Vec<f64>>,
    #[serde(default)]
    pub raw_data: Vec<serde_json::Value>,
    pub normalize_factor: Vec<NormalizeFactor>,
}

impl Dataset {
    pub fn dimensions(&self) -> usize {
        self.titles.len()
    }

    pub fn point_count(&self) -> usize {
        self.values.len()
    }

    /// Factor for a 1-based dimension index.
    pub fn factor(&self, dimension: usize) -> Option<NormalizeFactor> {
        dimension
            .checked_sub(1)
            .and_then(|index| self.normalize_factor.get(index))
            .copied()
    }

    /// Caption for a 1-based subspace, e.g. `"age x income"`.
    pub fn subspace_caption(&self, subspace: [usize; 2]) -> Option<String> {
        let x = subspace[0].checked_sub(1).and_then(|i| self.titles.get(i))?;
        let y = subspace[1].checked_sub(1).and_then(|i| self.titles.get(i))?;
        Some(format!("{x} x {y}"))
    }
}
