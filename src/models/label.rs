//! Label vocabulary shared by users and the classifier.
//!
//! Every label has two spellings: the user-facing code stored in
//! `Session::labels` and the classifier-facing code found in
//! `Session::final_labels` and in oracle predictions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Label {
    #[serde(rename = "U")]
    Undefined,
    #[serde(rename = "Lin")]
    Inlier,
    #[serde(rename = "Lout")]
    Outlier,
}

impl Default for Label {
    fn default() -> Self {
        Label::Undefined
    }
}

impl Label {
    /// Selection order used by the labeling buttons.
    pub const ALL: [Label; 3] = [Label::Undefined, Label::Inlier, Label::Outlier];

    pub fn from_index(index: usize) -> Option<Label> {
        Self::ALL.get(index).copied()
    }

    pub fn user_code(&self) -> &'static str {
        match self {
            Label::Undefined => "U",
            Label::Inlier => "Lin",
            Label::Outlier => "Lout",
        }
    }

    pub fn final_code(&self) -> &'static str {
        match self {
            Label::Undefined => "NOT DEFINED",
            Label::Inlier => "inlier",
            Label::Outlier => "outlier",
        }
    }

    pub fn from_final(code: &str) -> Option<Label> {
        Self::ALL.into_iter().find(|label| label.final_code() == code)
    }

    pub fn from_user(code: &str) -> Option<Label> {
        Self::ALL.into_iter().find(|label| label.user_code() == code)
    }
}

/// Maps a classifier code to its user code; unknown codes pass through.
pub fn final_to_user(code: &str) -> String {
    Label::from_final(code)
        .map(|label| label.user_code().to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Maps a user code to its classifier code; unknown codes pass through.
pub fn user_to_final(code: &str) -> String {
    Label::from_user(code)
        .map(|label| label.final_code().to_string())
        .unwrap_or_else(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_both_spellings() {
        for label in Label::ALL {
            assert_eq!(Label::from_final(label.final_code()), Some(label));
            assert_eq!(Label::from_user(label.user_code()), Some(label));
        }
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(final_to_user("non existing"), "non existing");
        assert_eq!(user_to_final("non existing"), "non existing");
        assert_eq!(final_to_user("outlier"), "Lout");
        assert_eq!(user_to_final("Lin"), "inlier");
    }

    #[test]
    fn serializes_as_user_code() {
        let json = serde_json::to_string(&vec![Label::Undefined, Label::Inlier, Label::Outlier]).unwrap();
        assert_eq!(json, r#"["U","Lin","Lout"]"#);
    }

    #[test]
    fn index_lookup_rejects_out_of_range() {
        assert_eq!(Label::from_index(1), Some(Label::Inlier));
        assert_eq!(Label::from_index(3), None);
    }
}
