//! Agreement statistics between the final labels of two sessions.

use crate::models::{Label, Session};

/// Cell colors of the session comparison matrix, lowest band first.
pub const MATRIX_COLORS: [&str; 5] = ["ffffff", "ffcccc", "ff8080", "e60000", "000000"];

/// Pairwise label tally of two equally long label lists.
///
/// `oi` is the catch-all bucket: besides outlier/inlier pairs it also
/// collects every pair involving an undefined label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelAgreement {
    pub io: usize,
    pub oi: usize,
    pub ei: usize,
    pub eo: usize,
}

impl LabelAgreement {
    pub fn total(&self) -> usize {
        self.io + self.oi + self.ei + self.eo
    }

    pub fn equal(&self) -> usize {
        self.ei + self.eo
    }

    /// `[io, oi, ei, eo]`
    pub fn as_array(&self) -> [usize; 4] {
        [self.io, self.oi, self.ei, self.eo]
    }
}

/// Tallies paired final label codes. `None` when either list is missing,
/// empty, or the lengths differ.
pub fn compare_labeled_data<S: AsRef<str>>(
    first: Option<&[S]>,
    second: Option<&[S]>,
) -> Option<LabelAgreement> {
    let (first, second) = (first?, second?);
    if first.is_empty() || second.is_empty() || first.len() != second.len() {
        return None;
    }

    let inlier = Label::Inlier.final_code();
    let outlier = Label::Outlier.final_code();
    let mut agreement = LabelAgreement::default();
    for (a, b) in first.iter().zip(second) {
        match (a.as_ref(), b.as_ref()) {
            (a, b) if a == inlier && b == inlier => agreement.ei += 1,
            (a, b) if a == outlier && b == outlier => agreement.eo += 1,
            (a, b) if a == inlier && b == outlier => agreement.io += 1,
            _ => agreement.oi += 1,
        }
    }
    Some(agreement)
}

fn session_agreement(first: &Session, second: &Session) -> Option<LabelAgreement> {
    compare_labeled_data(Some(&first.final_labels[..]), Some(&second.final_labels[..]))
}

/// Share of equal final labels, three significant digits, or `-1`.
pub fn compare_sessions(first: &Session, second: &Session) -> f64 {
    match session_agreement(first, second) {
        Some(agreement) => to_precision_3(agreement.equal() as f64 / agreement.total() as f64),
        None => -1.0,
    }
}

/// Cohen's kappa over the final labels of two sessions, or `-1`.
pub fn cohens_kappa(first: &Session, second: &Session) -> f64 {
    let Some(LabelAgreement { io, oi, ei, eo }) = session_agreement(first, second) else {
        return -1.0;
    };
    let sum = io + oi + ei + eo;
    if ei == sum || eo == sum {
        return 1.0;
    }

    let sum = sum as f64;
    let (io, oi, ei, eo) = (io as f64, oi as f64, ei as f64, eo as f64);
    let p0 = (ei + eo) / sum;
    let p_in = ((ei + io) / sum) * ((ei + oi) / sum);
    let p_out = ((oi + eo) / sum) * ((io + eo) / sum);
    let pe = p_in + p_out;
    to_precision_3((p0 - pe) / (1.0 - pe))
}

/// Matrix cell color for the agreement of two sessions.
pub fn matrix_color_entry(first: &Session, second: &Session) -> &'static str {
    color_for_agreement(compare_sessions(first, second))
}

pub fn color_for_agreement(result: f64) -> &'static str {
    if result < 0.25 {
        MATRIX_COLORS[0]
    } else if result < 0.5 {
        MATRIX_COLORS[1]
    } else if result < 0.75 {
        MATRIX_COLORS[2]
    } else if result <= 1.0 {
        MATRIX_COLORS[3]
    } else {
        MATRIX_COLORS[4]
    }
}

/// Rounds to three significant digits, ties away from zero.
///
/// Works on the exact decimal expansion so `0.5625` becomes `0.563` rather
/// than following binary rounding.
pub fn to_precision_3(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }

    let text = format!("{:.40e}", value.abs());
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return value;
    };
    let Ok(mut exponent) = exponent.parse::<i32>() else {
        return value;
    };
    let digits: Vec<u32> = mantissa.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 4 {
        return value;
    }

    let mut kept = digits[0] * 100 + digits[1] * 10 + digits[2];
    if digits[3] >= 5 {
        kept += 1;
    }
    if kept == 1000 {
        kept = 100;
        exponent += 1;
    }

    let rounded = format!("{kept}e{}", exponent - 2)
        .parse::<f64>()
        .unwrap_or(value.abs());
    rounded.copysign(value)
}
