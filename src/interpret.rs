//! Natural-language conclusion from a moderated regression fit
//!
//! Moderation effects are found by inspecting the structured operands of
//! each coefficient, never by parsing coefficient labels.

use crate::dataset::DOSE_NUMERIC_COLUMN;
use crate::model::{CodedOperand, Coefficient, FittedModel, Operand, TermKind};
use std::fmt::Write;

/// Significance level for every claim in the conclusion
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Strength label for an R² value
#[must_use]
pub fn strength_label(r_squared: f64) -> &'static str {
    if r_squared < 0.2 {
        "weak"
    } else if r_squared < 0.5 {
        "moderate"
    } else {
        "strong"
    }
}

/// Level of `factor` when `coefficient` is a dose-by-`factor` interaction
fn moderated_level<'a>(coefficient: &'a Coefficient, factor: &str) -> Option<&'a str> {
    if coefficient.kind != TermKind::Interaction {
        return None;
    }
    let mut has_dose = false;
    let mut level = None;
    for CodedOperand { operand, level: l } in &coefficient.operands {
        match operand {
            Operand::Numeric(name) if name == DOSE_NUMERIC_COLUMN => has_dose = true,
            Operand::Categorical(name) if name == factor => level = l.as_deref(),
            _ => return None,
        }
    }
    level.filter(|_| has_dose)
}

/// Describe the dose effect found by `model`
///
/// The dose coefficient is the main effect of `Dose_numeric`; when the fit
/// has none (aliased or absent) it counts as 0 with p = 1. One extra sentence
/// is appended for every significant dose-by-`categorical_factor` term.
#[must_use]
pub fn generate_conclusion(
    model: &FittedModel,
    response: &str,
    categorical_factor: &str,
) -> String {
    let (estimate, p_value) = model
        .numeric_coefficient(DOSE_NUMERIC_COLUMN)
        .map_or((0.0, 1.0), |c| (c.estimate, c.p_value));

    let direction = if estimate > 0.0 {
        "increase"
    } else if estimate < 0.0 {
        "decrease"
    } else {
        "remain constant"
    };
    let significance = if p_value < SIGNIFICANCE_LEVEL {
        "significant"
    } else {
        "not significant"
    };

    let mut conclusion = format!(
        "Based on an R\u{b2} of {:.2}, there is a {} association between '{response}' \
         and the dose. The coefficient suggests the response tends to {direction} \
         as the dose increases. This effect was {significance} (p = {p_value:.4}).",
        model.r_squared,
        strength_label(model.r_squared),
    );

    for coefficient in &model.coefficients {
        if coefficient.p_value >= SIGNIFICANCE_LEVEL || coefficient.p_value.is_nan() {
            continue;
        }
        if let Some(level) = moderated_level(coefficient, categorical_factor) {
            let _ = write!(
                conclusion,
                " There is also evidence that dose effect differs for group '{level}' \
                 of factor '{categorical_factor}'."
            );
        }
    }

    conclusion
}
