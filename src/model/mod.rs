//! Linear model formulas and ordinary least squares
//!
//! Model terms are STRUCTURED values, not strings:
//!
//! ```text
//! Formula ──< Term (Intercept | Main(Operand) | Interaction(Operand..))
//!                 └── Operand (Categorical(name) | Numeric(name))
//! ```
//!
//! Labels such as `C(Dose)` or `Dose_numeric:C(NP)[T.AuNP]` are rendered
//! from the structure for display and CSV output only. Consumers (ANOVA,
//! interpretation) inspect [`Term`] and [`CodedOperand`] directly.

pub mod design;
pub mod ols;

pub use design::{Design, DesignColumn};
pub use ols::{Coefficient, FittedModel, LeastSquares};

use serde::Serialize;
use std::fmt;

/// A variable referenced by a term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Operand {
    /// Treated as a factor with treatment coding
    Categorical(String),
    /// Used as a continuous covariate
    Numeric(String),
}

impl Operand {
    /// Column name in the dataset
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical(name) | Self::Numeric(name) => name,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Categorical(name) => write!(f, "C({name})"),
            Self::Numeric(name) => f.write_str(name),
        }
    }
}

/// Kind of a model term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermKind {
    /// Constant column
    Intercept,
    /// Single-variable effect
    Main,
    /// Product of two or more variables
    Interaction,
}

/// One additive term of a formula
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Term {
    /// Constant column
    Intercept,
    /// Main effect of one variable
    Main(Operand),
    /// Joint effect of several variables
    Interaction(Vec<Operand>),
}

impl Term {
    /// Term kind
    #[must_use]
    pub const fn kind(&self) -> TermKind {
        match self {
            Self::Intercept => TermKind::Intercept,
            Self::Main(_) => TermKind::Main,
            Self::Interaction(_) => TermKind::Interaction,
        }
    }

    /// Operands in declaration order (empty for the intercept)
    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        match self {
            Self::Intercept => &[],
            Self::Main(op) => std::slice::from_ref(op),
            Self::Interaction(ops) => ops,
        }
    }

    /// True when every operand of `other` appears in `self` and the terms differ
    ///
    /// This is the marginality relation used by type-II sums of squares.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        if self == other || matches!(other, Self::Intercept) {
            return false;
        }
        other.operands().iter().all(|op| self.operands().contains(op))
            && self.operands().len() > other.operands().len()
    }

    /// Display label (`Intercept`, `C(Dose)`, `C(Dose):C(NP)`)
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Intercept => "Intercept".to_string(),
            Self::Main(op) => op.to_string(),
            Self::Interaction(ops) => ops
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(":"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Response plus ordered terms
///
/// Term order is also design-column order: intercept, numeric main effects,
/// categorical main effects, interactions. When columns are collinear the
/// earlier one is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    response: String,
    terms: Vec<Term>,
}

impl Formula {
    /// Intercept-only formula
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            terms: vec![Term::Intercept],
        }
    }

    /// Add a term (duplicates are ignored)
    #[must_use]
    pub fn with_term(mut self, term: Term) -> Self {
        if !self.terms.contains(&term) {
            self.terms.push(term);
        }
        self
    }

    /// Full factorial over categorical factors with ONE joint interaction term
    ///
    /// `y ~ C(a) + C(b) + C(c) + C(a):C(b):C(c)`. With a single factor the
    /// joint term is the main effect itself and is not repeated.
    #[must_use]
    pub fn factorial(response: impl Into<String>, factors: &[String]) -> Self {
        let mut formula = Self::new(response);
        for factor in factors {
            formula = formula.with_term(Term::Main(Operand::Categorical(factor.clone())));
        }
        if factors.len() > 1 {
            let joint = factors.iter().cloned().map(Operand::Categorical).collect();
            formula = formula.with_term(Term::Interaction(joint));
        }
        formula
    }

    /// Numeric covariate moderated by a factor: `y ~ x * C(g)`
    #[must_use]
    pub fn moderated(
        response: impl Into<String>,
        numeric: impl Into<String>,
        categorical: impl Into<String>,
    ) -> Self {
        let numeric = Operand::Numeric(numeric.into());
        let categorical = Operand::Categorical(categorical.into());
        Self::new(response)
            .with_term(Term::Main(numeric.clone()))
            .with_term(Term::Main(categorical.clone()))
            .with_term(Term::Interaction(vec![numeric, categorical]))
    }

    /// Response column name
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Terms including the intercept
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rhs: Vec<String> = self
            .terms
            .iter()
            .filter(|t| !matches!(t, Term::Intercept))
            .map(Term::label)
            .collect();
        if rhs.is_empty() {
            write!(f, "{} ~ 1", self.response)
        } else {
            write!(f, "{} ~ {}", self.response, rhs.join(" + "))
        }
    }
}

/// An operand as it appears in one design column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodedOperand {
    /// The variable
    pub operand: Operand,
    /// Level indicated by this column (categorical operands only)
    pub level: Option<String>,
}

impl fmt::Display for CodedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.level {
            Some(level) => write!(f, "{}[T.{level}]", self.operand),
            None => write!(f, "{}", self.operand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_factorial_single_factor() {
        let formula = Formula::factorial("y", &factors(&["Dose"]));
        assert_eq!(formula.to_string(), "y ~ C(Dose)");
        assert_eq!(formula.terms().len(), 2);
    }

    #[test]
    fn test_factorial_joint_interaction_only() {
        let formula = Formula::factorial("y", &factors(&["Dose", "NP", "CellLine"]));
        assert_eq!(
            formula.to_string(),
            "y ~ C(Dose) + C(NP) + C(CellLine) + C(Dose):C(NP):C(CellLine)"
        );
    }

    #[test]
    fn test_moderated_formula() {
        let formula = Formula::moderated("y", "Dose_numeric", "NP");
        assert_eq!(
            formula.to_string(),
            "y ~ Dose_numeric + C(NP) + Dose_numeric:C(NP)"
        );
    }

    #[test]
    fn test_term_containment() {
        let a = Term::Main(Operand::Categorical("a".into()));
        let b = Term::Main(Operand::Categorical("b".into()));
        let ab = Term::Interaction(vec![
            Operand::Categorical("a".into()),
            Operand::Categorical("b".into()),
        ]);
        assert!(ab.contains(&a));
        assert!(ab.contains(&b));
        assert!(!a.contains(&ab));
        assert!(!ab.contains(&ab));
        assert!(!ab.contains(&Term::Intercept));
    }

    #[test]
    fn test_coded_operand_label() {
        let coded = CodedOperand {
            operand: Operand::Categorical("NP".into()),
            level: Some("AuNP".into()),
        };
        assert_eq!(coded.to_string(), "C(NP)[T.AuNP]");
    }
}
