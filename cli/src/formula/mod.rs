//! Score formulas and exit-selection expressions.
//!
//! Formula text is parsed once into an AST and evaluated per record against
//! a flat namespace. Text is never executed as code.

pub mod expression;
pub mod namespace;
pub mod parser;

pub use expression::{evaluate, evaluate_program, Namespace, Value};
pub use namespace::{exported_flag, known_variables, record_namespace, ExitCandidates};
pub use parser::{parse_expression, parse_program, Expr, Program};

use crate::error::FormulaError;
use crate::models::ExitKind;
use std::collections::BTreeSet;

pub const DEFAULT_EXIT_EXPR: &str = "result = INC";

/// Compiled score formula. Empty text scores every record 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFormula {
    source: String,
    program: Option<Program>,
}

impl ScoreFormula {
    /// Parse and check every referenced name against `known`.
    pub fn compile(text: &str, known: &BTreeSet<String>) -> Result<Self, FormulaError> {
        if text.trim().is_empty() {
            return Ok(Self {
                source: String::new(),
                program: None,
            });
        }

        let program = parse_program(text)?;
        let mut vars = Vec::new();
        for expr in program.expressions() {
            expr.visit_variables(&mut vars);
        }
        for (name, attr) in vars {
            match attr {
                Some(attr) => {
                    return Err(FormulaError::UnknownVariable(format!("{}.{}", name, attr)))
                }
                None if !known.contains(name) => {
                    return Err(FormulaError::UnknownVariable(name.to_string()))
                }
                None => {}
            }
        }

        Ok(Self {
            source: text.to_string(),
            program: Some(program),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_none()
    }

    /// Score of one record. Unavailable results and fall-through score 0.
    pub fn score<N: Namespace + ?Sized>(&self, namespace: &N) -> Result<f64, FormulaError> {
        let Some(program) = &self.program else {
            return Ok(0.0);
        };
        let value = evaluate_program(program, namespace)?;
        Ok(value.and_then(|v| v.as_number()).unwrap_or(0.0))
    }
}

/// Compiled exit-selection expression over `INC`, `AGE` and `AGS`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSelector {
    source: String,
    program: Program,
}

impl ExitSelector {
    pub fn compile(text: &str) -> Result<Self, FormulaError> {
        let text = if text.trim().is_empty() {
            DEFAULT_EXIT_EXPR
        } else {
            text
        };
        let program = parse_program(text)?;

        for value in program.results() {
            match value {
                Expr::Variable(name) if ExitKind::from_dsl_name(name).is_some() => {}
                Expr::Number(n) if *n == 0.0 => {}
                other => {
                    return Err(FormulaError::InvalidSelection(format!(
                        "result must be INC, AGE, AGS or 0, got {:?}",
                        other
                    )))
                }
            }
        }

        let mut vars = Vec::new();
        for expr in program.expressions() {
            expr.visit_variables(&mut vars);
        }
        for (name, attr) in vars {
            let known_name = ExitKind::from_dsl_name(name).is_some();
            let known_attr = matches!(attr, None | Some("value") | Some("days"));
            if !known_name || !known_attr {
                let full = match attr {
                    Some(attr) => format!("{}.{}", name, attr),
                    None => name.to_string(),
                };
                return Err(FormulaError::UnknownVariable(full));
            }
        }

        Ok(Self {
            source: text.to_string(),
            program,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Which rule becomes the realized exit. `None` selects nothing.
    pub fn select(&self, candidates: &ExitCandidates) -> Result<Option<ExitKind>, FormulaError> {
        match evaluate_program(&self.program, candidates)? {
            Some(Value::Handle { id, .. }) => Ok(ExitKind::from_dsl_name(id)),
            _ => Ok(None),
        }
    }
}

impl Default for ExitSelector {
    fn default() -> Self {
        Self {
            source: DEFAULT_EXIT_EXPR.to_string(),
            program: Program {
                branches: Vec::new(),
                otherwise: Some(Expr::Variable("INC".to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExitCandidate;
    use std::collections::HashMap;

    fn known(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_score_formula_shape() {
        let formula = ScoreFormula::compile(
            "if valid_pos_sum > 2 and max_value / end_value >= 1.1: result = valid_pos_sum + continuous_sum else: result = 0",
            &known(&["valid_pos_sum", "max_value", "end_value", "continuous_sum"]),
        )
        .unwrap();

        let mut ns: HashMap<String, Option<f64>> = HashMap::new();
        ns.insert("valid_pos_sum".into(), Some(3.0));
        ns.insert("max_value".into(), Some(11.5));
        ns.insert("end_value".into(), Some(10.0));
        ns.insert("continuous_sum".into(), Some(-1.0));
        assert_eq!(formula.score(&ns).unwrap(), 2.0);

        ns.insert("max_value".into(), Some(10.5));
        assert_eq!(formula.score(&ns).unwrap(), 0.0);
    }

    #[test]
    fn test_score_unknown_names_rejected_at_compile() {
        let err = ScoreFormula::compile("result = nope", &known(&["a"])).unwrap_err();
        assert_eq!(err, FormulaError::UnknownVariable("nope".into()));
        assert!(ScoreFormula::compile("result = a.days", &known(&["a"])).is_err());
    }

    #[test]
    fn test_empty_formula_scores_zero() {
        let formula = ScoreFormula::compile("   ", &known(&[])).unwrap();
        assert!(formula.is_empty());
        let ns: HashMap<String, Option<f64>> = HashMap::new();
        assert_eq!(formula.score(&ns).unwrap(), 0.0);
    }

    #[test]
    fn test_unavailable_result_scores_zero() {
        let formula = ScoreFormula::compile("result = a + b", &known(&["a", "b"])).unwrap();
        let mut ns: HashMap<String, Option<f64>> = HashMap::new();
        ns.insert("a".into(), Some(1.0));
        ns.insert("b".into(), None);
        assert_eq!(formula.score(&ns).unwrap(), 0.0);
    }

    fn candidates(inc: Option<(f64, usize)>, age: Option<(f64, usize)>, ags: Option<(f64, usize)>) -> ExitCandidates {
        ExitCandidates {
            increment: inc.map(|(v, d)| ExitCandidate::new(ExitKind::Increment, v, d)),
            after_gt_end: age.map(|(v, d)| ExitCandidate::new(ExitKind::AbsoluteRatio, v, d)),
            after_gt_start: ags.map(|(v, d)| ExitCandidate::new(ExitKind::RelativeRatio, v, d)),
        }
    }

    #[test]
    fn test_default_selector_picks_increment() {
        let selector = ExitSelector::compile("").unwrap();
        assert_eq!(selector.source(), DEFAULT_EXIT_EXPR);
        let c = candidates(Some((10.5, 2)), Some((11.0, 3)), None);
        assert_eq!(selector.select(&c).unwrap(), Some(ExitKind::Increment));
        assert_eq!(ExitSelector::default().select(&c).unwrap(), Some(ExitKind::Increment));
    }

    #[test]
    fn test_selector_identity_not_value() {
        let selector = ExitSelector::compile(
            "if INC == AGE: result = AGS\nelif INC >= AGE and INC.days <= AGE.days: result = AGE\nelse: result = INC",
        )
        .unwrap();
        // equal values, different rules: identity comparison is false
        let c = candidates(Some((10.5, 1)), Some((10.5, 4)), Some((9.0, 2)));
        assert_eq!(selector.select(&c).unwrap(), Some(ExitKind::AbsoluteRatio));
    }

    #[test]
    fn test_selector_zero_selects_nothing() {
        let selector = ExitSelector::compile("if AGS > 0: result = AGS else: result = 0").unwrap();
        assert_eq!(selector.select(&candidates(None, None, None)).unwrap(), None);
        assert_eq!(
            selector.select(&candidates(None, None, Some((3.0, 1)))).unwrap(),
            Some(ExitKind::RelativeRatio)
        );
    }

    #[test]
    fn test_selector_rejects_arbitrary_results() {
        assert!(matches!(
            ExitSelector::compile("result = INC + 1"),
            Err(FormulaError::InvalidSelection(_))
        ));
        assert!(matches!(
            ExitSelector::compile("result = XYZ"),
            Err(FormulaError::InvalidSelection(_))
        ));
        assert!(matches!(
            ExitSelector::compile("if INC.price > 1: result = INC"),
            Err(FormulaError::UnknownVariable(_))
        ));
    }
}
