//! Condition evaluation
//!
//! `evaluate` is total: any condition against any value map yields a plain
//! boolean. Comparisons are typed (string with string, number with number,
//! boolean with boolean). A missing variable, a cross-type comparison, or
//! an ordering comparison on non-numbers makes the condition unsatisfied
//! rather than raising.

use serde_json::Value;
use tracing::trace;

use super::{Condition, Operand, ValueMap};

/// A resolved operand, narrowed to the comparable scalar types.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Str(String),
    Num(f64),
    Bool(bool),
}

/// Evaluate a condition against the current values. Never panics.
pub fn evaluate(condition: &Condition, values: &ValueMap) -> bool {
    match condition {
        Condition::Var(name) => matches!(values.get(name), Some(Value::Bool(true))),

        Condition::Eq(a, b) => compare_eq(a, b, values).unwrap_or(false),
        Condition::Ne(a, b) => compare_eq(a, b, values).map(|eq| !eq).unwrap_or(false),

        Condition::Gt(a, b) => compare_nums(a, b, values, |x, y| x > y),
        Condition::Gte(a, b) => compare_nums(a, b, values, |x, y| x >= y),
        Condition::Lt(a, b) => compare_nums(a, b, values, |x, y| x < y),
        Condition::Lte(a, b) => compare_nums(a, b, values, |x, y| x <= y),

        Condition::And(items) => items.iter().all(|c| evaluate(c, values)),
        Condition::Or(items) => items.iter().any(|c| evaluate(c, values)),
        Condition::Not(inner) => !evaluate(inner, values),
    }
}

/// Typed equality. `None` means the comparison is undecidable (missing
/// variable or mismatched types) and the caller fails closed.
fn compare_eq(a: &Operand, b: &Operand, values: &ValueMap) -> Option<bool> {
    let lhs = resolve(a, values)?;
    let rhs = resolve(b, values)?;
    match (&lhs, &rhs) {
        (Scalar::Str(x), Scalar::Str(y)) => Some(x == y),
        (Scalar::Num(x), Scalar::Num(y)) => Some(x == y),
        (Scalar::Bool(x), Scalar::Bool(y)) => Some(x == y),
        _ => {
            trace!(?lhs, ?rhs, "cross-type comparison, failing closed");
            None
        }
    }
}

fn compare_nums(
    a: &Operand,
    b: &Operand,
    values: &ValueMap,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    match (resolve(a, values), resolve(b, values)) {
        (Some(Scalar::Num(x)), Some(Scalar::Num(y))) => op(x, y),
        _ => false,
    }
}

fn resolve(operand: &Operand, values: &ValueMap) -> Option<Scalar> {
    match operand {
        Operand::Var(name) => scalar_of(values.get(name)?),
        Operand::Str(s) => Some(Scalar::Str(s.clone())),
        Operand::Num(n) => Some(Scalar::Num(*n)),
        Operand::Bool(b) => Some(Scalar::Bool(*b)),
        Operand::Null => None,
    }
}

fn scalar_of(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Str(s.clone())),
        Value::Number(n) => n.as_f64().map(Scalar::Num),
        Value::Bool(b) => Some(Scalar::Bool(*b)),
        // Null, arrays, and objects are not comparable operands.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn parse(wire: Value) -> Condition {
        serde_json::from_value(wire).unwrap()
    }

    #[test]
    fn test_string_equality() {
        let cond = parse(json!({"===": [{"var": "loanTypeName"}, "debt-service-coverage-ratio"]}));

        let dscr = values(&[("loanTypeName", json!("debt-service-coverage-ratio"))]);
        assert!(evaluate(&cond, &dscr));

        let rtl = values(&[("loanTypeName", json!("residential-transition-loan"))]);
        assert!(!evaluate(&cond, &rtl));
    }

    #[test]
    fn test_missing_variable_fails_closed() {
        let eq = parse(json!({"===": [{"var": "absent"}, "x"]}));
        let ne = parse(json!({"!==": [{"var": "absent"}, "x"]}));
        let empty = ValueMap::new();

        // Both polarities are unsatisfied when the variable is missing.
        assert!(!evaluate(&eq, &empty));
        assert!(!evaluate(&ne, &empty));
    }

    #[test]
    fn test_cross_type_comparison_fails_closed() {
        let cond = parse(json!({"===": [{"var": "amount"}, 50000]}));
        let ctx = values(&[("amount", json!("50000"))]);
        // "50000" (string) never equals 50000 (number). No coercion.
        assert!(!evaluate(&cond, &ctx));
    }

    #[test]
    fn test_numeric_ordering() {
        let cond = parse(json!({">=": [{"var": "loanAmount"}, 50000]}));
        assert!(evaluate(&cond, &values(&[("loanAmount", json!(60000))])));
        assert!(evaluate(&cond, &values(&[("loanAmount", json!(50000))])));
        assert!(!evaluate(&cond, &values(&[("loanAmount", json!(49999.5))])));
        // Ordering over strings is undefined and fails closed.
        assert!(!evaluate(&cond, &values(&[("loanAmount", json!("60000"))])));
    }

    #[test]
    fn test_inequality() {
        let cond = parse(json!({"!==": [{"var": "state"}, "NY"]}));
        assert!(evaluate(&cond, &values(&[("state", json!("TX"))])));
        assert!(!evaluate(&cond, &values(&[("state", json!("NY"))])));
    }

    #[test]
    fn test_and_short_circuit_semantics() {
        let cond = parse(json!({"and": [
            {"===": [{"var": "a"}, 1]},
            {"===": [{"var": "b"}, 2]}
        ]}));
        assert!(evaluate(&cond, &values(&[("a", json!(1)), ("b", json!(2))])));
        assert!(!evaluate(&cond, &values(&[("a", json!(1)), ("b", json!(3))])));
        assert!(!evaluate(&cond, &values(&[("a", json!(1))])));
    }

    #[test]
    fn test_or() {
        let cond = parse(json!({"or": [
            {"===": [{"var": "a"}, 1]},
            {"===": [{"var": "b"}, 2]}
        ]}));
        assert!(evaluate(&cond, &values(&[("b", json!(2))])));
        assert!(!evaluate(&cond, &values(&[("b", json!(9))])));
    }

    #[test]
    fn test_empty_combinators() {
        assert!(evaluate(&Condition::And(vec![]), &ValueMap::new()));
        assert!(!evaluate(&Condition::Or(vec![]), &ValueMap::new()));
    }

    #[test]
    fn test_not() {
        let cond = parse(json!({"!": [{"var": "isRetired"}]}));
        assert!(evaluate(&cond, &values(&[("isRetired", json!(false))])));
        assert!(evaluate(&cond, &ValueMap::new()));
        assert!(!evaluate(&cond, &values(&[("isRetired", json!(true))])));
    }

    #[test]
    fn test_bare_var_requires_boolean_true() {
        let cond = parse(json!({"var": "hasCoBorrower"}));
        assert!(evaluate(&cond, &values(&[("hasCoBorrower", json!(true))])));
        assert!(!evaluate(&cond, &values(&[("hasCoBorrower", json!(false))])));
        // No truthy coercion: non-empty strings and non-zero numbers do not pass.
        assert!(!evaluate(&cond, &values(&[("hasCoBorrower", json!("yes"))])));
        assert!(!evaluate(&cond, &values(&[("hasCoBorrower", json!(1))])));
        assert!(!evaluate(&cond, &ValueMap::new()));
    }

    #[test]
    fn test_null_and_container_values_fail_closed() {
        let cond = parse(json!({"===": [{"var": "x"}, "a"]}));
        assert!(!evaluate(&cond, &values(&[("x", json!(null))])));
        assert!(!evaluate(&cond, &values(&[("x", json!(["a"]))])));
        assert!(!evaluate(&cond, &values(&[("x", json!({"v": "a"}))])));
    }

    #[test]
    fn test_literal_only_comparison() {
        let cond = parse(json!({"<": [3, 5]}));
        assert!(evaluate(&cond, &ValueMap::new()));
    }

    #[test]
    fn test_deeply_nested_terminates() {
        let mut wire = json!({"var": "leaf"});
        for _ in 0..200 {
            wire = json!({"!": [wire]});
        }
        let cond = parse(wire);
        // 200 negations of a missing var: just exercise termination.
        let _ = evaluate(&cond, &ValueMap::new());
    }
}
