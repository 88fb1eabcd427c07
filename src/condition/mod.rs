//! Condition expression language
//!
//! Steps and fields are gated by small boolean expressions evaluated against
//! the form's current values. The wire format is an operator-keyed JSON
//! object: `{"===": [{"var": "loanTypeName"}, "debt-service-coverage-ratio"]}`,
//! with `and`/`or` taking lists of nested conditions.
//!
//! The expression tree is a closed union: unknown operators are rejected when
//! the config is deserialized, never silently accepted at evaluation time.
//! Evaluation itself is total and fail-closed: a missing variable or a
//! cross-type comparison makes the condition unsatisfied rather than raising.

use std::collections::HashMap;
use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

mod eval;

pub use eval::evaluate;

/// Flat map of current form values, keyed by field name.
pub type ValueMap = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// Condition AST
// ---------------------------------------------------------------------------

/// A boolean expression over the flat value map.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare variable reference, satisfied only when the value is `true`.
    Var(String),

    /// Typed equality / inequality.
    Eq(Operand, Operand),
    Ne(Operand, Operand),

    /// Numeric ordering comparisons.
    Gt(Operand, Operand),
    Gte(Operand, Operand),
    Lt(Operand, Operand),
    Lte(Operand, Operand),

    /// Combinators. `And([])` is true, `Or([])` is false.
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

/// One side of a comparison: a literal or a variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Condition {
    /// Build a condition from its JSON wire form.
    ///
    /// Unknown operator keys are a hard error; the loader surfaces them as
    /// a `ConfigError` so a typo in a config never silently hides a step.
    pub fn from_json(value: &Value) -> Result<Self, ConditionParseError> {
        let obj = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConditionParseError::NotAnObject {
                    found: type_name(other).to_string(),
                })
            }
        };
        if obj.len() != 1 {
            return Err(ConditionParseError::MultipleOperators { count: obj.len() });
        }
        let (op, args) = obj.iter().next().expect("len checked above");
        match op.as_str() {
            "var" => match args {
                Value::String(name) => Ok(Condition::Var(name.clone())),
                other => Err(ConditionParseError::BadVarReference {
                    found: type_name(other).to_string(),
                }),
            },
            "===" => binary(op, args).map(|(a, b)| Condition::Eq(a, b)),
            "!==" => binary(op, args).map(|(a, b)| Condition::Ne(a, b)),
            ">" => binary(op, args).map(|(a, b)| Condition::Gt(a, b)),
            ">=" => binary(op, args).map(|(a, b)| Condition::Gte(a, b)),
            "<" => binary(op, args).map(|(a, b)| Condition::Lt(a, b)),
            "<=" => binary(op, args).map(|(a, b)| Condition::Lte(a, b)),
            "and" => combinator(op, args).map(Condition::And),
            "or" => combinator(op, args).map(Condition::Or),
            "!" => {
                // Accept both `{"!": cond}` and `{"!": [cond]}`.
                let inner = match args {
                    Value::Array(items) if items.len() == 1 => &items[0],
                    Value::Array(items) => {
                        return Err(ConditionParseError::BadOperandCount {
                            operator: op.clone(),
                            expected: 1,
                            found: items.len(),
                        })
                    }
                    other => other,
                };
                Ok(Condition::Not(Box::new(Condition::from_json(inner)?)))
            }
            unknown => Err(ConditionParseError::UnknownOperator {
                operator: unknown.to_string(),
            }),
        }
    }

    /// Serialize back to the JSON wire form.
    pub fn to_json(&self) -> Value {
        match self {
            Condition::Var(name) => json!({ "var": name }),
            Condition::Eq(a, b) => json!({ "===": [a.to_json(), b.to_json()] }),
            Condition::Ne(a, b) => json!({ "!==": [a.to_json(), b.to_json()] }),
            Condition::Gt(a, b) => json!({ ">": [a.to_json(), b.to_json()] }),
            Condition::Gte(a, b) => json!({ ">=": [a.to_json(), b.to_json()] }),
            Condition::Lt(a, b) => json!({ "<": [a.to_json(), b.to_json()] }),
            Condition::Lte(a, b) => json!({ "<=": [a.to_json(), b.to_json()] }),
            Condition::And(items) => {
                json!({ "and": items.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Or(items) => {
                json!({ "or": items.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Not(inner) => json!({ "!": [inner.to_json()] }),
        }
    }
}

impl Operand {
    fn from_json(value: &Value) -> Result<Self, ConditionParseError> {
        match value {
            Value::Object(map) if map.len() == 1 => match map.get("var") {
                Some(Value::String(name)) => Ok(Operand::Var(name.clone())),
                Some(other) => Err(ConditionParseError::BadVarReference {
                    found: type_name(other).to_string(),
                }),
                None => Err(ConditionParseError::BadOperand {
                    found: "object".to_string(),
                }),
            },
            Value::String(s) => Ok(Operand::Str(s.clone())),
            Value::Number(n) => Ok(Operand::Num(n.as_f64().unwrap_or(f64::NAN))),
            Value::Bool(b) => Ok(Operand::Bool(*b)),
            Value::Null => Ok(Operand::Null),
            other => Err(ConditionParseError::BadOperand {
                found: type_name(other).to_string(),
            }),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Operand::Var(name) => json!({ "var": name }),
            Operand::Str(s) => json!(s),
            Operand::Num(n) => json!(n),
            Operand::Bool(b) => json!(b),
            Operand::Null => Value::Null,
        }
    }
}

fn binary(op: &str, args: &Value) -> Result<(Operand, Operand), ConditionParseError> {
    match args {
        Value::Array(items) if items.len() == 2 => {
            Ok((Operand::from_json(&items[0])?, Operand::from_json(&items[1])?))
        }
        Value::Array(items) => Err(ConditionParseError::BadOperandCount {
            operator: op.to_string(),
            expected: 2,
            found: items.len(),
        }),
        other => Err(ConditionParseError::BadOperand {
            found: type_name(other).to_string(),
        }),
    }
}

fn combinator(op: &str, args: &Value) -> Result<Vec<Condition>, ConditionParseError> {
    match args {
        Value::Array(items) => items.iter().map(Condition::from_json).collect(),
        other => Err(ConditionParseError::BadOperand {
            found: format!("{} for '{}'", type_name(other), op),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Why a condition could not be built from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionParseError {
    #[error("Unknown condition operator '{operator}'")]
    UnknownOperator { operator: String },

    #[error("Condition must be an object, found {found}")]
    NotAnObject { found: String },

    #[error("Condition object must have exactly one operator key, found {count}")]
    MultipleOperators { count: usize },

    #[error("Operator '{operator}' expects {expected} operand(s), found {found}")]
    BadOperandCount {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid operand: {found}")]
    BadOperand { found: String },

    #[error("'var' reference must be a string, found {found}")]
    BadVarReference { found: String },
}

// ---------------------------------------------------------------------------
// Serde wiring
// ---------------------------------------------------------------------------

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Condition::from_json(&value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
