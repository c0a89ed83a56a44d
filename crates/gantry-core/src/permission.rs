//! Permission rule types attached to service descriptors.
//!
//! Evaluation against the principal attribute map lives in `gantry-auth`;
//! this module only defines the configuration shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a rule set combines its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionLogic {
    /// Every rule must pass.
    #[default]
    And,
    /// At least one rule must pass.
    Or,
}

/// Rule operators over a principal attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOperator {
    /// Equality after best-effort numeric/string coercion.
    Eq,
    /// Negated equality.
    Ne,
    /// Numeric greater-than.
    Gt,
    /// Numeric greater-or-equal.
    Gte,
    /// Numeric less-than.
    Lt,
    /// Numeric less-or-equal.
    Lte,
    /// Membership in a sequence value.
    In,
    /// Negated membership.
    NotIn,
    /// Substring on string forms.
    Contains,
    /// Value at the path is non-null.
    Exists,
    /// Any unrecognised operator; always evaluates to false.
    #[serde(other)]
    Unknown,
}

/// A single rule: dot-separated field path, operator and expected value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Dot-separated path into the principal attribute map, e.g. `user.role`.
    pub field: String,
    /// Comparison operator.
    pub operator: PermissionOperator,
    /// Expected value; interpretation depends on the operator.
    #[serde(default)]
    pub value: Value,
}

impl PermissionRule {
    /// Convenience constructor.
    pub fn new(
        field: impl Into<String>,
        operator: PermissionOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A conjunction or disjunction over permission rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Combination logic; `AND` when omitted.
    #[serde(default)]
    pub logic: PermissionLogic,
    /// The rule set; empty means allow.
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

impl PermissionConfig {
    /// All-rules-must-pass rule set.
    pub fn all(rules: Vec<PermissionRule>) -> Self {
        Self {
            logic: PermissionLogic::And,
            rules,
        }
    }

    /// Any-rule-may-pass rule set.
    pub fn any(rules: Vec<PermissionRule>) -> Self {
        Self {
            logic: PermissionLogic::Or,
            rules,
        }
    }
}
