//! Permission evaluation over principal attribute maps.
//!
//! The principal is the JSON blob the embedding application stored for
//! the bearer token. Rules address it with dot-separated paths; every
//! intermediate segment must resolve to a nested object, otherwise the
//! value reads as null.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use gantry_core::permission::{PermissionConfig, PermissionLogic, PermissionOperator, PermissionRule};
use gantry_store::TokenStore;

/// Evaluate a rule set against a principal attribute map.
///
/// A missing or empty rule set allows.
pub fn evaluate(principal: &Value, config: &PermissionConfig) -> bool {
    if config.rules.is_empty() {
        return true;
    }
    match config.logic {
        PermissionLogic::Or => config.rules.iter().any(|rule| evaluate_rule(principal, rule)),
        PermissionLogic::And => config.rules.iter().all(|rule| evaluate_rule(principal, rule)),
    }
}

/// Fetch the principal for `token` from the store and evaluate.
///
/// Retrieval or parse failures deny: a principal we cannot read grants
/// nothing.
pub async fn check_service_permission(
    store: &Arc<dyn TokenStore>,
    key_prefix: &str,
    token: &str,
    config: &PermissionConfig,
) -> bool {
    if config.rules.is_empty() {
        return true;
    }

    let blob = match store.get(&format!("{key_prefix}{token}")).await {
        Ok(blob) => blob,
        Err(e) => {
            debug!(error = %e, "failed to fetch principal for permission check");
            return false;
        }
    };

    let principal: Value = match serde_json::from_slice(&blob) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "failed to parse principal for permission check");
            return false;
        }
    };

    evaluate(&principal, config)
}

fn evaluate_rule(principal: &Value, rule: &PermissionRule) -> bool {
    let field = nested_value(principal, &rule.field);

    match rule.operator {
        PermissionOperator::Eq => compare(field, &rule.value, Cmp::Eq),
        PermissionOperator::Ne => compare(field, &rule.value, Cmp::Ne),
        PermissionOperator::Gt => compare_numbers(field, &rule.value, |a, b| a > b),
        PermissionOperator::Gte => compare_numbers(field, &rule.value, |a, b| a >= b),
        PermissionOperator::Lt => compare_numbers(field, &rule.value, |a, b| a < b),
        PermissionOperator::Lte => compare_numbers(field, &rule.value, |a, b| a <= b),
        PermissionOperator::In => in_sequence(field, &rule.value),
        PermissionOperator::NotIn => !in_sequence(field, &rule.value),
        PermissionOperator::Contains => contains(field, &rule.value),
        PermissionOperator::Exists => field.is_some(),
        PermissionOperator::Unknown => {
            warn!(field = %rule.field, "unknown permission operator");
            false
        }
    }
}

/// Walk a dot-separated path; non-object intermediates and missing keys
/// read as `None`. An explicit JSON null also reads as `None`.
fn nested_value<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

enum Cmp {
    Eq,
    Ne,
}

fn compare(field: Option<&Value>, expected: &Value, cmp: Cmp) -> bool {
    let expected = if expected.is_null() { None } else { Some(expected) };
    match (field, expected) {
        (None, None) => matches!(cmp, Cmp::Eq),
        (None, Some(_)) | (Some(_), None) => matches!(cmp, Cmp::Ne),
        (Some(a), Some(b)) => match cmp {
            Cmp::Eq => values_equal(a, b),
            Cmp::Ne => !values_equal(a, b),
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if string_form(a) == string_form(b) {
        return true;
    }
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn compare_numbers(field: Option<&Value>, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (field.and_then(as_f64), as_f64(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn in_sequence(field: Option<&Value>, expected: &Value) -> bool {
    let Some(items) = expected.as_array() else {
        return false;
    };
    let Some(field) = field else {
        return false;
    };
    items.iter().any(|item| values_equal(field, item))
}

fn contains(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        Some(field) => string_form(field).contains(&string_form(expected)),
        None => false,
    }
}

/// Best-effort numeric view: JSON numbers and numeric strings.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// String form used for loose equality and substring checks; strings are
/// unquoted, everything else renders as JSON text.
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_store::{MemoryStore, MemoryStoreConfig, StoreError, TokenStore as _};
    use serde_json::json;

    fn rule(field: &str, operator: PermissionOperator, value: Value) -> PermissionRule {
        PermissionRule {
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn principal() -> Value {
        json!({
            "user": {
                "role": "admin",
                "vip_level": 3,
                "tags": "alpha,beta",
                "email": "alice@example.com"
            },
            "session": {"issued_at": 1700000000}
        })
    }

    #[test]
    fn empty_rule_set_allows() {
        assert!(evaluate(&principal(), &PermissionConfig::default()));
    }

    #[test]
    fn and_requires_every_rule() {
        let allow = PermissionConfig::all(vec![
            rule("user.role", PermissionOperator::Eq, json!("admin")),
            rule("user.vip_level", PermissionOperator::Gte, json!(3)),
        ]);
        assert!(evaluate(&principal(), &allow));

        let deny = PermissionConfig::all(vec![
            rule("user.role", PermissionOperator::Eq, json!("admin")),
            rule("user.vip_level", PermissionOperator::Gt, json!(3)),
        ]);
        assert!(!evaluate(&principal(), &deny));
    }

    #[test]
    fn or_requires_any_rule() {
        let allow = PermissionConfig::any(vec![
            rule("user.role", PermissionOperator::Eq, json!("manager")),
            rule("user.vip_level", PermissionOperator::Gte, json!(1)),
        ]);
        assert!(evaluate(&principal(), &allow));

        let deny = PermissionConfig::any(vec![
            rule("user.role", PermissionOperator::Eq, json!("manager")),
            rule("user.vip_level", PermissionOperator::Gt, json!(10)),
        ]);
        assert!(!evaluate(&principal(), &deny));
    }

    #[test]
    fn numeric_coercion_spans_string_and_number() {
        let p = json!({"user": {"vip_level": "3"}});
        let cfg = PermissionConfig::all(vec![rule(
            "user.vip_level",
            PermissionOperator::Eq,
            json!(3),
        )]);
        assert!(evaluate(&p, &cfg));

        let cfg = PermissionConfig::all(vec![rule(
            "user.vip_level",
            PermissionOperator::Gte,
            json!("2"),
        )]);
        assert!(evaluate(&p, &cfg));
    }

    #[test]
    fn ordering_is_false_on_non_numeric_sides() {
        let cfg = PermissionConfig::all(vec![rule(
            "user.role",
            PermissionOperator::Gt,
            json!(1),
        )]);
        assert!(!evaluate(&principal(), &cfg));
    }

    #[test]
    fn in_and_not_in() {
        let cfg = PermissionConfig::all(vec![rule(
            "user.role",
            PermissionOperator::In,
            json!(["admin", "manager"]),
        )]);
        assert!(evaluate(&principal(), &cfg));

        let cfg = PermissionConfig::all(vec![rule(
            "user.role",
            PermissionOperator::NotIn,
            json!(["manager", "auditor"]),
        )]);
        assert!(evaluate(&principal(), &cfg));

        // A non-sequence value never matches `in`.
        let cfg = PermissionConfig::all(vec![rule(
            "user.role",
            PermissionOperator::In,
            json!("admin"),
        )]);
        assert!(!evaluate(&principal(), &cfg));
    }

    #[test]
    fn contains_is_substring_on_string_forms() {
        let cfg = PermissionConfig::all(vec![rule(
            "user.tags",
            PermissionOperator::Contains,
            json!("beta"),
        )]);
        assert!(evaluate(&principal(), &cfg));

        let cfg = PermissionConfig::all(vec![rule(
            "session.issued_at",
            PermissionOperator::Contains,
            json!(17),
        )]);
        assert!(evaluate(&principal(), &cfg));
    }

    #[test]
    fn exists_checks_non_null() {
        let cfg = PermissionConfig::all(vec![rule("user.email", PermissionOperator::Exists, Value::Null)]);
        assert!(evaluate(&principal(), &cfg));

        let cfg = PermissionConfig::all(vec![rule("user.phone", PermissionOperator::Exists, Value::Null)]);
        assert!(!evaluate(&principal(), &cfg));
    }

    #[test]
    fn path_through_non_object_reads_as_null() {
        let cfg = PermissionConfig::all(vec![rule(
            "user.role.inner",
            PermissionOperator::Exists,
            Value::Null,
        )]);
        assert!(!evaluate(&principal(), &cfg));
    }

    #[test]
    fn unknown_operator_is_false() {
        let cfg = PermissionConfig::all(vec![rule("user.role", PermissionOperator::Unknown, json!(1))]);
        assert!(!evaluate(&principal(), &cfg));
    }

    #[tokio::test]
    async fn store_backed_check_denies_on_missing_principal() {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
        let cfg = PermissionConfig::all(vec![rule(
            "user.role",
            PermissionOperator::Eq,
            json!("admin"),
        )]);

        assert!(!check_service_permission(&store, "tok:", "absent", &cfg).await);

        store.put("tok:garbled", b"not-json", None).await.unwrap();
        assert!(!check_service_permission(&store, "tok:", "garbled", &cfg).await);

        store
            .put("tok:good", principal().to_string().as_bytes(), None)
            .await
            .unwrap();
        assert!(check_service_permission(&store, "tok:", "good", &cfg).await);
        assert!(matches!(store.get("tok:missing").await, Err(StoreError::NotFound)));
    }
}
