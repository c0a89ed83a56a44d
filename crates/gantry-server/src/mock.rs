//! Mock-response substitution.
//!
//! Resolution mirrors the encryption tiers without a whitelist: a
//! per-service setting wins, then the service's group, then the global
//! default. When enabled, the user handler is skipped and an instance of
//! the output type is generated from its serialized default shape, with
//! field-name heuristics supplying plausible string values.

use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single on/off tier.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct MockTier {
    /// Whether mock substitution applies at this tier.
    pub enabled: bool,
}

/// The `mock` configuration block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Lowest-priority tier.
    pub global: MockTier,
    /// Per-group overrides.
    pub groups: HashMap<String, MockTier>,
    /// Per-service overrides (highest priority).
    pub services: HashMap<String, MockTier>,
}

impl MockConfig {
    /// Resolve whether mock substitution applies to a service.
    pub fn enabled_for(&self, service: &str, group: &str) -> bool {
        if let Some(tier) = self.services.get(service) {
            return tier.enabled;
        }
        if !group.is_empty() {
            if let Some(tier) = self.groups.get(group) {
                return tier.enabled;
            }
        }
        self.global.enabled
    }
}

/// Generate a mock instance from the output type's default shape.
///
/// Scalars are re-populated (strings by field-name heuristics, numbers
/// and booleans randomly); containers keep their structure. Containers
/// that are empty in the default shape stay empty, since the element
/// shape is unknown.
pub fn generate(shape: &Value) -> Value {
    let mut rng = rand::thread_rng();
    generate_value(shape, "", &mut rng)
}

fn generate_value(shape: &Value, field: &str, rng: &mut impl Rng) -> Value {
    match shape {
        Value::Null => Value::Null,
        Value::Bool(_) => Value::Bool(rng.gen_bool(0.5)),
        Value::Number(n) => {
            if n.is_f64() {
                Value::from((rng.gen::<f64>() * 1000.0 * 100.0).round() / 100.0)
            } else {
                Value::from(rng.gen_range(1..=1000i64))
            }
        }
        Value::String(_) => Value::String(string_for_field(field, rng)),
        Value::Array(items) => {
            // Repeat the first element's shape one to three times.
            match items.first() {
                Some(first) => {
                    let count = rng.gen_range(1..=3);
                    Value::Array(
                        (0..count)
                            .map(|_| generate_value(first, field, rng))
                            .collect(),
                    )
                }
                None => Value::Array(Vec::new()),
            }
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), generate_value(value, key, rng));
            }
            Value::Object(out)
        }
    }
}

fn string_for_field(field: &str, rng: &mut impl Rng) -> String {
    let field = field.to_ascii_lowercase();

    const NAMES: &[&str] = &["Alice", "Bob", "Charlie", "David", "Eve", "Frank"];
    const STATUSES: &[&str] = &["active", "inactive", "pending", "completed", "processing"];
    const MAIL_USERS: &[&str] = &["user", "test", "demo", "sample"];
    const MAIL_DOMAINS: &[&str] = &["example.com", "test.org", "mock.net"];
    const MESSAGES: &[&str] = &[
        "mock message body",
        "sample content",
        "generated for preview",
        "placeholder text",
    ];
    const WORDS: &[&str] = &["mock", "test", "sample", "example", "demo"];

    let pick = |pool: &[&str], rng: &mut dyn rand::RngCore| -> String {
        pool[rng.gen_range(0..pool.len())].to_string()
    };

    if field.contains("id") || field.contains("uid") {
        format!("mock_id_{}", rng.gen_range(0..100_000))
    } else if field.contains("name") {
        pick(NAMES, rng)
    } else if field.contains("email") {
        format!(
            "{}{}@{}",
            pick(MAIL_USERS, rng),
            rng.gen_range(0..1000),
            pick(MAIL_DOMAINS, rng),
        )
    } else if field.contains("phone") {
        format!("138{:08}", rng.gen_range(0..100_000_000u64))
    } else if field.contains("url") || field.contains("link") {
        format!("https://example.com/mock/{}", rng.gen_range(0..10_000))
    } else if field.contains("token") {
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let suffix: String = (0..16)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        format!("mock_token_{suffix}")
    } else if field.contains("message") || field.contains("msg") {
        pick(MESSAGES, rng)
    } else if field.contains("status") {
        pick(STATUSES, rng)
    } else {
        format!("{}_value_{}", pick(WORDS, rng), rng.gen_range(0..10_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tier_resolution_order() {
        let mut config = MockConfig::default();
        config.global.enabled = true;
        config
            .groups
            .insert("user".to_string(), MockTier { enabled: false });
        config
            .services
            .insert("get_user".to_string(), MockTier { enabled: true });

        // Service tier wins over its disabled group.
        assert!(config.enabled_for("get_user", "user"));
        // Group tier wins over the enabled global.
        assert!(!config.enabled_for("list_users", "user"));
        // Global applies when nothing more specific matches.
        assert!(config.enabled_for("other", "misc"));
        assert!(config.enabled_for("other", ""));
    }

    #[test]
    fn generated_value_matches_the_shape() {
        let shape = json!({
            "id": "",
            "user_name": "",
            "email": "",
            "age": 0,
            "score": 0.0,
            "active": false,
            "nested": {"status": "", "count": 0},
            "tags": [],
        });
        let mock = generate(&shape);

        assert!(mock["id"].as_str().unwrap().starts_with("mock_id_"));
        assert!(mock["email"].as_str().unwrap().contains('@'));
        assert!(mock["age"].is_i64());
        assert!(mock["active"].is_boolean());
        assert!(mock["nested"]["count"].is_i64());
        // Empty containers in the default shape stay empty.
        assert_eq!(mock["tags"], json!([]));
    }

    #[test]
    fn name_heuristic_draws_from_the_pool() {
        let mock = generate(&json!({"name": ""}));
        let name = mock["name"].as_str().unwrap();
        assert!(["Alice", "Bob", "Charlie", "David", "Eve", "Frank"].contains(&name));
    }

    #[test]
    fn arrays_with_a_seed_element_are_populated() {
        let mock = generate(&json!({"items": [{"id": "", "n": 0}]}));
        let items = mock["items"].as_array().unwrap();
        assert!((1..=3).contains(&items.len()));
        assert!(items[0]["id"].as_str().unwrap().starts_with("mock_id_"));
    }

    #[test]
    fn null_shape_stays_null() {
        assert_eq!(generate(&json!({"extra": null}))["extra"], Value::Null);
    }
}
