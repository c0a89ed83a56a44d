//! Typed input assembly.
//!
//! A service input is populated from the JSON body first, then from
//! URL-scoped sources (query, then form, then headers with lowercased
//! names) for keys the body did not provide. Because URL-scoped values
//! arrive as strings, deserialization goes through a coercing adapter that
//! parses string scalars into the numeric and boolean fields the target
//! type demands.

use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{DeserializeOwned, IntoDeserializer, Visitor};
use serde::Deserializer;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::envelope::Reply;

/// Where a hinted field is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// A named URL query parameter.
    Query(String),
    /// A named form field.
    Form(String),
    /// A named header (matched case-insensitively).
    Header(String),
}

/// Raw request material the input assembler works from.
#[derive(Debug, Clone, Default)]
pub struct RequestSources {
    /// Request body bytes, already decrypted when the envelope applied.
    pub body: Vec<u8>,
    /// URL query pairs in order of appearance.
    pub query: Vec<(String, String)>,
    /// Urlencoded form pairs, when the body carried a form.
    pub form: Vec<(String, String)>,
    /// Header pairs with lowercased names.
    pub headers: Vec<(String, String)>,
}

impl RequestSources {
    fn lookup(&self, pairs: &[(String, String)], name: &str) -> Option<String> {
        pairs
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.clone())
    }

    /// Resolve a hinted field.
    pub fn hinted(&self, hint: &ParamSource) -> Option<String> {
        match hint {
            ParamSource::Query(name) => self.lookup(&self.query, name),
            ParamSource::Form(name) => self.lookup(&self.form, name),
            ParamSource::Header(name) => self.lookup(&self.headers, &name.to_lowercase()),
        }
    }
}

/// Assemble and validate a typed input from the request sources.
///
/// The merge starts from the serialized shape of `I::default()`, so body
/// fields the client omits keep their zero values. Returns a 400 [`Reply`]
/// on parse or validation failure, mirroring the pipeline's failure policy
/// for phase 6.
pub fn assemble_input<I>(
    sources: &RequestSources,
    hints: &HashMap<String, ParamSource>,
) -> Result<I, Reply>
where
    I: DeserializeOwned + serde::Serialize + Default + garde::Validate,
    I::Context: Default,
{
    let merged = merge_sources::<I>(sources, hints)
        .map_err(|e| Reply::new(400, "Parameter parsing error").with_detail(e))?;

    let input: I = I::deserialize(Lenient(merged))
        .map_err(|e| Reply::new(400, "Parameter parsing error").with_detail(e.to_string()))?;

    input
        .validate()
        .map_err(|report| Reply::new(400, "Parameter validation error").with_detail(report.to_string()))?;

    Ok(input)
}

/// Merge body JSON with URL-scoped sources over the default shape.
fn merge_sources<I>(
    sources: &RequestSources,
    hints: &HashMap<String, ParamSource>,
) -> Result<Value, String>
where
    I: serde::Serialize + Default,
{
    let mut root = match serde_json::to_value(I::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    // Body values override defaults and are never overridden themselves.
    let mut provided: Vec<String> = Vec::new();
    if !sources.body.is_empty() {
        match serde_json::from_slice::<Value>(&sources.body) {
            Ok(Value::Object(map)) => {
                for (key, value) in map {
                    provided.push(key.clone());
                    root.insert(key, value);
                }
            }
            Ok(other) => return Err(format!("expected a JSON object body, got {}", kind_of(&other))),
            Err(e) => return Err(format!("failed to parse JSON body: {e}")),
        }
    }

    // Hinted fields win over the default source order, but never over the body.
    for (field, hint) in hints {
        if !provided.iter().any(|k| k == field) {
            if let Some(value) = sources.hinted(hint) {
                provided.push(field.clone());
                root.insert(field.clone(), Value::String(value));
            }
        }
    }

    // Default resolution order for everything else: query, form, header.
    for pairs in [&sources.query, &sources.form, &sources.headers] {
        for (key, value) in pairs {
            if !value.is_empty() && !provided.iter().any(|k| k == key) && !hints.contains_key(key) {
                provided.push(key.clone());
                root.insert(key.clone(), Value::String(value.clone()));
            }
        }
    }

    Ok(Value::Object(root))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// JSON deserializer that additionally parses string scalars into the
/// numeric and boolean values the target type asks for.
pub struct Lenient(pub Value);

impl<'de> IntoDeserializer<'de, serde_json::Error> for Lenient {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! lenient_number {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            if let Value::String(s) = &self.0 {
                if let Ok(parsed) = s.trim().parse::<$ty>() {
                    return visitor.$visit(parsed);
                }
            }
            self.0.$method(visitor)
        }
    };
}

impl<'de> Deserializer<'de> for Lenient {
    type Error = serde_json::Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.0.deserialize_any(visitor)
    }

    lenient_number!(deserialize_i8, visit_i8, i8);
    lenient_number!(deserialize_i16, visit_i16, i16);
    lenient_number!(deserialize_i32, visit_i32, i32);
    lenient_number!(deserialize_i64, visit_i64, i64);
    lenient_number!(deserialize_u8, visit_u8, u8);
    lenient_number!(deserialize_u16, visit_u16, u16);
    lenient_number!(deserialize_u32, visit_u32, u32);
    lenient_number!(deserialize_u64, visit_u64, u64);
    lenient_number!(deserialize_f32, visit_f32, f32);
    lenient_number!(deserialize_f64, visit_f64, f64);

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if let Value::String(s) = &self.0 {
            match s.trim() {
                "true" | "1" => return visitor.visit_bool(true),
                "false" | "0" => return visitor.visit_bool(false),
                _ => {}
            }
        }
        self.0.deserialize_bool(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(Lenient(other)),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Array(items) => {
                visitor.visit_seq(SeqDeserializer::new(items.into_iter().map(Lenient)))
            }
            other => other.deserialize_seq(visitor),
        }
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Object(map) => {
                visitor.visit_map(MapDeserializer::new(map.into_iter().map(|(k, v)| (k, Lenient(v)))))
            }
            other => other.deserialize_map(visitor),
        }
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.0.deserialize_enum(name, variants, visitor)
    }

    serde::forward_to_deserialize_any! {
        i128 u128 char str string bytes byte_buf unit unit_struct
        tuple tuple_struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Validate, Default, PartialEq)]
    struct Probe {
        #[garde(length(min = 1))]
        id: String,
        #[garde(skip)]
        #[serde(default)]
        page: u32,
        #[garde(skip)]
        #[serde(default)]
        verbose: bool,
        #[garde(skip)]
        #[serde(default)]
        trace: Option<String>,
    }

    fn sources(body: &str) -> RequestSources {
        RequestSources {
            body: body.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn body_json_populates_fields() {
        let input: Probe =
            assemble_input(&sources(r#"{"id":"1","page":3,"verbose":true}"#), &HashMap::new())
                .unwrap();
        assert_eq!(input.id, "1");
        assert_eq!(input.page, 3);
        assert!(input.verbose);
    }

    #[test]
    fn query_strings_coerce_into_scalars() {
        let src = RequestSources {
            query: vec![
                ("id".into(), "7".into()),
                ("page".into(), "12".into()),
                ("verbose".into(), "true".into()),
            ],
            ..Default::default()
        };
        let input: Probe = assemble_input(&src, &HashMap::new()).unwrap();
        assert_eq!(input.id, "7");
        assert_eq!(input.page, 12);
        assert!(input.verbose);
    }

    #[test]
    fn body_wins_over_query() {
        let mut src = sources(r#"{"id":"body"}"#);
        src.query.push(("id".into(), "query".into()));
        let input: Probe = assemble_input(&src, &HashMap::new()).unwrap();
        assert_eq!(input.id, "body");
    }

    #[test]
    fn query_wins_over_form_and_header() {
        let src = RequestSources {
            query: vec![("id".into(), "q".into())],
            form: vec![("id".into(), "f".into()), ("page".into(), "2".into())],
            headers: vec![("id".into(), "h".into()), ("trace".into(), "t1".into())],
            ..Default::default()
        };
        let input: Probe = assemble_input(&src, &HashMap::new()).unwrap();
        assert_eq!(input.id, "q");
        assert_eq!(input.page, 2);
        assert_eq!(input.trace.as_deref(), Some("t1"));
    }

    #[test]
    fn hinted_header_overrides_default_order() {
        let src = RequestSources {
            query: vec![("id".into(), "1".into()), ("trace".into(), "from-query".into())],
            headers: vec![("x-trace-id".into(), "from-header".into())],
            ..Default::default()
        };
        let mut hints = HashMap::new();
        hints.insert("trace".to_string(), ParamSource::Header("X-Trace-Id".into()));
        let input: Probe = assemble_input(&src, &hints).unwrap();
        assert_eq!(input.trace.as_deref(), Some("from-header"));
    }

    #[test]
    fn non_object_body_is_a_parse_error() {
        let err = assemble_input::<Probe>(&sources("[1,2]"), &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), 400);
        assert_eq!(err.msg(), "Parameter parsing error");
    }

    #[test]
    fn validation_failure_is_distinguished() {
        let err = assemble_input::<Probe>(&sources(r#"{"id":""}"#), &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), 400);
        assert_eq!(err.msg(), "Parameter validation error");
    }

    #[test]
    fn empty_body_starts_from_the_zero_value() {
        // The zero value of `id` is empty, which the garde rules reject.
        let err = assemble_input::<Probe>(&RequestSources::default(), &HashMap::new()).unwrap_err();
        assert_eq!(err.msg(), "Parameter validation error");
    }
}
