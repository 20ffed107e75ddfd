//! Core type system for tfplug
//!
//! This module provides the core types used throughout the framework,
//! including Dynamic values, attribute paths and diagnostics.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dynamic represents Terraform values that can be of any type
/// This is the core type for all configuration and state data
/// IMPORTANT: Always use type-safe accessors instead of matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (lists and sets share this representation)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    /// Converts any serializable value into its attribute representation.
    /// Field names follow the value's serde names.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)?;
        serde_json::from_value(json).map_err(|e| TfplugError::DecodingError(e.to_string()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Dynamic]> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::Number(n)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null | Dynamic::Unknown => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Dynamic::deserialize(deserializer)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value))
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut hashmap = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    hashmap.insert(key, value);
                }
                Ok(Dynamic::Map(hashmap))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// DynamicValue wraps Dynamic and provides path-based access
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    /// An empty object, the usual starting point for new state
    pub fn empty_object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    /// Type-safe accessors - ALWAYS use these instead of pattern matching
    /// These handle path navigation and type checking
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        value.as_f64().ok_or_else(|| mismatch("number", value))
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        value
            .as_list()
            .map(<[Dynamic]>::to_vec)
            .ok_or_else(|| mismatch("list", value))
    }

    /// Reads a list or set of strings; null or missing yields an empty list
    pub fn get_string_list(&self, path: &AttributePath) -> Result<Vec<String>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null) | Err(TfplugError::AttributeNotFound(_)) => Ok(Vec::new()),
            Ok(Dynamic::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| mismatch("string", item))
                })
                .collect(),
            Ok(other) => Err(mismatch("list", other)),
            Err(e) => Err(e),
        }
    }

    /// True when the attribute exists and holds a known, non-null value
    pub fn is_set(&self, path: &AttributePath) -> bool {
        matches!(
            self.navigate_path(path),
            Ok(v) if !matches!(v, Dynamic::Null | Dynamic::Unknown)
        )
    }

    /// Type-safe setters - Use for building state/config objects
    pub fn set_string(&mut self, path: &AttributePath, value: impl Into<String>) -> Result<()> {
        self.set_value(path, Dynamic::String(value.into()))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(name.clone()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    l.get(*idx as usize).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds", idx))
                    })?
                }
                _ => return Err(TfplugError::InvalidPath(format!("{:?}", path))),
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        // Non-empty paths always start from an object
        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(
                path.steps.get(idx + 1),
                Some(AttributePathStep::ElementKeyInt(_))
            );
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    m.entry(name.clone()).or_insert_with(|| {
                        if next_is_index {
                            Dynamic::List(Vec::new())
                        } else {
                            Dynamic::Map(HashMap::new())
                        }
                    })
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let len = l.len();
                    l.get_mut(*idx as usize).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds ({})", idx, len))
                    })?
                }
                _ => return Err(TfplugError::InvalidPath(format!("{:?}", path))),
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                let len = l.len();
                let slot = l.get_mut(*idx as usize).ok_or_else(|| {
                    TfplugError::InvalidPath(format!("list index {} out of bounds ({})", idx, len))
                })?;
                *slot = new_value;
                Ok(())
            }
            _ => Err(TfplugError::InvalidPath(format!("{:?}", path))),
        }
    }
}

fn mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// Builds an object value attribute by attribute. Used when flattening API
/// responses into state.
#[derive(Debug, Clone, Default)]
pub struct StateBuilder {
    values: HashMap<String, Dynamic>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing object so attributes not touched by the
    /// builder (configuration-only values) are carried over
    pub fn from_state(state: &DynamicValue) -> Self {
        let values = state.value.as_map().cloned().unwrap_or_default();
        Self { values }
    }

    pub fn string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(key.into(), Dynamic::String(value.into()));
        self
    }

    pub fn number(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), Dynamic::Number(value));
        self
    }

    pub fn bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.values.insert(key.into(), Dynamic::Bool(value));
        self
    }

    pub fn strings<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = values
            .into_iter()
            .map(|v| Dynamic::String(v.into()))
            .collect();
        self.values.insert(key.into(), Dynamic::List(list));
        self
    }

    pub fn list(mut self, key: impl Into<String>, value: Vec<Dynamic>) -> Self {
        self.values.insert(key.into(), Dynamic::List(value));
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: Dynamic) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn build(self) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(self.values))
    }

    /// The built object as a bare Dynamic, for nesting inside lists
    pub fn build_object(self) -> Dynamic {
        Dynamic::Map(self.values)
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// True when any diagnostic in the slice is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("name"), "test").unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "test");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::empty_object();
        let path = AttributePath::new("config").attribute("endpoint");
        dv.set_string(&path, "https://example.com").unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "https://example.com");
    }

    #[test]
    fn indexed_paths_reach_list_elements() {
        let attachment = StateBuilder::new().string("instance_id", "i-1").build_object();
        let dv = StateBuilder::new()
            .list("attachments", vec![attachment])
            .build();

        let path = AttributePath::new("attachments").index(0).attribute("instance_id");
        assert_eq!(dv.get_string(&path).unwrap(), "i-1");

        let missing = AttributePath::new("attachments").index(3).attribute("instance_id");
        assert!(matches!(
            dv.get_string(&missing),
            Err(TfplugError::InvalidPath(_))
        ));
    }

    #[test]
    fn missing_attribute_is_reported_by_name() {
        let dv = DynamicValue::empty_object();
        let err = dv.get_string(&AttributePath::new("label")).unwrap_err();
        assert!(matches!(err, TfplugError::AttributeNotFound(ref n) if n == "label"));
    }

    #[test]
    fn type_mismatch_names_actual_type() {
        let dv = StateBuilder::new().number("size_gb", 10.0).build();
        let err = dv.get_string(&AttributePath::new("size_gb")).unwrap_err();
        assert!(matches!(
            err,
            TfplugError::TypeMismatch { ref actual, .. } if actual == "number"
        ));
    }

    #[test]
    fn string_list_treats_null_and_missing_as_empty() {
        let dv = StateBuilder::new().value("tags", Dynamic::Null).build();
        assert!(dv.get_string_list(&AttributePath::new("tags")).unwrap().is_empty());
        assert!(dv
            .get_string_list(&AttributePath::new("missing"))
            .unwrap()
            .is_empty());

        let dv = StateBuilder::new().strings("tags", ["a", "b"]).build();
        assert_eq!(
            dv.get_string_list(&AttributePath::new("tags")).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn is_set_ignores_null_and_unknown() {
        let dv = StateBuilder::new()
            .value("a", Dynamic::Null)
            .value("b", Dynamic::Unknown)
            .string("c", "")
            .build();
        assert!(!dv.is_set(&AttributePath::new("a")));
        assert!(!dv.is_set(&AttributePath::new("b")));
        assert!(dv.is_set(&AttributePath::new("c")));
        assert!(!dv.is_set(&AttributePath::new("d")));
    }

    #[test]
    fn state_builder_preserves_untouched_attributes() {
        let prior = StateBuilder::new()
            .bool("live", true)
            .string("label", "old")
            .build();
        let next = StateBuilder::from_state(&prior).string("label", "new").build();

        assert!(next.get_bool(&AttributePath::new("live")).unwrap());
        assert_eq!(next.get_string(&AttributePath::new("label")).unwrap(), "new");
    }

    #[test]
    fn from_serializable_uses_serde_field_names() {
        #[derive(Serialize)]
        struct Zone {
            id: String,
            #[serde(rename = "cdn_url")]
            url: String,
            cost: Option<f64>,
        }

        let zone = Zone {
            id: "z1".to_string(),
            url: "cdn.example.com".to_string(),
            cost: None,
        };
        let value = Dynamic::from_serializable(&zone).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["cdn_url"], Dynamic::from("cdn.example.com"));
        assert!(map["cost"].is_null());
    }

    #[test]
    fn json_encoding_round_trips_objects() {
        let dv = StateBuilder::new()
            .string("id", "abc")
            .number("size_gb", 40.0)
            .build();
        let decoded = DynamicValue::decode_json(&dv.encode_json().unwrap()).unwrap();
        assert_eq!(decoded, dv);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let diags = vec![Diagnostic::warning("careful", "")];
        assert!(!has_errors(&diags));
        let diags = vec![Diagnostic::warning("careful", ""), Diagnostic::error("bad", "")];
        assert!(has_errors(&diags));
    }
}
