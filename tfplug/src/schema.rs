//! Schemas for the provider, its resources and data sources
//!
//! A schema is a root [`Block`] of attributes plus repeatable nested blocks.
//! Attribute flags follow Terraform's planning rules: exactly one of
//! required/optional may be set, and computed may combine with optional.

use crate::types::{Dynamic, DynamicValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    /// Stored as f64
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list_of(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }

    /// Object type from `(name, type)` pairs
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, AttributeType)>) -> Self {
        AttributeType::Object(
            fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => f.write_str("string"),
            AttributeType::Number => f.write_str("number"),
            AttributeType::Bool => f.write_str("bool"),
            AttributeType::List(inner) => write!(f, "list({})", inner),
            AttributeType::Set(inner) => write!(f, "set({})", inner),
            AttributeType::Object(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                write!(f, "object(")?;
                for (i, name) in names.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, fields[name])?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    /// Bumped whenever stored state needs migrating
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attribute(name)
    }

    /// Fills top-level attributes that are absent or null with their
    /// schema default. Unknown values are left for the host to resolve.
    pub fn apply_defaults(&self, value: &mut DynamicValue) {
        let Dynamic::Map(fields) = &mut value.value else {
            return;
        };
        for attribute in &self.block.attributes {
            let Some(default) = &attribute.default else {
                continue;
            };
            let slot = fields
                .entry(attribute.name.clone())
                .or_insert(Dynamic::Null);
            if slot.is_null() {
                *slot = default.default_value();
            }
        }
    }

    pub fn block_type(&self, type_name: &str) -> Option<&NestedBlock> {
        self.block
            .block_types
            .iter()
            .find(|b| b.type_name == type_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Value used when an optional attribute is left out of the configuration
pub trait AttributeDefault: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self) -> Dynamic;
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Changing the value forces the resource to be replaced
    pub force_new: bool,
    pub default: Option<Arc<dyn AttributeDefault>>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field(
                "default",
                &self.default.as_ref().map(|d| d.description()),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    /// Zero means unbounded
    pub max_items: i64,
}

impl NestedBlock {
    /// Unordered, unbounded block that must appear at least `min_items` times
    pub fn set(type_name: &str, block: Block, min_items: i64) -> Self {
        Self {
            type_name: type_name.to_string(),
            block,
            nesting: NestingMode::Set,
            min_items,
            max_items: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    List,
    Set,
}

pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, r#type: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                force_new: false,
                default: None,
            },
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.attribute.description = description.to_string();
        self
    }

    /// Last call between `required` and `optional` wins
    pub fn required(mut self) -> Self {
        (self.attribute.required, self.attribute.optional) = (true, false);
        self
    }

    pub fn optional(mut self) -> Self {
        (self.attribute.required, self.attribute.optional) = (false, true);
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    pub fn default(mut self, default: Arc<dyn AttributeDefault>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    schema_version: i64,
    root: Block,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema_version = version;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.root.description = description.to_string();
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.root.attributes.push(attribute);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.root.block_types.push(block);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            version: self.schema_version,
            block: self.root,
        }
    }
}
