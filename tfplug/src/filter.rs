//! Client-side filtering for list-style data sources
//!
//! Data sources accept any number of `filter { name = ..., values = [...] }`
//! blocks. An item is kept when every filter matches: the item's attribute
//! `name` must equal one of `values`.

use crate::error::{Result, TfplugError};
use crate::schema::{AttributeBuilder, AttributeType, Block, NestedBlock};
use crate::types::{AttributePath, Dynamic, DynamicValue};

pub const FILTER_BLOCK: &str = "filter";

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Reads the filter blocks of a data source config. `None` when no
    /// filter block was given at all.
    pub fn from_config(config: &DynamicValue) -> Result<Option<Vec<Filter>>> {
        let path = AttributePath::new(FILTER_BLOCK);
        if !config.is_set(&path) {
            return Ok(None);
        }

        let blocks = config.get_list(&path)?;
        if blocks.is_empty() {
            return Ok(None);
        }

        blocks
            .iter()
            .map(|block| {
                let block = DynamicValue::new(block.clone());
                let name = block.get_string(&AttributePath::new("name"))?;
                let values = block.get_string_list(&AttributePath::new("values"))?;
                if values.is_empty() {
                    return Err(TfplugError::InvalidFilter(format!(
                        "filter '{}' must have at least one value",
                        name
                    )));
                }
                Ok(Filter { name, values })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// True when the item's attribute equals one of the filter values
    pub fn matches(&self, item: &Dynamic) -> bool {
        item.as_map()
            .and_then(|m| m.get(&self.name))
            .is_some_and(|attr| self.values.iter().any(|v| value_matches(attr, v)))
    }
}

/// True when every filter matches the item
pub fn matches_all(filters: &[Filter], item: &Dynamic) -> bool {
    filters.iter().all(|f| f.matches(item))
}

fn value_matches(attr: &Dynamic, wanted: &str) -> bool {
    match attr {
        Dynamic::String(s) => s == wanted,
        Dynamic::Number(n) => wanted.parse::<f64>().is_ok_and(|w| w == *n),
        Dynamic::Bool(b) => wanted.parse::<bool>().is_ok_and(|w| w == *b),
        Dynamic::List(items) => items.iter().any(|item| value_matches(item, wanted)),
        Dynamic::Null | Dynamic::Map(_) | Dynamic::Unknown => false,
    }
}

/// Schema of the repeatable filter block
pub fn filter_block(required: bool) -> NestedBlock {
    let block = Block {
        attributes: vec![
            AttributeBuilder::new("name", AttributeType::String)
                .description("Attribute name to filter on")
                .required()
                .build(),
            AttributeBuilder::new("values", AttributeType::list_of(AttributeType::String))
                .description("Accepted values; any one of them matches")
                .required()
                .build(),
        ],
        block_types: vec![],
        description: "Client-side filter on the listed items".to_string(),
    };
    NestedBlock::set(FILTER_BLOCK, block, i64::from(required))
}
