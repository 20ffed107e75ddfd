//! Static attribute defaults

use crate::schema::AttributeDefault;
use crate::types::Dynamic;
use std::sync::Arc;

/// Always yields the same value
#[derive(Debug)]
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Arc<dyn AttributeDefault> {
        Arc::new(Self { value })
    }

    pub fn string(value: &str) -> Arc<dyn AttributeDefault> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn bool(value: bool) -> Arc<dyn AttributeDefault> {
        Self::create(Dynamic::Bool(value))
    }
}

impl AttributeDefault for StaticDefault {
    fn description(&self) -> String {
        format!("defaults to {:?}", self.value)
    }

    fn default_value(&self) -> Dynamic {
        self.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_default_hands_out_its_value() {
        let default = StaticDefault::string("nvme");
        assert_eq!(default.default_value(), Dynamic::String("nvme".to_string()));
        assert_eq!(default.description(), r#"defaults to String("nvme")"#);
        assert_eq!(StaticDefault::bool(false).default_value(), Dynamic::Bool(false));
    }
}
