use std::collections::HashMap;

use crate::{client::{Entity, Value}, parser::ast::Column};

/// A row flowing through the extension pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub entity: Entity,
    /// Case-folded comparison keys written by `NormalizeCollationKey`.
    pub collation_keys: HashMap<String, Value>,
}

impl Row {
    pub fn new(entity: Entity) -> Self {
        Self { entity, collation_keys: HashMap::new() }
    }

    pub fn get(&self, key: &str) -> &Value {
        self.entity.get(key)
    }

    /// Value used when comparing, grouping or sorting by `column`.
    pub fn key_for(&self, column: &Column) -> &Value {
        let key = column.row_key();
        self.collation_keys.get(&key).unwrap_or_else(|| self.entity.get(&key))
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }
}

impl From<Entity> for Row {
    fn from(entity: Entity) -> Self {
        Row::new(entity)
    }
}
