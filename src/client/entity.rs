use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::client::Value;

static NULL_VALUE: Value = Value::Null;

/// A record: logical name, optional id and an ordered attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub logical_name: String,
    pub id: Option<Uuid>,
    pub attributes: IndexMap<String, Value>,
}

impl Entity {
    pub fn new(logical_name: &str) -> Self {
        Self { logical_name: logical_name.to_string(), id: None, attributes: IndexMap::new() }
    }

    pub fn with_id(logical_name: &str, id: Uuid) -> Self {
        Self { logical_name: logical_name.to_string(), id: Some(id), attributes: IndexMap::new() }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    /// Missing attributes read as NULL.
    pub fn get(&self, key: &str) -> &Value {
        self.attributes.get(key).unwrap_or(&NULL_VALUE)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

/// One page of records from a native retrieval.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityCollection {
    pub entities: Vec<Entity>,
    pub more_records: bool,
    pub paging_cookie: Option<String>,
}

/// Final rows of a SELECT together with the caller-visible column list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub entities: Vec<Entity>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, entities: Vec<Entity>) -> Self {
        Self { columns, entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Values of every row in column-set order; repeated columns repeat their value.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.entities
            .iter()
            .map(|e| self.columns.iter().map(|c| e.get(c).clone()).collect())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .entities
            .iter()
            .map(|e| {
                let mut obj = serde_json::Map::new();
                for c in &self.columns {
                    obj.insert(c.clone(), e.get(c).to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::client::{Entity, ResultSet, Value};

    #[test]
    fn missing_attributes_read_as_null() {
        let e = Entity::new("account").set("name", "Data8");
        assert_eq!(e.get("name"), &Value::from("Data8"));
        assert!(e.get("other").is_null());
    }

    #[test]
    fn result_rows_follow_column_set() {
        let rs = ResultSet::new(
            vec!["name".into(), "name".into(), "accountid_count".into()],
            vec![Entity::new("account").set("name", "Data8").set("accountid_count", 2)],
        );
        assert_eq!(rs.rows(), vec![vec![Value::from("Data8"), Value::from("Data8"), Value::Int(2)]]);
        assert_eq!(rs.to_json(), json!([{ "name": "Data8", "accountid_count": 2 }]));
    }
}
