use std::{cmp::Ordering, fmt};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::parser::ast::Literal;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityReference {
    pub logical_name: String,
    pub id: Uuid,
}

impl EntityReference {
    pub fn new(logical_name: &str, id: Uuid) -> Self {
        Self { logical_name: logical_name.to_string(), id }
    }
}

/// A single attribute value as returned by the data platform.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    EntityReference(EntityReference),
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Unique identifier of a Guid, an EntityReference, or a string holding a Guid.
    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(g) => Some(*g),
            Value::EntityReference(r) => Some(r.id),
            Value::String(s) => Uuid::parse_str(s.trim()).ok(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(d) => Some(*d),
            Value::String(s) => Self::parse_datetime(s),
            _ => None,
        }
    }

    pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        for format in DATE_FORMATS {
            if let Ok(d) = NaiveDateTime::parse_from_str(text, format) {
                return Some(d);
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(n) => Value::Float(n.into_inner()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }

    pub fn to_literal(&self) -> Literal {
        match self {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Int(i) => Literal::Int(*i),
            Value::Float(f) => Literal::float(*f),
            other => Literal::String(other.to_string()),
        }
    }

    /// Case-folded copy used as a grouping / comparison key.
    pub fn collation_key(&self) -> Value {
        match self {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// SQL comparison: `None` when either side is NULL or the types can't be compared.
    pub fn compare(&self, other: &Value, case_sensitive: bool) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (String(a), String(b)) => Some(if case_sensitive {
                a.cmp(b)
            } else {
                a.to_lowercase().cmp(&b.to_lowercase())
            }),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (DateTime(_), _) | (_, DateTime(_)) => {
                let (a, b) = (self.as_datetime()?, other.as_datetime()?);
                Some(a.cmp(&b))
            }
            (Guid(_) | Value::EntityReference(_), _) | (_, Guid(_) | Value::EntityReference(_)) => {
                let (a, b) = (self.as_guid()?, other.as_guid()?);
                Some(a.cmp(&b))
            }
            _ => {
                let (a, b) = (self.as_f64()?, other.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    pub fn sql_equals(&self, other: &Value, case_sensitive: bool) -> Option<bool> {
        self.compare(other, case_sensitive).map(|o| o == Ordering::Equal)
    }

    /// Total order for sorting: NULLs first, incomparable values by type rank.
    pub fn cmp_for_sort(&self, other: &Value, case_sensitive: bool) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => self
                .compare(other, case_sensitive)
                .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank())),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) => 4,
            Value::Guid(_) | Value::EntityReference(_) => 5,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::Guid(g) => write!(f, "{}", g),
            Value::EntityReference(r) => write!(f, "{}", r.id),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<EntityReference> for Value {
    fn from(value: EntityReference) -> Self {
        Value::EntityReference(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering::*;

    use uuid::Uuid;

    use super::{EntityReference, Value};

    #[test]
    fn strings_compare_case_insensitively_by_default() {
        let a = Value::from("Carrington");
        let b = Value::from("CARRINGTON");
        assert_eq!(a.sql_equals(&b, false), Some(true));
        assert_eq!(a.sql_equals(&b, true), Some(false));
    }

    #[test]
    fn null_is_incomparable() {
        assert_eq!(Value::Null.compare(&Value::Int(1), false), None);
        assert_eq!(Value::Null.cmp_for_sort(&Value::Int(1), false), Less);
    }

    #[test]
    fn guid_matches_entity_reference() {
        let id = Uuid::new_v4();
        let reference = Value::EntityReference(EntityReference::new("contact", id));
        assert_eq!(Value::Guid(id).sql_equals(&reference, false), Some(true));
        assert_eq!(Value::Guid(Uuid::new_v4()).sql_equals(&reference, false), Some(false));
    }

    #[test]
    fn dates_coerce_from_strings() {
        let d = Value::parse_datetime("2020-02-01").unwrap();
        assert_eq!(Value::DateTime(d).compare(&Value::from("2020-01-01"), false), Some(Greater));
        assert_eq!(Value::parse_datetime("2020-01-01 00:30:00").unwrap().to_string(), "2020-01-01 00:30:00");
    }

    #[test]
    fn mixed_numbers() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5), false), Some(Less));
        assert_eq!(Value::Int(2).to_json(), serde_json::json!(2));
    }
}
