use ordered_float::NotNan;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(NotNan<f64>),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn float(value: f64) -> Literal {
        NotNan::new(value).map(Literal::Float).unwrap_or(Literal::Null)
    }

    /// Text used for a FetchXML `value` attribute.
    pub fn to_native_value(&self) -> Option<String> {
        match self {
            Literal::String(s) => Some(s.clone()),
            Literal::Int(i) => Some(i.to_string()),
            Literal::Float(n) => Some(n.into_inner().to_string()),
            Literal::Bool(b) => Some(if *b { "1".into() } else { "0".into() }),
            Literal::Null => None,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(n) => write!(f, "{}", n.into_inner()),
            Literal::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Literal::Null => write!(f, "NULL"),
        }
    }
}
