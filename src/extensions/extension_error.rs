use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtensionError {
    #[error("Unknown function {0}")]
    UnknownFunction(String),
    #[error("Invalid arguments for {name}, expected {expected}")]
    InvalidArguments { name: String, expected: String },
    #[error("{function} cannot be applied to {value}")]
    InvalidValue { function: String, value: String },
    #[error("Invalid LIKE pattern {0}")]
    InvalidPattern(String),
    #[error("Division by zero")]
    DivideByZero,
}

impl ExtensionError {
    pub fn arguments(name: &str, expected: &str) -> Self {
        ExtensionError::InvalidArguments { name: name.to_uppercase(), expected: expected.to_string() }
    }
}
