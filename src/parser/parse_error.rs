use std::fmt::Display;

use crate::parser::QueryParser;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    pub fn new(message: &str, pivot: usize, parser: &QueryParser) -> Self {
        let end = parser.current_end();
        Self {
            message: message.to_string(),
            text: parser.text_from_range(pivot, end),
            start: pivot,
            end,
        }
    }

    /// Builds an error straight from the source text, used while tokenizing.
    pub fn at(message: &str, source: &str, start: usize, end: usize) -> Self {
        Self {
            message: message.to_string(),
            text: source.get(start..end).unwrap_or_default().to_string(),
            start,
            end,
        }
    }

    pub fn err<T>(self) -> Result<T, ParseError> {
        Err(self)
    }
}

impl Display for ParseError  {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ParseError: {}\n  at [{}:{}] -> '{}'",
            self.message,
            self.start,
            self.end,
            self.text
        )
    }
}

impl std::error::Error for ParseError {}
