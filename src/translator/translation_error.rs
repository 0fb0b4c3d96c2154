use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    #[error("{0} is not supported")]
    NotSupported(String),
    #[error("Ambiguous column name {name}, found in {}", matches.join(", "))]
    AmbiguousColumn { name: String, matches: Vec<String> },
    #[error("Unknown column \"{text}\". Did you mean '{text}'? Double quotes denote identifiers, use single quotes for string literals")]
    QuotedIdentifier { text: String },
    #[error("Unsupported join condition: {0}")]
    InvalidJoin(String),
    #[error("The table alias {0} is used more than once")]
    DuplicateAlias(String),
    #[error("Invalid column reference {0}")]
    InvalidColumn(String),
    #[error("{0} is not a valid value for attribute {1}")]
    InvalidValue(String, String),
    #[error("Metadata tables cannot be combined with data tables or queried with {0}")]
    MetadataQuery(String),
}
