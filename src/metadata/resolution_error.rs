use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("Unknown entity {0}")]
    UnknownEntity(String),
    #[error("Unknown attribute {attribute} in entity {entity}")]
    UnknownAttribute { entity: String, attribute: String },
    #[error("Unknown table alias {0}")]
    UnknownAlias(String),
    #[error("Metadata lookup for {entity} failed: {source}")]
    Source {
        entity: String,
        #[source]
        source: ClientError,
    },
}
