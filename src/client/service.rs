use thiserror::Error;
use uuid::Uuid;

use crate::{client::{Entity, EntityCollection}, fetch::FetchXml, metadata::{EntityMetadata, OptionSetMetadata}};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Could not find {entity} with id {id}")]
    NotFound { entity: String, id: Uuid },
    #[error("Could not find entity {0}")]
    UnknownEntity(String),
    #[error("AggregateQueryRecordLimit exceeded. Cannot perform this operation.")]
    AggregateQueryRecordLimit,
    #[error("{0}")]
    Fault(String),
}

/// Round trips against the data platform.
pub trait OrganizationService: Send + Sync {
    /// Executes a native query and returns one page of results.
    fn retrieve_multiple(&self, fetch: &FetchXml) -> Result<EntityCollection, ClientError>;

    fn create(&self, entity: &Entity) -> Result<Uuid, ClientError>;

    fn update(&self, entity: &Entity) -> Result<(), ClientError>;

    fn delete(&self, logical_name: &str, id: Uuid) -> Result<(), ClientError>;

    /// Starts an asynchronous bulk delete of every record the query returns; yields the job id.
    fn bulk_delete(&self, fetch: &FetchXml) -> Result<Uuid, ClientError>;

    fn retrieve_entity_metadata(&self, logical_name: &str) -> Result<EntityMetadata, ClientError>;

    fn retrieve_all_entity_metadata(&self) -> Result<Vec<EntityMetadata>, ClientError>;

    fn retrieve_all_option_sets(&self) -> Result<Vec<OptionSetMetadata>, ClientError>;
}
