pub mod parser;

pub mod client;
pub use client::{Entity, EntityReference, MemoryOrganizationService, OrganizationService, Value};

pub mod fetch;
pub use fetch::FetchXml;

pub mod metadata;
pub use metadata::AttributeMetadataCache;

pub mod rewrite;

pub mod extensions;

pub mod translator;
pub use translator::{Sql2FetchXml, TranslatorOptions};

pub mod engine;
pub use engine::{ExecutionSettings, Query, QueryExecutionOptions, QueryResult, QueryState};

pub mod session;
pub use session::{Connection, QueryRunner};

pub mod error;
pub use error::*;
