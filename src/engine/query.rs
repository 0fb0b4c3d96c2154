use std::fmt;

use crate::{
    client::{EntityCollection, ResultSet},
    extensions::Extension,
    fetch::FetchXml,
    metadata::MetadataTable,
    parser::ast::ScalarExpr,
};

/// Lifecycle of a query; only `Created` may be executed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryState {
    #[default]
    Created,
    Executing,
    Completed(QueryResult),
    Failed(String),
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Created => write!(f, "Created"),
            QueryState::Executing => write!(f, "Executing"),
            QueryState::Completed(_) => write!(f, "Completed"),
            QueryState::Failed(_) => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Entities(EntityCollection),
    Affected { count: usize, message: String },
}

/// How an aggregate SELECT is answered.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionStrategy {
    /// The fetch and its extensions are the whole plan.
    #[default]
    Native,
    /// The fetch is a native aggregate; `alternative` retrieves raw rows and groups them
    /// locally with the same column set.
    Aggregate { alternative: Box<FetchQuery> },
}

/// A SELECT backed by a native fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub sql: String,
    pub fetch: FetchXml,
    pub extensions: Vec<Extension>,
    pub column_set: Vec<String>,
    pub strategy: ExecutionStrategy,
    pub state: QueryState,
}

impl FetchQuery {
    pub fn new(sql: &str, fetch: FetchXml) -> Self {
        Self {
            sql: sql.to_string(),
            fetch,
            extensions: vec![],
            column_set: vec![],
            strategy: ExecutionStrategy::Native,
            state: QueryState::Created,
        }
    }

    /// Whether the native aggregate can't answer the query on its own: any step after
    /// the aggregate fetch needs rows the platform doesn't return.
    pub fn requires_alternative(&self) -> bool {
        matches!(self.strategy, ExecutionStrategy::Aggregate { .. }) && !self.extensions.is_empty()
    }

    pub fn alternative(&self) -> Option<&FetchQuery> {
        match &self.strategy {
            ExecutionStrategy::Aggregate { alternative } => Some(alternative),
            ExecutionStrategy::Native => None,
        }
    }

    /// Final rows under the caller-visible columns, once completed.
    pub fn result_set(&self) -> Option<ResultSet> {
        match &self.state {
            QueryState::Completed(QueryResult::Entities(collection)) => {
                Some(ResultSet::new(self.column_set.clone(), collection.entities.clone()))
            }
            _ => None,
        }
    }
}

/// One `SET` assignment; `value` reads row keys of the source query.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateColumn {
    pub attribute: String,
    pub value: ScalarExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub sql: String,
    /// Selects the records to change plus any values the assignments read.
    pub source: FetchQuery,
    pub entity_name: String,
    /// Row key holding the id of the record to change.
    pub id_column: String,
    pub updates: Vec<UpdateColumn>,
    pub has_where: bool,
    pub state: QueryState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub sql: String,
    pub source: FetchQuery,
    pub entity_name: String,
    pub id_column: String,
    /// The deleted table is the root of the source fetch.
    pub target_is_root: bool,
    pub has_where: bool,
    pub state: QueryState,
}

/// Which collection of schema objects a metadata query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataQueryKind {
    EntityMetadata,
    GlobalOptionSet,
}

/// A SELECT over the virtual schema tables, evaluated locally.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataQuery {
    pub sql: String,
    pub kind: MetadataQueryKind,
    pub tables: Vec<MetadataTable>,
    pub fetch: FetchXml,
    pub column_set: Vec<String>,
    pub state: QueryState,
}

impl MetadataQuery {
    pub fn result_set(&self) -> Option<ResultSet> {
        match &self.state {
            QueryState::Completed(QueryResult::Entities(collection)) => {
                Some(ResultSet::new(self.column_set.clone(), collection.entities.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Fetch(FetchQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
    Metadata(MetadataQuery),
}

impl Query {
    pub fn sql(&self) -> &str {
        match self {
            Query::Fetch(q) => &q.sql,
            Query::Update(q) => &q.sql,
            Query::Delete(q) => &q.sql,
            Query::Metadata(q) => &q.sql,
        }
    }

    pub fn state(&self) -> &QueryState {
        match self {
            Query::Fetch(q) => &q.state,
            Query::Update(q) => &q.state,
            Query::Delete(q) => &q.state,
            Query::Metadata(q) => &q.state,
        }
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self.state() {
            QueryState::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// The native query that runs first: the SELECT itself or the record selection of
    /// an UPDATE / DELETE.
    pub fn fetch(&self) -> &FetchXml {
        match self {
            Query::Fetch(q) => &q.fetch,
            Query::Update(q) => &q.source.fetch,
            Query::Delete(q) => &q.source.fetch,
            Query::Metadata(q) => &q.fetch,
        }
    }

    pub fn result_set(&self) -> Option<ResultSet> {
        match self {
            Query::Fetch(q) => q.result_set(),
            Query::Metadata(q) => q.result_set(),
            Query::Update(_) | Query::Delete(_) => None,
        }
    }
}
