use crate::{
    engine::{FetchQuery, MetadataQuery, MetadataQueryKind, QueryState},
    extensions::Extension,
    metadata::MetadataTable,
    parser::ast::{SelectStatement, TableSource},
    translator::{AggregateResolver, TranslationError},
    Error,
};

pub struct MetadataResolver;

impl MetadataResolver {
    /// The schema tables a FROM clause reads, or `None` for an ordinary data query.
    pub fn tables(source: &TableSource) -> Result<Option<(MetadataQueryKind, Vec<MetadataTable>)>, Error> {
        let names = std::iter::once(&source.table).chain(source.joins.iter().map(|j| &j.table));
        let tables: Vec<Option<MetadataTable>> = names.map(|t| MetadataTable::from_name(&t.name)).collect();

        let Some(Some(root)) = tables.first().copied() else {
            if tables.iter().any(Option::is_some) {
                return Err(TranslationError::MetadataQuery("a join to a data table".into()).into());
            }
            return Ok(None);
        };

        let mut out = vec![];
        for table in tables {
            match table {
                Some(t) if t.is_option_set_table() == root.is_option_set_table() => {
                    if !out.contains(&t) {
                        out.push(t);
                    }
                }
                Some(_) => return Err(TranslationError::MetadataQuery("a join between entity and option set tables".into()).into()),
                None => return Err(TranslationError::MetadataQuery("a join to a data table".into()).into()),
            }
        }

        let kind = if root.is_option_set_table() { MetadataQueryKind::GlobalOptionSet } else { MetadataQueryKind::EntityMetadata };
        Ok(Some((kind, out)))
    }

    pub fn check_select(select: &SelectStatement) -> Result<(), Error> {
        if AggregateResolver::is_aggregate(select) {
            return Err(TranslationError::MetadataQuery("aggregates".into()).into());
        }
        Ok(())
    }

    /// Wraps a translated SELECT; metadata rows are evaluated in one pass, so nothing may
    /// need a local step.
    pub fn finish(query: FetchQuery, kind: MetadataQueryKind, tables: Vec<MetadataTable>) -> Result<MetadataQuery, Error> {
        if let Some(extension) = query.extensions.first() {
            let construct = match extension {
                Extension::FilterRows { .. } => "a filter that can't be evaluated natively",
                Extension::ComputeColumn { .. } => "calculated columns",
                Extension::Sort { .. } => "this ORDER BY",
                Extension::ApplyLimit { .. } => "this TOP or OFFSET",
                Extension::Distinct { .. } => "DISTINCT",
                Extension::Having { .. } | Extension::Aggregate { .. } | Extension::NormalizeCollationKey { .. } => "aggregates",
            };
            return Err(TranslationError::MetadataQuery(construct.into()).into());
        }

        Ok(MetadataQuery {
            sql: query.sql,
            kind,
            tables,
            fetch: query.fetch,
            column_set: query.column_set,
            state: QueryState::Created,
        })
    }
}
