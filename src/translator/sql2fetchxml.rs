use std::sync::Arc;

use tracing::debug;

use crate::{
    engine::{FetchQuery, Query},
    extensions::{DistinctColumn, Extension},
    metadata::AttributeMetadataCache,
    parser::ast::{ParsedStatement, SelectStatement, Statement},
    translator::{
        AggregateResolver, DmlResolver, JoinResolver, LimitResolver, MetadataResolver, OrderByResolver, PredicateResolver,
        ProjectionResolver, TranslationError, TranslatorOptions,
    },
    Error,
};

/// Turns a SQL batch into executable queries: a native fetch per statement plus the
/// local steps covering whatever the fetch can't express.
pub struct Sql2FetchXml {
    metadata: Arc<AttributeMetadataCache>,
    options: TranslatorOptions,
}

impl Sql2FetchXml {
    pub fn new(metadata: Arc<AttributeMetadataCache>, options: TranslatorOptions) -> Self {
        Self { metadata, options }
    }

    pub fn options(&self) -> &TranslatorOptions {
        &self.options
    }

    /// Translates every statement of the batch; the first failure aborts the batch.
    pub fn translate(&self, sql: &str) -> Result<Vec<Query>, Error> {
        let statements = Statement::parse_batch(sql)?;
        let mut queries = Vec::with_capacity(statements.len());

        for ParsedStatement { statement, sql } in statements {
            let query = match &statement {
                Statement::Select(select) => self.translate_select(select, &sql)?,
                Statement::Update(update) => Query::Update(DmlResolver::update(update, &sql, &self.metadata, &self.options)?),
                Statement::Delete(delete) => Query::Delete(DmlResolver::delete(delete, &sql, &self.metadata, &self.options)?),
            };
            debug!(sql = %query.sql(), fetch = %query.fetch(), "translated statement");
            queries.push(query);
        }
        Ok(queries)
    }

    fn translate_select(&self, select: &SelectStatement, sql: &str) -> Result<Query, Error> {
        let source = match select.from.as_slice() {
            [source] => source,
            [] => return Err(TranslationError::NotSupported("SELECT without FROM".into()).into()),
            _ => return Err(TranslationError::NotSupported("Comma-separated tables, use JOIN".into()).into()),
        };

        match MetadataResolver::tables(source)? {
            Some((kind, tables)) => {
                MetadataResolver::check_select(select)?;
                let query = self.select_fetch(select, sql)?;
                Ok(Query::Metadata(MetadataResolver::finish(query, kind, tables)?))
            }
            None => Ok(Query::Fetch(self.select_fetch(select, sql)?)),
        }
    }

    /// FROM, WHERE, grouping, select list, ORDER BY, then limits.
    fn select_fetch(&self, select: &SelectStatement, sql: &str) -> Result<FetchQuery, Error> {
        let Some(source) = select.from.first() else {
            return Err(TranslationError::NotSupported("SELECT without FROM".into()).into());
        };
        let mut ctx = JoinResolver::build_context(source, &self.metadata, &self.options)?;

        let mut used = vec![];
        let residual = match &select.criteria {
            Some(criteria) => PredicateResolver::apply_where(&mut ctx, criteria, &mut used)?,
            None => None,
        };

        if AggregateResolver::is_aggregate(select) {
            return AggregateResolver::translate(&ctx, select, residual, &used, sql);
        }

        ctx.ensure(&used)?;
        let mut extensions = vec![];
        if let Some(predicate) = residual {
            extensions.push(Extension::FilterRows { predicate });
        }

        let column_set = ProjectionResolver::apply(&mut ctx, &select.projection, &mut extensions)?;
        if select.distinct {
            let case_sensitive: Vec<String> =
                extensions.iter().filter_map(Extension::case_sensitive_output).map(str::to_string).collect();
            // the platform's DISTINCT folds case and only covers the attributes it returns
            ctx.fetch.distinct = case_sensitive.is_empty();
            if !extensions.is_empty() {
                extensions.push(Extension::Distinct { columns: DistinctColumn::for_outputs(&column_set, &case_sensitive) });
            }
        }

        OrderByResolver::apply(&mut ctx, &select.order_by, &select.projection, &column_set, &mut extensions)?;
        LimitResolver::apply(&mut ctx.fetch, select.top, select.offset, &mut extensions)?;

        Ok(FetchQuery { extensions, column_set, ..FetchQuery::new(sql, ctx.fetch) })
    }
}
