use crate::{
    engine::{DeleteQuery, FetchQuery, QueryState, UpdateColumn, UpdateQuery},
    extensions::Extension,
    metadata::{AttributeMetadataCache, ResolutionError, ResolvedColumn},
    parser::ast::{DeleteStatement, Predicate, TableReference, TableSource, UpdateStatement},
    translator::{JoinResolver, PredicateResolver, ScalarResolver, TranslationContext, TranslationError, TranslatorOptions},
    Error,
};

/// Record selection shared by UPDATE and DELETE.
struct Selection<'a> {
    ctx: TranslationContext<'a>,
    target: usize,
    used: Vec<ResolvedColumn>,
    residual: Option<Predicate>,
}

pub struct DmlResolver;

impl DmlResolver {
    pub fn update(statement: &UpdateStatement, sql: &str, cache: &AttributeMetadataCache, options: &TranslatorOptions) -> Result<UpdateQuery, Error> {
        let Selection { mut ctx, target, mut used, residual } =
            Self::selection(&statement.target, statement.from.as_ref(), statement.criteria.as_ref(), cache, options)?;

        let table = ctx.chain.get(target).clone();
        let mut updates = Vec::with_capacity(statement.assignments.len());
        for assignment in &statement.assignments {
            let column = &assignment.column;
            if let Some(collection) = &column.collection {
                if ctx.chain.find_alias(collection) != Some(target) {
                    return Err(TranslationError::InvalidColumn(format!("{} - only {} can be updated", column, table.alias)).into());
                }
            }
            let attribute = table.metadata.attribute(&column.name).ok_or_else(|| ResolutionError::UnknownAttribute {
                entity: table.entity_name.clone(),
                attribute: column.name.clone(),
            })?;
            let value = ScalarResolver::qualify_scalar(&assignment.value, &ctx, &mut used)?;
            updates.push(UpdateColumn { attribute: attribute.logical_name.clone(), value });
        }

        let (source, id_column) = Self::source(&mut ctx, target, used, residual, sql)?;
        Ok(UpdateQuery {
            sql: sql.to_string(),
            source,
            entity_name: table.entity_name,
            id_column,
            updates,
            has_where: statement.criteria.is_some(),
            state: QueryState::Created,
        })
    }

    pub fn delete(statement: &DeleteStatement, sql: &str, cache: &AttributeMetadataCache, options: &TranslatorOptions) -> Result<DeleteQuery, Error> {
        let Selection { mut ctx, target, used, residual } =
            Self::selection(&statement.target, statement.from.as_ref(), statement.criteria.as_ref(), cache, options)?;

        let entity_name = ctx.chain.get(target).entity_name.clone();
        let (source, id_column) = Self::source(&mut ctx, target, used, residual, sql)?;
        Ok(DeleteQuery {
            sql: sql.to_string(),
            source,
            entity_name,
            id_column,
            target_is_root: target == 0,
            has_where: statement.criteria.is_some(),
            state: QueryState::Created,
        })
    }

    fn selection<'a>(
        target: &TableReference,
        from: Option<&TableSource>,
        criteria: Option<&Predicate>,
        cache: &AttributeMetadataCache,
        options: &'a TranslatorOptions,
    ) -> Result<Selection<'a>, Error> {
        let source = match from {
            Some(source) => source.clone(),
            None => TableSource { table: target.clone(), joins: vec![] },
        };
        let mut ctx = JoinResolver::build_context(&source, cache, options)?;

        // `UPDATE a ... FROM account a` names the alias, `UPDATE account ... FROM account` the table
        let target = ctx
            .chain
            .find_alias(target.exposed_name())
            .or_else(|| {
                let mut matches = ctx.chain.iter().enumerate().filter(|(_, s)| s.entity_name.eq_ignore_ascii_case(&target.name));
                match (matches.next(), matches.next()) {
                    (Some((index, _)), None) => Some(index),
                    _ => None,
                }
            })
            .ok_or_else(|| ResolutionError::UnknownAlias(target.exposed_name().to_string()))?;

        let mut used = vec![];
        let residual = match criteria {
            Some(criteria) => PredicateResolver::apply_where(&mut ctx, criteria, &mut used)?,
            None => None,
        };
        Ok(Selection { ctx, target, used, residual })
    }

    /// The distinct selection query: attributes read locally, then the target's id.
    fn source(
        ctx: &mut TranslationContext,
        target: usize,
        mut used: Vec<ResolvedColumn>,
        residual: Option<Predicate>,
        sql: &str,
    ) -> Result<(FetchQuery, String), Error> {
        let id = ResolvedColumn { scope: target, attribute: ctx.chain.get(target).metadata.primary_id_attribute.clone() };
        if !used.contains(&id) {
            used.push(id.clone());
        }
        ctx.ensure(&used)?;
        ctx.fetch.distinct = true;

        let id_column = ctx.row_key(&id);
        let mut query = FetchQuery::new(sql, ctx.fetch.clone());
        if let Some(predicate) = residual {
            query.extensions.push(Extension::FilterRows { predicate });
        }
        query.column_set = vec![id_column.clone()];
        Ok((query, id_column))
    }
}
