use std::sync::Arc;

use tracing::trace;

use crate::{
    fetch::{FetchEntity, FetchLinkEntity, FetchXml, FilterType, LinkType},
    metadata::{AttributeMetadataCache, EntityMetadata, ScopeChain, TableScope},
    parser::ast::{ComparatorOp, Join, JoinType, Predicate, ScalarExpr, TableReference, TableSource},
    translator::{PredicateResolver, TranslationContext, TranslationError, TranslatorOptions},
    Error,
};

/// The equality that links a joined table to one already in scope.
struct LinkColumns {
    parent: usize,
    from: String,
    to: String,
}

pub struct JoinResolver;

impl JoinResolver {
    /// Builds the scope chain and link-entity tree for one FROM source.
    pub fn build_context<'a>(
        source: &TableSource,
        cache: &AttributeMetadataCache,
        options: &'a TranslatorOptions,
    ) -> Result<TranslationContext<'a>, Error> {
        let source = Self::normalize_right_join(source)?;
        let metadata = cache.get(&source.table.name)?;

        let root = Self::scope_for(&source.table, metadata.clone(), vec![], None);
        let mut fetch = FetchXml::new(&metadata.logical_name);
        fetch.no_lock = source.table.no_lock || source.joins.iter().any(|j| j.table.no_lock);

        let mut ctx = TranslationContext::new(options, ScopeChain::new(root), fetch);
        for join in &source.joins {
            Self::add_join(&mut ctx, join, cache)?;
        }
        Ok(ctx)
    }

    fn scope_for(table: &TableReference, metadata: Arc<EntityMetadata>, path: Vec<usize>, link_type: Option<LinkType>) -> TableScope {
        TableScope {
            alias: table.alias.clone().unwrap_or_else(|| metadata.logical_name.clone()),
            entity_name: metadata.logical_name.clone(),
            metadata,
            path,
            link_type,
        }
    }

    /// `A RIGHT JOIN B ON ...` as the first join is `B LEFT JOIN A ON ...`; anywhere
    /// else the rows kept would depend on joins the link tree can't express.
    fn normalize_right_join(source: &TableSource) -> Result<TableSource, Error> {
        if source.joins.iter().skip(1).any(|j| j.join_type == JoinType::RightOuter) {
            return Err(TranslationError::NotSupported("RIGHT OUTER JOIN after another join".into()).into());
        }
        match source.joins.split_first() {
            Some((first, rest)) if first.join_type == JoinType::RightOuter => {
                let mut joins = vec![Join { join_type: JoinType::LeftOuter, table: source.table.clone(), on: first.on.clone() }];
                joins.extend(rest.iter().cloned());
                Ok(TableSource { table: first.table.clone(), joins })
            }
            _ => Ok(source.clone()),
        }
    }

    fn add_join(ctx: &mut TranslationContext, join: &Join, cache: &AttributeMetadataCache) -> Result<(), Error> {
        let link_type = match join.join_type {
            JoinType::Inner => LinkType::Inner,
            JoinType::LeftOuter => LinkType::Outer,
            JoinType::RightOuter => return Err(TranslationError::NotSupported("RIGHT OUTER JOIN".into()).into()),
            JoinType::FullOuter => return Err(TranslationError::NotSupported("FULL OUTER JOIN".into()).into()),
        };
        let metadata = cache.get(&join.table.name)?;

        // bind the ON clause against a chain that already contains the new table
        let mut bound = ctx.chain.clone();
        let index = bound.push(Self::scope_for(&join.table, metadata.clone(), vec![usize::MAX], Some(link_type)))?;

        let mut link_columns = None;
        let mut confined = vec![];
        for conjunct in join.on.conjuncts() {
            if link_columns.is_none() {
                if let Some(found) = Self::link_columns(&bound, &conjunct, index)? {
                    link_columns = Some(found);
                    continue;
                }
            }
            let mut scopes = vec![];
            for column in conjunct.columns() {
                scopes.push(bound.resolve(&column)?.scope);
            }
            if scopes.iter().all(|s| *s == index) {
                confined.push(conjunct);
            } else {
                return Err(TranslationError::InvalidJoin(format!("{} - rewrite as WHERE clause", conjunct)).into());
            }
        }

        let scope = Self::scope_for(&join.table, metadata.clone(), vec![], Some(link_type));
        let LinkColumns { parent, from, to } = link_columns.ok_or_else(|| {
            TranslationError::InvalidJoin(format!("{} - no equality between {} and a previous table", join.on, scope.alias))
        })?;

        let parent_entity = ctx.entity_mut(parent)?;
        let position = parent_entity.links.len();
        parent_entity.links.push(FetchLinkEntity {
            from,
            to,
            alias: scope.alias.clone(),
            link_type,
            entity: FetchEntity::new(&metadata.logical_name),
        });

        let mut path = ctx.chain.get(parent).path.clone();
        path.push(position);
        trace!(alias = %scope.alias, ?path, "linked table");
        let index = ctx.chain.push(TableScope { path, ..scope })?;

        if confined.is_empty() {
            return Ok(());
        }
        let mut items = Vec::with_capacity(confined.len());
        for conjunct in &confined {
            let conjunct = PredicateResolver::push_not(conjunct.clone());
            match PredicateResolver::native(ctx, &conjunct)? {
                Some((_, item)) => items.push(item),
                None => return Err(TranslationError::InvalidJoin(format!("{} - rewrite as WHERE clause", conjunct)).into()),
            }
        }
        ctx.entity_mut(index)?.add_filter(PredicateResolver::group(FilterType::And, items));
        Ok(())
    }

    /// `new.x = previous.y` between plain columns.
    fn link_columns(chain: &ScopeChain, conjunct: &Predicate, index: usize) -> Result<Option<LinkColumns>, Error> {
        let Predicate::Compare { left: ScalarExpr::Column(left), op: ComparatorOp::Eq, right: ScalarExpr::Column(right) } = conjunct else {
            return Ok(None);
        };
        let (left, right) = (chain.resolve(left)?, chain.resolve(right)?);
        let (new, previous) = match (left.scope == index, right.scope == index) {
            (true, false) => (left, right),
            (false, true) => (right, left),
            _ => return Ok(None),
        };
        Ok(Some(LinkColumns { parent: previous.scope, from: new.attribute, to: previous.attribute }))
    }
}
