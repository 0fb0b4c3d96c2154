use crate::{
    extensions::{Extension, SortKey},
    fetch::FetchOrder,
    metadata::ResolvedColumn,
    parser::ast::{Column, Literal, OrderBy, ScalarExpr, SelectItem},
    translator::{ScalarResolver, TranslationContext, TranslationError},
    Error,
};

/// Where a single ORDER BY key can be evaluated.
enum SortTarget {
    Native(ResolvedColumn),
    /// Row-key expression plus the attributes it reads.
    Local(ScalarExpr, Vec<ResolvedColumn>),
}

pub struct OrderByResolver;

impl OrderByResolver {
    /// Emits native orders as long as they follow document order; from the first key that
    /// can't be native on, a single `Sort` step carries every key.
    pub fn apply(
        ctx: &mut TranslationContext,
        order_by: &[OrderBy],
        projection: &[SelectItem],
        column_set: &[String],
        extensions: &mut Vec<Extension>,
    ) -> Result<(), Error> {
        let mut targets = Vec::with_capacity(order_by.len());
        for key in order_by {
            targets.push((Self::resolve_key(ctx, &key.expr, projection, column_set)?, key.descending));
        }

        let mut natives = vec![];
        let mut last_path: Option<Vec<usize>> = None;
        let mut fallback = false;
        for (target, descending) in &targets {
            let SortTarget::Native(column) = target else {
                fallback = true;
                break;
            };
            let path = ctx.chain.get(column.scope).path.clone();
            if last_path.as_ref().is_some_and(|last| path < *last) {
                fallback = true;
                break;
            }
            last_path = Some(path);
            natives.push((column.clone(), *descending));
        }

        for (column, descending) in natives {
            let is_root = ctx.chain.get(column.scope).is_root();
            let entity = ctx.entity_mut(column.scope)?;
            if is_root {
                entity.ensure_attribute(&column.attribute);
            }
            entity.orders.push(FetchOrder::attribute(&column.attribute, descending));
        }

        if fallback {
            let mut keys = Vec::with_capacity(targets.len());
            for (target, descending) in targets {
                let expr = match target {
                    SortTarget::Native(column) => {
                        ctx.ensure(std::slice::from_ref(&column))?;
                        ScalarExpr::Column(ctx.chain.qualified(&column))
                    }
                    SortTarget::Local(expr, used) => {
                        ctx.ensure(&used)?;
                        expr
                    }
                };
                keys.push(SortKey { expr, descending });
            }
            extensions.push(Extension::Sort { keys });
        }
        Ok(())
    }

    fn resolve_key(ctx: &TranslationContext, expr: &ScalarExpr, projection: &[SelectItem], column_set: &[String]) -> Result<SortTarget, Error> {
        if let ScalarExpr::Column(Column { collection: None, name, .. }) = expr {
            let aliased = projection
                .iter()
                .find_map(|p| p.alias.as_deref().filter(|a| a.eq_ignore_ascii_case(name)).map(|a| (p, a)));
            if let Some((item, alias)) = aliased {
                return Self::resolve_select_item(ctx, item, alias);
            }
        }

        if let ScalarExpr::Literal(Literal::Int(ordinal)) = expr {
            let wildcard = projection.iter().any(|p| matches!(p.expr, ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_)));
            let index = usize::try_from(*ordinal).ok().and_then(|n| n.checked_sub(1));
            return match index {
                Some(i) if !wildcard && i < projection.len() => Self::resolve_select_item(ctx, &projection[i], &column_set[i]),
                _ => Err(TranslationError::InvalidColumn(format!("ORDER BY {}", ordinal)).into()),
            };
        }

        let mut used = vec![];
        let qualified = ScalarResolver::qualify_scalar(expr, ctx, &mut used)?;
        match (expr, used.as_slice()) {
            (ScalarExpr::Column(_), [column]) => Ok(SortTarget::Native(column.clone())),
            _ => Ok(SortTarget::Local(qualified, used)),
        }
    }

    /// A select item as a sort key: its attribute when it projects one, else its output.
    fn resolve_select_item(ctx: &TranslationContext, item: &SelectItem, output: &str) -> Result<SortTarget, Error> {
        if let ScalarExpr::Column(column) = &item.expr {
            if let Some(resolved) = ctx.resolve(column)? {
                return Ok(SortTarget::Native(resolved));
            }
        }
        Ok(SortTarget::Local(ScalarExpr::Column(Column::name(output)), vec![]))
    }
}
