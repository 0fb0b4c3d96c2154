use crate::{
    extensions::Extension,
    fetch::FetchAttribute,
    metadata::ResolutionError,
    parser::ast::{ScalarExpr, SelectItem},
    translator::{ScalarResolver, TranslationContext},
    Error,
};

pub struct ProjectionResolver;

impl ProjectionResolver {
    /// Adds the select list to the native query and returns the caller-visible columns.
    /// Expressions the platform can't return become `ComputeColumn` steps.
    pub fn apply(ctx: &mut TranslationContext, projection: &[SelectItem], extensions: &mut Vec<Extension>) -> Result<Vec<String>, Error> {
        let mut column_set = vec![];
        let mut computed = 0;

        for item in projection {
            match &item.expr {
                ScalarExpr::WildCard => {
                    for scope in 0..ctx.chain.len() {
                        column_set.extend(Self::all_attributes(ctx, scope)?);
                    }
                }
                ScalarExpr::WildCardWithCollection(alias) => {
                    let scope = ctx.chain.find_alias(alias).ok_or_else(|| ResolutionError::UnknownAlias(alias.clone()))?;
                    column_set.extend(Self::all_attributes(ctx, scope)?);
                }
                ScalarExpr::Column(column) => match ctx.resolve(column)? {
                    Some(resolved) => match &item.alias {
                        None => {
                            ctx.entity_mut(resolved.scope)?.ensure_attribute(&resolved.attribute);
                            column_set.push(ctx.row_key(&resolved));
                        }
                        Some(alias) => {
                            ctx.entity_mut(resolved.scope)?.attributes.push(FetchAttribute::aliased(&resolved.attribute, alias));
                            column_set.push(alias.clone());
                        }
                    },
                    None => column_set.push(Self::compute(ctx, item, &mut computed, extensions)?),
                },
                _ => column_set.push(Self::compute(ctx, item, &mut computed, extensions)?),
            }
        }
        Ok(column_set)
    }

    fn compute(ctx: &mut TranslationContext, item: &SelectItem, computed: &mut usize, extensions: &mut Vec<Extension>) -> Result<String, Error> {
        let mut used = vec![];
        let expr = ScalarResolver::qualify_scalar(&item.expr, ctx, &mut used)?;
        ctx.ensure(&used)?;

        let output = match &item.alias {
            Some(alias) => alias.clone(),
            None => {
                *computed += 1;
                format!("Expr{}", computed)
            }
        };
        extensions.push(Extension::ComputeColumn { expr, output: output.clone() });
        Ok(output)
    }

    /// Switches a scope to `<all-attributes/>`; returns its row keys in name order.
    fn all_attributes(ctx: &mut TranslationContext, scope: usize) -> Result<Vec<String>, Error> {
        ctx.entity_mut(scope)?.all_attributes = true;
        let table = ctx.chain.get(scope);
        Ok(table
            .metadata
            .sorted_attribute_names()
            .into_iter()
            .map(|name| if table.is_root() { name } else { format!("{}.{}", table.alias, name) })
            .collect())
    }
}
