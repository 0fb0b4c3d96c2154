use std::collections::HashSet;

use tracing::debug;

use crate::{
    engine::{ExecutionStrategy, FetchQuery},
    extensions::{AggregateColumn, DistinctColumn, Extension, GroupKey, SortKey},
    fetch::{AggregateType, FetchAttribute, FetchEntity, FetchOrder, FetchXml},
    metadata::ResolvedColumn,
    parser::ast::{Column, Literal, OrderBy, Predicate, ScalarExpr, SelectItem, SelectStatement},
    rewrite::{RewriteVisitor, RewriteVisitorBase},
    translator::{LimitResolver, ScalarResolver, TranslationContext, TranslationError},
    Error,
};

/// A GROUP BY key.
struct GroupSpec {
    expr: ScalarExpr,
    column: Option<ResolvedColumn>,
    used: Vec<ResolvedColumn>,
    output: String,
}

/// One distinct aggregate call found in the statement.
struct AggregateSpec {
    func: String,
    /// `None` counts rows.
    arg: Option<ScalarExpr>,
    /// The plain column aggregated natively; the primary id for COUNT(*).
    column: Option<ResolvedColumn>,
    used: Vec<ResolvedColumn>,
    distinct: bool,
    output: String,
    /// The qualified call, used to find it again in rewritten expressions.
    key: ScalarExpr,
}

impl AggregateSpec {
    fn aggregate_type(&self) -> AggregateType {
        match (self.func.as_str(), &self.arg) {
            ("count", None) => AggregateType::Count,
            ("count", Some(_)) => AggregateType::CountColumn,
            ("sum", _) => AggregateType::Sum,
            ("avg", _) => AggregateType::Avg,
            ("min", _) => AggregateType::Min,
            _ => AggregateType::Max,
        }
    }
}

/// Output column names, unique regardless of case.
#[derive(Default)]
struct OutputNames(HashSet<String>);

impl OutputNames {
    fn reserve(&mut self, name: &str) {
        self.0.insert(name.to_ascii_lowercase());
    }

    fn allocate(&mut self, base: &str) -> String {
        if self.0.insert(base.to_ascii_lowercase()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.0.insert(candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// The post-grouping parts of the statement, with every group key and aggregate replaced
/// by the column holding it.
struct Rewritten {
    projection: Vec<SelectItem>,
    having: Option<Predicate>,
    order_by: Vec<OrderBy>,
}

pub struct AggregateResolver;

impl AggregateResolver {
    pub fn is_aggregate(select: &SelectStatement) -> bool {
        !select.group_by.is_empty()
            || select.having.is_some()
            || select.projection.iter().any(|p| p.expr.contains_aggregate())
            || select.order_by.iter().any(|o| o.expr.contains_aggregate())
    }

    /// Builds the native aggregate fetch when the platform can answer the query, and
    /// always the non-aggregate alternative that groups retrieved rows locally.
    pub fn translate(
        ctx: &TranslationContext,
        select: &SelectStatement,
        residual: Option<Predicate>,
        where_used: &[ResolvedColumn],
        sql: &str,
    ) -> Result<FetchQuery, Error> {
        if select.projection.iter().any(|p| matches!(p.expr, ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_))) {
            return Err(TranslationError::NotSupported("SELECT * in an aggregate query".into()).into());
        }
        let order_by = Self::order_by_select_items(select)?;

        let mut names = OutputNames::default();
        for alias in select.projection.iter().filter_map(|p| p.alias.as_deref()) {
            names.reserve(alias);
        }
        let groups = Self::groups(ctx, select, &mut names)?;
        let aggregates = Self::aggregates(ctx, select, &order_by, &mut names)?;

        let mut visitor = RewriteVisitor::default();
        for group in &groups {
            visitor.insert(&group.expr, &group.output);
        }
        for aggregate in &aggregates {
            visitor.insert(&aggregate.key, &aggregate.output);
        }
        let rewritten = Self::rewrite(ctx, select, &order_by, &visitor)?;

        let outputs: HashSet<String> = groups
            .iter()
            .map(|g| g.output.to_ascii_lowercase())
            .chain(aggregates.iter().map(|a| a.output.to_ascii_lowercase()))
            .collect();
        Self::check_grouped(&rewritten, &outputs)?;

        // steps after grouping, identical for both plans
        let mut post = vec![];
        if let Some(predicate) = &rewritten.having {
            post.push(Extension::Having { predicate: predicate.clone() });
        }
        let column_set = Self::project(&rewritten.projection, &mut post);

        let native_possible = residual.is_none()
            && groups.iter().all(|g| g.column.is_some())
            && aggregates.iter().all(|a| a.column.is_some());

        let alternative = Self::alternative(ctx, select, residual, where_used, &groups, &aggregates, &rewritten, post.clone(), &column_set, sql)?;
        if !native_possible {
            debug!(sql, "aggregate can't be expressed natively, grouping locally");
            return Ok(alternative);
        }

        let mut fetch = ctx.fetch.clone();
        fetch.aggregate = true;
        fetch.distinct = false;
        for group in &groups {
            let Some(column) = &group.column else { continue };
            ctx_entity(ctx, &mut fetch, column.scope)?.attributes.push(FetchAttribute {
                group_by: true,
                ..FetchAttribute::aliased(&column.attribute, &group.output)
            });
        }
        for aggregate in &aggregates {
            let Some(column) = &aggregate.column else { continue };
            ctx_entity(ctx, &mut fetch, column.scope)?.attributes.push(FetchAttribute {
                aggregate: Some(aggregate.aggregate_type()),
                distinct: aggregate.distinct,
                ..FetchAttribute::aliased(&column.attribute, &aggregate.output)
            });
        }

        let mut extensions = post;
        Self::native_orders(ctx, &mut fetch, &rewritten.order_by, &groups, &aggregates, &mut extensions)?;
        if select.distinct {
            let case_sensitive = Self::case_sensitive_outputs(&groups, &extensions);
            extensions.push(Extension::Distinct { columns: DistinctColumn::for_outputs(&column_set, &case_sensitive) });
        }
        LimitResolver::apply(&mut fetch, select.top, select.offset, &mut extensions)?;

        Ok(FetchQuery {
            extensions,
            column_set,
            strategy: ExecutionStrategy::Aggregate { alternative: Box::new(alternative) },
            ..FetchQuery::new(sql, fetch)
        })
    }

    /// ORDER BY keys that name a select alias or ordinal are replaced by that item's
    /// expression, so they rewrite like the select list does.
    fn order_by_select_items(select: &SelectStatement) -> Result<Vec<OrderBy>, Error> {
        let mut out = Vec::with_capacity(select.order_by.len());
        for key in &select.order_by {
            let expr = match &key.expr {
                ScalarExpr::Column(Column { collection: None, name, .. }) => select
                    .projection
                    .iter()
                    .find(|p| p.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name)))
                    .map(|p| p.expr.clone())
                    .unwrap_or_else(|| key.expr.clone()),
                ScalarExpr::Literal(Literal::Int(ordinal)) => {
                    let item = usize::try_from(*ordinal).ok().and_then(|n| n.checked_sub(1)).and_then(|i| select.projection.get(i));
                    match item {
                        Some(item) => item.expr.clone(),
                        None => return Err(TranslationError::InvalidColumn(format!("ORDER BY {}", ordinal)).into()),
                    }
                }
                other => other.clone(),
            };
            out.push(OrderBy { expr, descending: key.descending });
        }
        Ok(out)
    }

    fn groups(ctx: &TranslationContext, select: &SelectStatement, names: &mut OutputNames) -> Result<Vec<GroupSpec>, Error> {
        let mut groups: Vec<GroupSpec> = vec![];
        for expr in &select.group_by {
            let mut used = vec![];
            let qualified = ScalarResolver::qualify_scalar(expr, ctx, &mut used)?;
            if groups.iter().any(|g| g.expr == qualified) {
                continue;
            }
            let column = match (expr, used.as_slice()) {
                (ScalarExpr::Column(_), [column]) => Some(column.clone()),
                _ => None,
            };
            let output = match Self::projected_alias(ctx, select, &qualified)? {
                Some(alias) => alias,
                None => names.allocate(column.as_ref().map(|c| c.attribute.as_str()).unwrap_or("expr")),
            };
            groups.push(GroupSpec { expr: qualified, column, used, output });
        }
        Ok(groups)
    }

    /// The explicit alias of a select item that is exactly `qualified`.
    fn projected_alias(ctx: &TranslationContext, select: &SelectStatement, qualified: &ScalarExpr) -> Result<Option<String>, Error> {
        for item in &select.projection {
            let Some(alias) = &item.alias else { continue };
            let mut ignored = vec![];
            if ScalarResolver::qualify_scalar(&item.expr, ctx, &mut ignored)? == *qualified {
                return Ok(Some(alias.clone()));
            }
        }
        Ok(None)
    }

    /// Aggregate calls in the order the select list, HAVING and ORDER BY mention them.
    fn aggregates(ctx: &TranslationContext, select: &SelectStatement, order_by: &[OrderBy], names: &mut OutputNames) -> Result<Vec<AggregateSpec>, Error> {
        let mut calls = vec![];
        let mut collect = |e: &ScalarExpr| {
            if let ScalarExpr::Function(f) = e {
                if f.is_aggregate() {
                    calls.push(f.clone());
                }
            }
        };
        for item in &select.projection {
            item.expr.walk(&mut collect);
        }
        if let Some(having) = &select.having {
            having.walk_scalars(&mut collect);
        }
        for key in order_by {
            key.expr.walk(&mut collect);
        }

        let root = ctx.chain.root();
        let mut aggregates: Vec<AggregateSpec> = vec![];
        for call in calls {
            let mut used = vec![];
            let key = ScalarResolver::qualify_scalar(&ScalarExpr::Function(call.clone()), ctx, &mut used)?;
            if aggregates.iter().any(|a| a.key.to_string() == key.to_string()) {
                continue;
            }
            let func = call.name.to_ascii_lowercase();

            let (arg, column, base) = if call.is_count_star() {
                let pk = ResolvedColumn { scope: 0, attribute: root.metadata.primary_id_attribute.clone() };
                let base = format!("{}_count", pk.attribute);
                (None, Some(pk), base)
            } else {
                let [original] = call.args.as_slice() else {
                    return Err(TranslationError::NotSupported(format!("{} with {} arguments", func.to_uppercase(), call.args.len())).into());
                };
                if original.contains_aggregate() {
                    return Err(TranslationError::NotSupported("Nested aggregates".into()).into());
                }
                let mut arg_used = vec![];
                let arg = ScalarResolver::qualify_scalar(original, ctx, &mut arg_used)?;
                let column = match (original, arg_used.as_slice()) {
                    (ScalarExpr::Column(_), [column]) => Some(column.clone()),
                    _ => None,
                };
                let base = format!("{}_{}", column.as_ref().map(|c| c.attribute.as_str()).unwrap_or("expr"), func);
                (Some(arg), column, base)
            };

            let output = select
                .projection
                .iter()
                .find(|p| p.alias.is_some() && matches!(&p.expr, ScalarExpr::Function(f) if *f == call))
                .and_then(|p| p.alias.clone())
                .unwrap_or_else(|| names.allocate(&base));

            aggregates.push(AggregateSpec { func, arg, column, used, distinct: call.distinct, output, key });
        }
        Ok(aggregates)
    }

    fn rewrite(ctx: &TranslationContext, select: &SelectStatement, order_by: &[OrderBy], visitor: &RewriteVisitor) -> Result<Rewritten, Error> {
        let mut ignored = vec![];
        let mut statement = SelectStatement::default();
        for item in &select.projection {
            statement.projection.push(SelectItem {
                expr: ScalarResolver::qualify_scalar(&item.expr, ctx, &mut ignored)?,
                alias: item.alias.clone(),
            });
        }
        statement.having = match &select.having {
            Some(h) => Some(ScalarResolver::qualify_predicate(h, ctx, &mut ignored)?),
            None => None,
        };
        for key in order_by {
            statement.order_by.push(OrderBy {
                expr: ScalarResolver::qualify_scalar(&key.expr, ctx, &mut ignored)?,
                descending: key.descending,
            });
        }

        for item in statement.projection.iter_mut() {
            visitor.visit_select_item(item);
        }
        if let Some(having) = &mut statement.having {
            visitor.visit_predicate(having);
        }
        for key in statement.order_by.iter_mut() {
            visitor.visit_order_by(key);
        }

        Ok(Rewritten { projection: statement.projection, having: statement.having, order_by: statement.order_by })
    }

    /// After rewriting, everything evaluated per group may only read group keys and
    /// aggregate outputs.
    fn check_grouped(rewritten: &Rewritten, outputs: &HashSet<String>) -> Result<(), Error> {
        let mut columns: Vec<Column> = rewritten.projection.iter().flat_map(|p| p.expr.columns()).collect();
        if let Some(having) = &rewritten.having {
            columns.extend(having.columns());
        }
        columns.extend(rewritten.order_by.iter().flat_map(|o| o.expr.columns()));

        match columns.into_iter().find(|c| c.collection.is_some() || !outputs.contains(&c.name.to_ascii_lowercase())) {
            Some(column) => Err(TranslationError::InvalidColumn(format!(
                "{} - it is not contained in either an aggregate function or the GROUP BY clause",
                column
            ))
            .into()),
            None => Ok(()),
        }
    }

    /// Outputs that keep their case under DISTINCT: case-sensitive group keys and the
    /// computed columns built from them.
    fn case_sensitive_outputs(groups: &[GroupSpec], post: &[Extension]) -> Vec<String> {
        let mut outputs: Vec<String> = groups.iter().filter(|g| g.expr.is_case_sensitive()).map(|g| g.output.clone()).collect();
        for extension in post {
            let Extension::ComputeColumn { expr, output } = extension else { continue };
            let from_group = matches!(expr, ScalarExpr::Column(c) if outputs.iter().any(|o| o.eq_ignore_ascii_case(&c.name)));
            if expr.is_case_sensitive() || from_group {
                outputs.push(output.clone());
            }
        }
        outputs
    }

    /// Column set of the grouped rows; anything but a plain output becomes a computed column.
    fn project(projection: &[SelectItem], post: &mut Vec<Extension>) -> Vec<String> {
        let mut column_set = Vec::with_capacity(projection.len());
        let mut computed = 0;
        for item in projection {
            match (&item.expr, &item.alias) {
                (ScalarExpr::Column(c), None) => column_set.push(c.name.clone()),
                (ScalarExpr::Column(c), Some(alias)) if alias.eq_ignore_ascii_case(&c.name) => column_set.push(c.name.clone()),
                (expr, alias) => {
                    let output = match alias {
                        Some(alias) => alias.clone(),
                        None => {
                            computed += 1;
                            format!("Expr{}", computed)
                        }
                    };
                    post.push(Extension::ComputeColumn { expr: expr.clone(), output: output.clone() });
                    column_set.push(output);
                }
            }
        }
        column_set
    }

    /// Orders the native aggregate by output aliases, or leaves a `Sort` step when a key
    /// isn't an output or breaks document order.
    fn native_orders(
        ctx: &TranslationContext,
        fetch: &mut FetchXml,
        order_by: &[OrderBy],
        groups: &[GroupSpec],
        aggregates: &[AggregateSpec],
        extensions: &mut Vec<Extension>,
    ) -> Result<(), Error> {
        let mut orders = vec![];
        let mut last_path: Option<Vec<usize>> = None;
        for key in order_by {
            let scope = match &key.expr {
                ScalarExpr::Column(c) => groups
                    .iter()
                    .find(|g| g.output.eq_ignore_ascii_case(&c.name))
                    .and_then(|g| g.column.as_ref())
                    .or_else(|| aggregates.iter().find(|a| a.output.eq_ignore_ascii_case(&c.name)).and_then(|a| a.column.as_ref()))
                    .map(|column| (column.scope, c.name.clone())),
                _ => None,
            };
            let Some((scope, alias)) = scope else {
                orders.clear();
                break;
            };
            let path = ctx.chain.get(scope).path.clone();
            if last_path.as_ref().is_some_and(|last| path < *last) {
                orders.clear();
                break;
            }
            last_path = Some(path);
            orders.push((scope, FetchOrder::alias(&alias, key.descending)));
        }

        if orders.len() < order_by.len() {
            let keys = order_by.iter().map(|o| SortKey { expr: o.expr.clone(), descending: o.descending }).collect();
            extensions.push(Extension::Sort { keys });
            return Ok(());
        }
        for (scope, order) in orders {
            ctx_entity(ctx, fetch, scope)?.orders.push(order);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn alternative(
        ctx: &TranslationContext,
        select: &SelectStatement,
        residual: Option<Predicate>,
        where_used: &[ResolvedColumn],
        groups: &[GroupSpec],
        aggregates: &[AggregateSpec],
        rewritten: &Rewritten,
        post: Vec<Extension>,
        column_set: &[String],
        sql: &str,
    ) -> Result<FetchQuery, Error> {
        let mut fetch = ctx.fetch.clone();
        let mut needed: Vec<ResolvedColumn> = where_used.to_vec();
        for column in groups.iter().flat_map(|g| g.used.iter()).chain(aggregates.iter().flat_map(|a| a.used.iter())) {
            if !needed.contains(column) {
                needed.push(column.clone());
            }
        }
        for aggregate in aggregates.iter().filter(|a| a.arg.is_none()) {
            if let Some(pk) = &aggregate.column {
                if !needed.contains(pk) {
                    needed.push(pk.clone());
                }
            }
        }
        for column in &needed {
            ctx_entity(ctx, &mut fetch, column.scope)?.ensure_attribute(&column.attribute);
        }
        for column in groups.iter().filter_map(|g| g.column.as_ref()) {
            ctx_entity(ctx, &mut fetch, column.scope)?.orders.push(FetchOrder::attribute(&column.attribute, false));
        }

        let mut extensions = vec![];
        if let Some(predicate) = residual {
            extensions.push(Extension::FilterRows { predicate });
        }
        for group in groups {
            let Some(column) = &group.column else { continue };
            let is_string = ctx.chain.attribute_of(column).is_some_and(|a| a.attribute_type.is_string());
            if is_string {
                extensions.push(Extension::NormalizeCollationKey { column: ctx.chain.qualified(column) });
            }
        }
        extensions.push(Extension::Aggregate {
            groups: groups.iter().map(|g| GroupKey { expr: g.expr.clone(), output: g.output.clone() }).collect(),
            aggregates: aggregates
                .iter()
                .map(|a| AggregateColumn { func: a.func.clone(), arg: a.arg.clone(), distinct: a.distinct, output: a.output.clone() })
                .collect(),
        });
        let case_sensitive = Self::case_sensitive_outputs(groups, &post);
        extensions.extend(post);
        if !rewritten.order_by.is_empty() {
            let keys = rewritten.order_by.iter().map(|o| SortKey { expr: o.expr.clone(), descending: o.descending }).collect();
            extensions.push(Extension::Sort { keys });
        }
        if select.distinct {
            extensions.push(Extension::Distinct { columns: DistinctColumn::for_outputs(column_set, &case_sensitive) });
        }
        LimitResolver::apply(&mut fetch, select.top, select.offset, &mut extensions)?;

        Ok(FetchQuery { extensions, column_set: column_set.to_vec(), ..FetchQuery::new(sql, fetch) })
    }
}

/// The scope's entity inside a copy of the context's fetch tree.
fn ctx_entity<'f>(ctx: &TranslationContext, fetch: &'f mut FetchXml, scope: usize) -> Result<&'f mut FetchEntity, Error> {
    let table = ctx.chain.get(scope);
    fetch.entity.scope_mut(&table.path).ok_or_else(|| TranslationError::InvalidColumn(table.alias.clone()).into())
}
