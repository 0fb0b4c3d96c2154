use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    client::Value,
    extensions::split_values,
    fetch::{ConditionOperator, FetchCondition, FetchFilter, FilterItem, FilterType},
    metadata::{AttributeType, ResolvedColumn},
    parser::ast::{Column, ComparatorOp, Literal, Predicate, ScalarExpr, Truth},
    translator::{Operand, ScalarResolver, TranslationContext},
    Error,
};

pub struct PredicateResolver;

impl PredicateResolver {
    /// Pushes every NOT down to the leaves.
    pub fn push_not(predicate: Predicate) -> Predicate {
        match predicate {
            Predicate::Not(inner) => Self::negate(*inner),
            Predicate::And(items) => Predicate::And(items.into_iter().map(Self::push_not).collect()),
            Predicate::Or(items) => Predicate::Or(items.into_iter().map(Self::push_not).collect()),
            other => other,
        }
    }

    pub fn negate(predicate: Predicate) -> Predicate {
        match predicate {
            Predicate::And(items) => Predicate::Or(items.into_iter().map(Self::negate).collect()),
            Predicate::Or(items) => Predicate::And(items.into_iter().map(Self::negate).collect()),
            Predicate::Not(inner) => Self::push_not(*inner),
            Predicate::Compare { left, op, right } => Predicate::Compare { left, op: op.negated(), right },
            Predicate::IsNull { expr, negated } => Predicate::IsNull { expr, negated: !negated },
            Predicate::InList { expr, list, negated } => Predicate::InList { expr, list, negated: !negated },
            Predicate::Like { expr, pattern, negated } => Predicate::Like { expr, pattern, negated: !negated },
            Predicate::Const3(t) => Predicate::Const3(t.not()),
            full_text @ Predicate::FullText { .. } => Predicate::Not(Box::new(full_text)),
        }
    }

    /// A filter of the given type, or the single nested filter when it is the only item.
    pub fn group(filter_type: FilterType, mut items: Vec<FilterItem>) -> FetchFilter {
        if items.len() == 1 {
            if let Some(FilterItem::Filter(_)) = items.first() {
                if let Some(FilterItem::Filter(inner)) = items.pop() {
                    return inner;
                }
            }
        }
        FetchFilter::new(filter_type, items)
    }

    /// Splits WHERE into native filters, attached to their scopes, and a residual predicate
    /// the local pipeline has to evaluate. Columns the residual reads are added to `used`.
    pub fn apply_where(ctx: &mut TranslationContext, criteria: &Predicate, used: &mut Vec<ResolvedColumn>) -> Result<Option<Predicate>, Error> {
        let criteria = Self::push_not(ScalarResolver::fold_predicate(criteria));
        let mut native: IndexMap<usize, Vec<FilterItem>> = IndexMap::new();
        let mut local = vec![];

        for conjunct in criteria.conjuncts() {
            if conjunct == Predicate::Const3(Truth::True) {
                continue;
            }
            match Self::native(ctx, &conjunct)? {
                // outer joins keep unmatched rows, a filter inside the link would not remove them
                Some((scope, item)) if !ctx.chain.get(scope).is_outer() => native.entry(scope).or_default().push(item),
                _ => local.push(ScalarResolver::qualify_predicate(&conjunct, ctx, used)?),
            }
        }

        for (scope, items) in native {
            ctx.entity_mut(scope)?.add_filter(Self::group(FilterType::And, items));
        }
        Ok(Predicate::and_all(local))
    }

    /// The native form of `predicate` and the scope it filters, when the platform can
    /// evaluate it on its own.
    pub fn native(ctx: &TranslationContext, predicate: &Predicate) -> Result<Option<(usize, FilterItem)>, Error> {
        match predicate {
            Predicate::And(items) => Self::native_group(ctx, FilterType::And, items),
            Predicate::Or(items) => Self::native_group(ctx, FilterType::Or, items),
            Predicate::Compare { left, op, right } => Self::native_compare(ctx, left, *op, right),
            Predicate::IsNull { expr, negated } => {
                let Operand::Column(column) = ctx.operand(expr)? else { return Ok(None) };
                let operator = if *negated { ConditionOperator::NotNull } else { ConditionOperator::Null };
                Ok(Self::condition(ctx, &column, FetchCondition::new(&column.attribute, operator, None)))
            }
            Predicate::InList { expr, list, negated } => {
                let Operand::Column(column) = ctx.operand(expr)? else { return Ok(None) };
                let mut values = Vec::with_capacity(list.len());
                for item in list {
                    match ctx.operand(item)? {
                        Operand::Literal(l) if Self::compatible(ctx, &column, &l) => match l.to_native_value() {
                            Some(v) => values.push(v),
                            None => return Ok(None),
                        },
                        _ => return Ok(None),
                    }
                }
                let operator = if *negated { ConditionOperator::NotIn } else { ConditionOperator::In };
                Ok(Self::condition(ctx, &column, FetchCondition::multi(&column.attribute, operator, values)))
            }
            Predicate::Like { expr, pattern, negated } => {
                let (Operand::Column(column), Operand::Literal(Literal::String(pattern))) = (ctx.operand(expr)?, ctx.operand(pattern)?) else {
                    return Ok(None);
                };
                let operator = if *negated { ConditionOperator::NotLike } else { ConditionOperator::Like };
                Ok(Self::condition(ctx, &column, FetchCondition::new(&column.attribute, operator, Some(pattern))))
            }
            Predicate::FullText { column, value } => Self::native_full_text(ctx, column, value, ConditionOperator::ContainValues),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::FullText { column, value } => Self::native_full_text(ctx, column, value, ConditionOperator::NotContainValues),
                _ => Ok(None),
            },
            Predicate::Const3(_) => Ok(None),
        }
    }

    fn native_group(ctx: &TranslationContext, filter_type: FilterType, items: &[Predicate]) -> Result<Option<(usize, FilterItem)>, Error> {
        let mut scope = None;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match Self::native(ctx, item)? {
                Some((s, native)) if scope.is_none_or(|current| current == s) => {
                    scope = Some(s);
                    out.push(native);
                }
                _ => return Ok(None),
            }
        }
        Ok(scope.map(|s| (s, FilterItem::Filter(FetchFilter::new(filter_type, out)))))
    }

    fn native_compare(ctx: &TranslationContext, left: &ScalarExpr, op: ComparatorOp, right: &ScalarExpr) -> Result<Option<(usize, FilterItem)>, Error> {
        let operator = |op: ComparatorOp| match op {
            ComparatorOp::Eq => ConditionOperator::Equal,
            ComparatorOp::NotEq => ConditionOperator::NotEqual,
            ComparatorOp::Lt => ConditionOperator::LessThan,
            ComparatorOp::LtEq => ConditionOperator::LessEqual,
            ComparatorOp::Gt => ConditionOperator::GreaterThan,
            ComparatorOp::GtEq => ConditionOperator::GreaterEqual,
        };

        match (ctx.operand(left)?, ctx.operand(right)?) {
            (Operand::Column(column), Operand::Literal(literal)) => Ok(Self::literal_condition(ctx, &column, operator(op), &literal)),
            (Operand::Literal(literal), Operand::Column(column)) => {
                Ok(Self::literal_condition(ctx, &column, operator(op.reversed()), &literal))
            }
            (Operand::Column(a), Operand::Column(b)) if ctx.options.column_comparison_available && a.scope == b.scope => {
                Ok(Self::condition(ctx, &a, FetchCondition::value_of(&a.attribute, operator(op), &b.attribute)))
            }
            (Operand::Column(column), Operand::Expression) if op == ComparatorOp::Eq => match right {
                ScalarExpr::Function(f) => {
                    let Some(function) = ConditionOperator::from_function_name(&f.name) else { return Ok(None) };
                    let mut values = Vec::with_capacity(f.args.len());
                    for arg in &f.args {
                        match ctx.operand(arg)? {
                            Operand::Literal(l) => match l.to_native_value() {
                                Some(v) => values.push(v),
                                None => return Ok(None),
                            },
                            _ => return Ok(None),
                        }
                    }
                    let condition = match (function.value_count(), values.len()) {
                        (0, 0) => FetchCondition::new(&column.attribute, function, None),
                        (1, 1) => FetchCondition::new(&column.attribute, function, values.pop()),
                        (usize::MAX, n) if n > 0 => FetchCondition::multi(&column.attribute, function, values),
                        _ => return Ok(None),
                    };
                    Ok(Self::condition(ctx, &column, condition))
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn native_full_text(
        ctx: &TranslationContext,
        column: &Column,
        value: &ScalarExpr,
        operator: ConditionOperator,
    ) -> Result<Option<(usize, FilterItem)>, Error> {
        let Some(column) = ctx.resolve(column)? else { return Ok(None) };
        let Operand::Literal(Literal::String(text)) = ctx.operand(value)? else { return Ok(None) };
        Ok(Self::condition(ctx, &column, FetchCondition::multi(&column.attribute, operator, split_values(&text))))
    }

    fn literal_condition(ctx: &TranslationContext, column: &ResolvedColumn, operator: ConditionOperator, literal: &Literal) -> Option<(usize, FilterItem)> {
        // NULL never compares equal; only IS NULL maps to a native null check
        let value = literal.to_native_value()?;
        if !Self::compatible(ctx, column, literal) {
            return None;
        }
        Self::condition(ctx, column, FetchCondition::new(&column.attribute, operator, Some(value)))
    }

    fn condition(ctx: &TranslationContext, column: &ResolvedColumn, condition: FetchCondition) -> Option<(usize, FilterItem)> {
        let attribute = ctx.chain.attribute_of(column)?;
        if !attribute.attribute_type.supports(condition.operator) {
            return None;
        }
        Some((column.scope, FilterItem::Condition(condition)))
    }

    /// Whether the platform would accept `literal` as a value of the column's type.
    fn compatible(ctx: &TranslationContext, column: &ResolvedColumn, literal: &Literal) -> bool {
        let Some(attribute) = ctx.chain.attribute_of(column) else { return false };
        let kind = attribute.attribute_type;
        match literal {
            Literal::String(s) if kind.is_numeric() || matches!(kind, AttributeType::Picklist | AttributeType::State | AttributeType::Status) => {
                s.trim().parse::<f64>().is_ok()
            }
            Literal::String(s) if kind == AttributeType::DateTime => Value::parse_datetime(s).is_some(),
            Literal::String(s) if kind.is_lookup() || kind == AttributeType::Uniqueidentifier => Uuid::parse_str(s).is_ok(),
            Literal::String(s) if kind == AttributeType::Boolean => matches!(s.as_str(), "0" | "1" | "true" | "false"),
            Literal::Int(_) | Literal::Float(_) | Literal::Bool(_) => !(kind.is_string() || kind.is_lookup() || kind == AttributeType::Uniqueidentifier || kind == AttributeType::DateTime),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        parser::{ast::{ComparatorOp, Predicate}, QueryParser},
        translator::PredicateResolver,
    };

    fn predicate(text: &str) -> Predicate {
        let mut parser = QueryParser::new(text).unwrap();
        Predicate::parse(&mut parser).unwrap()
    }

    #[test]
    fn not_is_pushed_to_the_leaves() {
        let pushed = PredicateResolver::push_not(predicate("NOT (firstname = 'a' OR lastname IS NULL)"));
        let Predicate::And(items) = pushed else { panic!("expected AND") };
        assert!(matches!(&items[0], Predicate::Compare { op: ComparatorOp::NotEq, .. }));
        assert!(matches!(&items[1], Predicate::IsNull { negated: true, .. }));
    }

    #[test]
    fn double_negation_cancels() {
        let original = predicate("firstname LIKE 'M%'");
        let pushed = PredicateResolver::push_not(predicate("NOT (NOT (firstname LIKE 'M%'))"));
        assert_eq!(pushed, original);
    }
}
