use crate::{
    extensions::Eval,
    metadata::ResolvedColumn,
    parser::ast::{Function, Literal, Predicate, ScalarExpr},
    translator::{TranslationContext, TranslationError},
    Error,
};

pub struct ScalarResolver;

impl ScalarResolver {
    /// Rewrites column references into row keys of the retrieved rows, recording every
    /// bound column in `used` (first occurrence order).
    pub fn qualify_scalar(expr: &ScalarExpr, ctx: &TranslationContext, used: &mut Vec<ResolvedColumn>) -> Result<ScalarExpr, Error> {
        match expr {
            ScalarExpr::Column(c) => match ctx.resolve(c)? {
                Some(resolved) => {
                    let qualified = ctx.chain.qualified(&resolved);
                    if !used.contains(&resolved) {
                        used.push(resolved);
                    }
                    Ok(ScalarExpr::Column(qualified))
                }
                None => Ok(ScalarExpr::Literal(Literal::String(c.name.clone()))),
            },

            ScalarExpr::Function(f) if f.is_count_star() => Ok(expr.clone()),

            ScalarExpr::Function(Function { name, args, distinct }) => {
                let mut new_args = Vec::with_capacity(args.len());
                for arg in args {
                    new_args.push(Self::qualify_scalar(arg, ctx, used)?);
                }
                Ok(ScalarExpr::Function(Function { name: name.clone(), args: new_args, distinct: *distinct }))
            }

            ScalarExpr::Binary { left, op, right } => Ok(ScalarExpr::Binary {
                left: Box::new(Self::qualify_scalar(left, ctx, used)?),
                op: *op,
                right: Box::new(Self::qualify_scalar(right, ctx, used)?),
            }),

            ScalarExpr::Unary { op, expr } => {
                Ok(ScalarExpr::Unary { op: *op, expr: Box::new(Self::qualify_scalar(expr, ctx, used)?) })
            }

            ScalarExpr::Collate { expr, collation } => Ok(ScalarExpr::Collate {
                expr: Box::new(Self::qualify_scalar(expr, ctx, used)?),
                collation: collation.clone(),
            }),

            ScalarExpr::SearchedCase { whens, else_expr } => {
                let mut new_whens = Vec::with_capacity(whens.len());
                for (condition, value) in whens {
                    new_whens.push((
                        Self::qualify_predicate(condition, ctx, used)?,
                        Self::qualify_scalar(value, ctx, used)?,
                    ));
                }
                Ok(ScalarExpr::SearchedCase { whens: new_whens, else_expr: Self::qualify_else(else_expr, ctx, used)? })
            }

            ScalarExpr::SimpleCase { input, whens, else_expr } => {
                let input = Box::new(Self::qualify_scalar(input, ctx, used)?);
                let mut new_whens = Vec::with_capacity(whens.len());
                for (when, then) in whens {
                    new_whens.push((Self::qualify_scalar(when, ctx, used)?, Self::qualify_scalar(then, ctx, used)?));
                }
                Ok(ScalarExpr::SimpleCase { input, whens: new_whens, else_expr: Self::qualify_else(else_expr, ctx, used)? })
            }

            ScalarExpr::Literal(_) => Ok(expr.clone()),

            ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_) => {
                Err(TranslationError::NotSupported(format!("{} inside an expression", expr)).into())
            }
        }
    }

    fn qualify_else(
        else_expr: &Option<Box<ScalarExpr>>,
        ctx: &TranslationContext,
        used: &mut Vec<ResolvedColumn>,
    ) -> Result<Option<Box<ScalarExpr>>, Error> {
        match else_expr {
            Some(e) => Ok(Some(Box::new(Self::qualify_scalar(e, ctx, used)?))),
            None => Ok(None),
        }
    }

    pub fn qualify_predicate(predicate: &Predicate, ctx: &TranslationContext, used: &mut Vec<ResolvedColumn>) -> Result<Predicate, Error> {
        Ok(match predicate {
            Predicate::And(items) => Predicate::And(Self::qualify_all(items, ctx, used)?),
            Predicate::Or(items) => Predicate::Or(Self::qualify_all(items, ctx, used)?),
            Predicate::Not(inner) => Predicate::Not(Box::new(Self::qualify_predicate(inner, ctx, used)?)),
            Predicate::Compare { left, op, right } => Predicate::Compare {
                left: Self::qualify_scalar(left, ctx, used)?,
                op: *op,
                right: Self::qualify_scalar(right, ctx, used)?,
            },
            Predicate::IsNull { expr, negated } => {
                Predicate::IsNull { expr: Self::qualify_scalar(expr, ctx, used)?, negated: *negated }
            }
            Predicate::InList { expr, list, negated } => {
                let mut new_list = Vec::with_capacity(list.len());
                for item in list {
                    new_list.push(Self::qualify_scalar(item, ctx, used)?);
                }
                Predicate::InList { expr: Self::qualify_scalar(expr, ctx, used)?, list: new_list, negated: *negated }
            }
            Predicate::Like { expr, pattern, negated } => Predicate::Like {
                expr: Self::qualify_scalar(expr, ctx, used)?,
                pattern: Self::qualify_scalar(pattern, ctx, used)?,
                negated: *negated,
            },
            Predicate::FullText { column, value } => {
                let resolved = ctx.resolve(column)?.ok_or_else(|| TranslationError::InvalidColumn(column.to_string()))?;
                let qualified = ctx.chain.qualified(&resolved);
                if !used.contains(&resolved) {
                    used.push(resolved);
                }
                Predicate::FullText { column: qualified, value: Self::qualify_scalar(value, ctx, used)? }
            }
            Predicate::Const3(t) => Predicate::Const3(*t),
        })
    }

    fn qualify_all(items: &[Predicate], ctx: &TranslationContext, used: &mut Vec<ResolvedColumn>) -> Result<Vec<Predicate>, Error> {
        items.iter().map(|p| Self::qualify_predicate(p, ctx, used)).collect()
    }

    /// Evaluates operations whose operands are all literals. Anything that fails to
    /// evaluate (condition functions such as `lastxdays`) is left for later stages.
    pub fn fold_scalar(expr: &ScalarExpr) -> ScalarExpr {
        let folded = match expr {
            ScalarExpr::Function(f) if f.is_aggregate() => return expr.clone(),
            ScalarExpr::Function(Function { name, args, distinct }) => ScalarExpr::Function(Function {
                name: name.clone(),
                args: args.iter().map(Self::fold_scalar).collect(),
                distinct: *distinct,
            }),
            ScalarExpr::Binary { left, op, right } => ScalarExpr::Binary {
                left: Box::new(Self::fold_scalar(left)),
                op: *op,
                right: Box::new(Self::fold_scalar(right)),
            },
            ScalarExpr::Unary { op, expr } => ScalarExpr::Unary { op: *op, expr: Box::new(Self::fold_scalar(expr)) },
            _ => return expr.clone(),
        };

        let constant = match &folded {
            ScalarExpr::Function(f) => f.args.iter().all(|a| a.literal().is_some()),
            ScalarExpr::Binary { left, right, .. } => left.literal().is_some() && right.literal().is_some(),
            ScalarExpr::Unary { expr, .. } => expr.literal().is_some(),
            _ => false,
        };
        if constant {
            if let Ok(value) = Eval::eval_constant(&folded) {
                return ScalarExpr::Literal(value.to_literal());
            }
        }
        folded
    }

    pub fn fold_predicate(predicate: &Predicate) -> Predicate {
        match predicate {
            Predicate::And(items) => Predicate::And(items.iter().map(Self::fold_predicate).collect()),
            Predicate::Or(items) => Predicate::Or(items.iter().map(Self::fold_predicate).collect()),
            Predicate::Not(inner) => Predicate::Not(Box::new(Self::fold_predicate(inner))),
            Predicate::Compare { left, op, right } => {
                Predicate::Compare { left: Self::fold_scalar(left), op: *op, right: Self::fold_scalar(right) }
            }
            Predicate::IsNull { expr, negated } => Predicate::IsNull { expr: Self::fold_scalar(expr), negated: *negated },
            Predicate::InList { expr, list, negated } => Predicate::InList {
                expr: Self::fold_scalar(expr),
                list: list.iter().map(Self::fold_scalar).collect(),
                negated: *negated,
            },
            Predicate::Like { expr, pattern, negated } => Predicate::Like {
                expr: Self::fold_scalar(expr),
                pattern: Self::fold_scalar(pattern),
                negated: *negated,
            },
            Predicate::FullText { column, value } => Predicate::FullText { column: column.clone(), value: Self::fold_scalar(value) },
            Predicate::Const3(t) => Predicate::Const3(*t),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        parser::{ast::{Literal, Predicate, ScalarExpr}, QueryParser},
        translator::ScalarResolver,
    };

    fn scalar(text: &str) -> ScalarExpr {
        let mut parser = QueryParser::new(text).unwrap();
        ScalarExpr::parse(&mut parser).unwrap()
    }

    #[test]
    fn folds_literal_arithmetic_and_functions() {
        assert_eq!(ScalarResolver::fold_scalar(&scalar("'Ma' + 'rk'")), ScalarExpr::Literal(Literal::String("Mark".into())));
        assert_eq!(ScalarResolver::fold_scalar(&scalar("1 + 2 * 3")), ScalarExpr::Literal(Literal::Int(7)));
        assert_eq!(ScalarResolver::fold_scalar(&scalar("UPPER('abc')")), ScalarExpr::Literal(Literal::String("ABC".into())));
    }

    #[test]
    fn keeps_columns_and_unknown_functions() {
        let expr = scalar("firstname + 'x'");
        assert_eq!(ScalarResolver::fold_scalar(&expr), expr);
        let expr = scalar("lastxdays(7)");
        assert_eq!(ScalarResolver::fold_scalar(&expr), expr);
    }

    #[test]
    fn folds_inside_predicates() {
        let mut parser = QueryParser::new("firstname = 'Ma' + 'rk'").unwrap();
        let predicate = Predicate::parse(&mut parser).unwrap();
        let Predicate::Compare { right, .. } = ScalarResolver::fold_predicate(&predicate) else { panic!("expected comparison") };
        assert_eq!(right, ScalarExpr::Literal(Literal::String("Mark".into())));
    }
}
