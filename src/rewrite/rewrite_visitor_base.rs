use crate::parser::ast::{Column, OrderBy, Predicate, ScalarExpr, SelectItem, SelectStatement};

/// Walks the scalar-bearing nodes of a statement and swaps matching subexpressions for
/// column references.
///
/// Probing is pre-order: a node that matches is replaced whole and its children are not
/// visited; a node that doesn't match is descended into.
pub trait RewriteVisitorBase {
    /// Column that should stand in for `expr`, if any.
    fn replace_expression(&self, expr: &ScalarExpr) -> Option<String>;

    /// Rewrites `expr` in place; returns the column name when `expr` itself was replaced.
    fn rewrite_scalar(&self, expr: &mut ScalarExpr) -> Option<String> {
        if let Some(name) = self.replace_expression(expr) {
            *expr = ScalarExpr::Column(Column::name(&name));
            return Some(name);
        }
        self.visit_scalar_children(expr);
        None
    }

    fn visit_scalar_children(&self, expr: &mut ScalarExpr) {
        match expr {
            ScalarExpr::Function(f) => {
                for arg in f.args.iter_mut() {
                    self.rewrite_scalar(arg);
                }
            }
            ScalarExpr::Binary { left, right, .. } => {
                self.rewrite_scalar(left);
                self.rewrite_scalar(right);
            }
            ScalarExpr::Unary { expr, .. } | ScalarExpr::Collate { expr, .. } => {
                self.rewrite_scalar(expr);
            }
            ScalarExpr::SearchedCase { whens, else_expr } => {
                for (condition, value) in whens.iter_mut() {
                    self.visit_predicate(condition);
                    self.rewrite_scalar(value);
                }
                if let Some(e) = else_expr {
                    self.rewrite_scalar(e);
                }
            }
            ScalarExpr::SimpleCase { input, whens, else_expr } => {
                self.rewrite_scalar(input);
                for (when, then) in whens.iter_mut() {
                    self.rewrite_scalar(when);
                    self.rewrite_scalar(then);
                }
                if let Some(e) = else_expr {
                    self.rewrite_scalar(e);
                }
            }
            ScalarExpr::Literal(_) | ScalarExpr::Column(_) | ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_) => {}
        }
    }

    fn visit_predicate(&self, predicate: &mut Predicate) {
        match predicate {
            Predicate::And(items) | Predicate::Or(items) => {
                for item in items.iter_mut() {
                    self.visit_predicate(item);
                }
            }
            Predicate::Not(inner) => self.visit_predicate(inner),
            Predicate::Compare { left, right, .. } => {
                self.rewrite_scalar(left);
                self.rewrite_scalar(right);
            }
            Predicate::IsNull { expr, .. } => {
                self.rewrite_scalar(expr);
            }
            Predicate::InList { expr, list, .. } => {
                self.rewrite_scalar(expr);
                for item in list.iter_mut() {
                    self.rewrite_scalar(item);
                }
            }
            Predicate::Like { expr, pattern, .. } => {
                self.rewrite_scalar(expr);
                self.rewrite_scalar(pattern);
            }
            Predicate::FullText { value, .. } => {
                self.rewrite_scalar(value);
            }
            Predicate::Const3(_) => {}
        }
    }

    /// A rewritten item with no alias keeps the name of the bare column it replaced,
    /// otherwise takes the mapped name.
    fn visit_select_item(&self, item: &mut SelectItem) {
        let original = item.expr.column().map(|c| c.name.clone());
        if let Some(name) = self.rewrite_scalar(&mut item.expr) {
            if item.alias.is_none() {
                item.alias = Some(original.unwrap_or(name));
            }
        }
    }

    fn visit_order_by(&self, item: &mut OrderBy) {
        self.rewrite_scalar(&mut item.expr);
    }

    /// Rewrites the parts of a SELECT evaluated after grouping.
    fn visit_select(&self, select: &mut SelectStatement) {
        for item in select.projection.iter_mut() {
            self.visit_select_item(item);
        }
        if let Some(having) = &mut select.having {
            self.visit_predicate(having);
        }
        for item in select.order_by.iter_mut() {
            self.visit_order_by(item);
        }
    }
}
