use std::collections::HashMap;

use crate::{parser::ast::ScalarExpr, rewrite::RewriteVisitorBase};

/// Replaces expressions with the columns that hold their precomputed values, keyed by
/// canonical SQL text, e.g. `COUNT(*)` becomes `contactid_count`.
#[derive(Debug, Clone, Default)]
pub struct RewriteVisitor {
    mappings: HashMap<String, String>,
}

impl RewriteVisitor {
    pub fn new<'a>(rewrites: impl IntoIterator<Item = (&'a ScalarExpr, String)>) -> Self {
        Self { mappings: rewrites.into_iter().map(|(expr, column)| (expr.to_string(), column)).collect() }
    }

    pub fn insert(&mut self, expr: &ScalarExpr, column: &str) {
        self.mappings.insert(expr.to_string(), column.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl RewriteVisitorBase for RewriteVisitor {
    fn replace_expression(&self, expr: &ScalarExpr) -> Option<String> {
        self.mappings.get(&expr.to_string()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        parser::{ast::{Column, ScalarExpr, Statement}, QueryParser},
        rewrite::{RewriteVisitor, RewriteVisitorBase},
    };

    fn expr(text: &str) -> ScalarExpr {
        ScalarExpr::parse(&mut QueryParser::new(text).unwrap()).unwrap()
    }

    fn select(sql: &str) -> crate::parser::ast::SelectStatement {
        match Statement::parse_batch(sql).unwrap().remove(0).statement {
            Statement::Select(s) => s,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn having_and_order_by_use_generated_columns() {
        let mut visitor = RewriteVisitor::default();
        visitor.insert(&expr("count(*)"), "contactid_count");
        visitor.insert(&expr("lastname"), "lastname");

        let mut statement = select("SELECT lastname, COUNT( * ) FROM contact GROUP BY lastname HAVING count(*) > 1 ORDER BY COUNT(*) DESC");
        visitor.visit_select(&mut statement);

        assert_eq!(statement.having.unwrap().to_string(), "contactid_count > 1");
        assert_eq!(statement.order_by[0].expr, ScalarExpr::Column(Column::name("contactid_count")));
        assert_eq!(statement.projection[1].alias.as_deref(), Some("contactid_count"));
    }

    #[test]
    fn bare_columns_keep_their_own_name() {
        let mut visitor = RewriteVisitor::default();
        visitor.insert(&expr("c.lastname"), "c_lastname");
        let mut statement = select("SELECT c.lastname, c.lastname AS ln FROM contact c");
        visitor.visit_select(&mut statement);
        assert_eq!(statement.projection[0].alias.as_deref(), Some("lastname"));
        assert_eq!(statement.projection[1].alias.as_deref(), Some("ln"));
    }

    #[test]
    fn nested_matches_are_replaced_inside_expressions() {
        let mut visitor = RewriteVisitor::default();
        visitor.insert(&expr("count(*)"), "n");
        visitor.insert(&expr("LEFT(lastname, 1)"), "initial");

        let mut e = expr("CASE WHEN count(*) > 1 THEN left(LastName, 1) + '!' ELSE 'x' END");
        assert_eq!(visitor.rewrite_scalar(&mut e), None);
        assert_eq!(e.to_string(), "CASE WHEN n > 1 THEN initial + '!' ELSE 'x' END");
    }

    #[test]
    fn top_level_hit_is_not_descended() {
        let mut visitor = RewriteVisitor::default();
        visitor.insert(&expr("a + b"), "sum_ab");
        visitor.insert(&expr("a"), "never");
        let mut e = expr("a + b");
        assert_eq!(visitor.rewrite_scalar(&mut e).as_deref(), Some("sum_ab"));
        assert_eq!(e, ScalarExpr::Column(Column::name("sum_ab")));
    }
}
