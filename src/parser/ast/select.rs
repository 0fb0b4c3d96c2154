use crate::parser::{ast::{Predicate, ScalarExpr, TableSource}, ParseError, QueryParser};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: ScalarExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let expr = ScalarExpr::parse(parser)?;
        let alias = match expr {
            ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_) => None,
            _ => parser.alias()?,
        };
        Ok(Self { expr, alias })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: ScalarExpr,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse_list(parser: &mut QueryParser) -> Result<Vec<Self>, ParseError> {
        let mut items = vec![];
        loop {
            let expr = ScalarExpr::parse(parser)?;
            let descending = if parser.eat_keyword("DESC") {
                true
            } else {
                parser.eat_keyword("ASC");
                false
            };
            items.push(OrderBy { expr, descending });
            if !parser.eat_symbol(",") {
                return Ok(items);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetFetch {
    pub offset: i64,
    pub fetch: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub distinct: bool,
    pub top: Option<i64>,
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableSource>,
    pub criteria: Option<Predicate>,
    pub group_by: Vec<ScalarExpr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<OffsetFetch>,
}

impl SelectStatement {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        parser.expect_keyword("SELECT")?;
        let mut select = SelectStatement::default();

        if parser.eat_keyword("DISTINCT") {
            select.distinct = true;
        } else {
            parser.eat_keyword("ALL");
        }

        if parser.eat_keyword("TOP") {
            select.top = Some(parser.integer()?);
        }

        loop {
            select.projection.push(SelectItem::parse(parser)?);
            if !parser.eat_symbol(",") {
                break;
            }
        }

        if parser.eat_keyword("FROM") {
            loop {
                select.from.push(TableSource::parse(parser)?);
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        }

        if parser.eat_keyword("WHERE") {
            select.criteria = Some(Predicate::parse(parser)?);
        }

        if parser.eat_keyword("GROUP") {
            parser.expect_keyword("BY")?;
            loop {
                select.group_by.push(ScalarExpr::parse(parser)?);
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        }

        if parser.eat_keyword("HAVING") {
            select.having = Some(Predicate::parse(parser)?);
        }

        if parser.eat_keyword("ORDER") {
            parser.expect_keyword("BY")?;
            select.order_by = OrderBy::parse_list(parser)?;
        }

        if parser.eat_keyword("OFFSET") {
            let offset = parser.integer()?;
            if !parser.eat_keyword("ROWS") {
                parser.expect_keyword("ROW")?;
            }
            let mut fetch = None;
            if parser.eat_keyword("FETCH") {
                if !parser.eat_keyword("NEXT") {
                    parser.expect_keyword("FIRST")?;
                }
                fetch = Some(parser.integer()?);
                if !parser.eat_keyword("ROWS") {
                    parser.expect_keyword("ROW")?;
                }
                parser.expect_keyword("ONLY")?;
            }
            select.offset = Some(OffsetFetch { offset, fetch });
        }

        Ok(select)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ast::{OffsetFetch, ScalarExpr, SelectStatement}, QueryParser};

    fn parse(text: &str) -> SelectStatement {
        let mut parser = QueryParser::new(text).unwrap();
        let select = SelectStatement::parse(&mut parser).unwrap();
        assert!(parser.eof(), "trailing tokens in {}", text);
        select
    }

    #[test]
    fn full_clause_set() {
        let select = parse(
            "SELECT TOP 10 lastname, count(*) AS cnt FROM contact WHERE firstname IS NOT NULL \
             GROUP BY lastname HAVING count(*) > 1 ORDER BY 2 DESC, lastname",
        );
        assert_eq!(select.top, Some(10));
        assert_eq!(select.projection.len(), 2);
        assert_eq!(select.projection[1].alias.as_deref(), Some("cnt"));
        assert_eq!(select.from.len(), 1);
        assert!(select.criteria.is_some());
        assert_eq!(select.group_by.len(), 1);
        assert!(select.having.is_some());
        assert_eq!(select.order_by.len(), 2);
        assert!(select.order_by[0].descending);
        assert!(!select.order_by[1].descending);
    }

    #[test]
    fn wildcards_and_top_in_parentheses() {
        let select = parse("SELECT DISTINCT TOP (5) *, c.* FROM contact c");
        assert!(select.distinct);
        assert_eq!(select.top, Some(5));
        assert_eq!(select.projection[0].expr, ScalarExpr::WildCard);
        assert_eq!(select.projection[1].expr, ScalarExpr::WildCardWithCollection("c".into()));
    }

    #[test]
    fn offset_fetch() {
        let select = parse("SELECT name FROM account ORDER BY name OFFSET 100 ROWS FETCH NEXT 50 ROWS ONLY");
        assert_eq!(select.offset, Some(OffsetFetch { offset: 100, fetch: Some(50) }));
    }
}
