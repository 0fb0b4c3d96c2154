use crate::parser::{ast::{Column, Predicate, ScalarExpr, TableReference, TableSource}, ParseError, QueryParser};

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: Column,
    pub value: ScalarExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub target: TableReference,
    pub assignments: Vec<Assignment>,
    pub from: Option<TableSource>,
    pub criteria: Option<Predicate>,
}

impl UpdateStatement {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        parser.expect_keyword("UPDATE")?;
        let target = TableReference::parse(parser)?;
        parser.expect_keyword("SET")?;

        let mut assignments = vec![];
        loop {
            let pivot = parser.pivot();
            let column = match ScalarExpr::parse(parser)? {
                ScalarExpr::Column(c) => c,
                _ => return ParseError::new("SET expects a column", pivot, parser).err(),
            };
            parser.expect_symbol("=")?;
            let value = ScalarExpr::parse(parser)?;
            assignments.push(Assignment { column, value });
            if !parser.eat_symbol(",") {
                break;
            }
        }

        let from = if parser.eat_keyword("FROM") { Some(TableSource::parse(parser)?) } else { None };
        let criteria = if parser.eat_keyword("WHERE") { Some(Predicate::parse(parser)?) } else { None };

        Ok(Self { target, assignments, from, criteria })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub target: TableReference,
    pub from: Option<TableSource>,
    pub criteria: Option<Predicate>,
}

impl DeleteStatement {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        parser.expect_keyword("DELETE")?;
        parser.eat_keyword("FROM");
        let target = TableReference::parse(parser)?;
        let from = if parser.eat_keyword("FROM") { Some(TableSource::parse(parser)?) } else { None };
        let criteria = if parser.eat_keyword("WHERE") { Some(Predicate::parse(parser)?) } else { None };

        Ok(Self { target, from, criteria })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ast::{DeleteStatement, UpdateStatement}, QueryParser};

    #[test]
    fn update_with_join() {
        let mut parser = QueryParser::new(
            "UPDATE a SET primarycontactid = c.contactid, name = 'x' FROM account AS a INNER JOIN contact AS c ON a.accountid = c.parentcustomerid",
        ).unwrap();
        let update = UpdateStatement::parse(&mut parser).unwrap();
        assert!(parser.eof());
        assert_eq!(update.target.name, "a");
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.assignments[0].column.name, "primarycontactid");
        assert_eq!(update.from.unwrap().joins.len(), 1);
        assert!(update.criteria.is_none());
    }

    #[test]
    fn delete_forms() {
        let mut parser = QueryParser::new("DELETE FROM contact WHERE firstname = 'Mark'").unwrap();
        let delete = DeleteStatement::parse(&mut parser).unwrap();
        assert_eq!(delete.target.name, "contact");
        assert!(delete.from.is_none());
        assert!(delete.criteria.is_some());

        let mut parser = QueryParser::new(
            "DELETE c2 FROM contact c1 INNER JOIN contact c2 ON c1.firstname = c2.firstname WHERE c2.createdon > c1.createdon",
        ).unwrap();
        let delete = DeleteStatement::parse(&mut parser).unwrap();
        assert!(parser.eof());
        assert_eq!(delete.target.name, "c2");
        assert_eq!(delete.from.unwrap().table.exposed_name(), "c1");
    }
}
