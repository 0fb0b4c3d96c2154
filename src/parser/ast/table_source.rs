use crate::parser::{ast::Predicate, ParseError, QueryParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableReference {
    pub name: String,
    pub alias: Option<String>,
    pub no_lock: bool,
}

impl TableReference {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let (mut name, _) = parser.identifier()?;
        // dbo.account / metadata.entity keep the last part
        while parser.eat_symbol(".") {
            name = parser.identifier()?.0;
        }
        let alias = parser.alias()?;
        let no_lock = Self::parse_hints(parser)?;
        Ok(Self { name, alias, no_lock })
    }

    fn parse_hints(parser: &mut QueryParser) -> Result<bool, ParseError> {
        let with = parser.is_keyword("WITH") && parser.is_symbol_at(1, "(");
        if !(with || (parser.is_symbol("(") && parser.is_keyword_at(1, "NOLOCK"))) {
            return Ok(false);
        }
        if with {
            parser.next();
        }
        parser.expect_symbol("(")?;
        let mut no_lock = false;
        loop {
            let pivot = parser.pivot();
            let (hint, _) = parser.identifier()?;
            if hint.eq_ignore_ascii_case("NOLOCK") {
                no_lock = true;
            } else {
                return ParseError::new(&format!("Unsupported table hint {}", hint), pivot, parser).err();
            }
            if !parser.eat_symbol(",") {
                break;
            }
        }
        parser.expect_symbol(")")?;
        Ok(no_lock)
    }

    /// The name other parts of the query use to refer to this table.
    pub fn exposed_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableReference,
    pub on: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSource {
    pub table: TableReference,
    pub joins: Vec<Join>,
}

impl TableSource {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let table = TableReference::parse(parser)?;
        let mut joins = vec![];

        while let Some(join_type) = Self::join_type(parser)? {
            let table = TableReference::parse(parser)?;
            parser.expect_keyword("ON")?;
            let on = Predicate::parse(parser)?;
            joins.push(Join { join_type, table, on });
        }

        Ok(Self { table, joins })
    }

    fn join_type(parser: &mut QueryParser) -> Result<Option<JoinType>, ParseError> {
        let pivot = parser.pivot();
        let join_type = if parser.eat_keyword("JOIN") {
            return Ok(Some(JoinType::Inner));
        } else if parser.eat_keyword("INNER") {
            JoinType::Inner
        } else if parser.eat_keyword("LEFT") {
            parser.eat_keyword("OUTER");
            JoinType::LeftOuter
        } else if parser.eat_keyword("RIGHT") {
            parser.eat_keyword("OUTER");
            JoinType::RightOuter
        } else if parser.eat_keyword("FULL") {
            parser.eat_keyword("OUTER");
            JoinType::FullOuter
        } else if parser.is_keyword("CROSS") {
            return ParseError::new("CROSS JOIN is not supported", pivot, parser).err();
        } else {
            return Ok(None);
        };
        parser.expect_keyword("JOIN")?;
        Ok(Some(join_type))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ast::{JoinType, TableSource}, QueryParser};

    #[test]
    fn joins_and_hints() {
        let mut parser = QueryParser::new(
            "account AS a (NOLOCK) INNER JOIN contact c ON a.primarycontactid = c.contactid LEFT OUTER JOIN contact m WITH (NOLOCK) ON c.parentcustomerid = m.contactid",
        ).unwrap();
        let source = TableSource::parse(&mut parser).unwrap();
        assert!(parser.eof());
        assert_eq!(source.table.name, "account");
        assert_eq!(source.table.exposed_name(), "a");
        assert!(source.table.no_lock);
        assert_eq!(source.joins.len(), 2);
        assert_eq!(source.joins[0].join_type, JoinType::Inner);
        assert_eq!(source.joins[1].join_type, JoinType::LeftOuter);
        assert!(source.joins[1].table.no_lock);
    }

    #[test]
    fn schema_prefix_is_dropped() {
        let mut parser = QueryParser::new("metadata.entity").unwrap();
        let source = TableSource::parse(&mut parser).unwrap();
        assert_eq!(source.table.name, "entity");
        assert_eq!(source.table.alias, None);
    }
}
