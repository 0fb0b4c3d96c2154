use crate::parser::{ast::{DeleteStatement, SelectStatement, UpdateStatement}, ParseError, QueryParser};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// A parsed statement together with the SQL text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub statement: Statement,
    pub sql: String,
}

impl Statement {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let pivot = parser.pivot();
        if parser.is_keyword("SELECT") {
            return SelectStatement::parse(parser).map(Statement::Select);
        }
        if parser.is_keyword("UPDATE") {
            return UpdateStatement::parse(parser).map(Statement::Update);
        }
        if parser.is_keyword("DELETE") {
            return DeleteStatement::parse(parser).map(Statement::Delete);
        }
        ParseError::new("Unsupported statement", pivot, parser).err()
    }

    /// Splits a batch into statements; `;` separators are optional.
    pub fn parse_batch(sql: &str) -> Result<Vec<ParsedStatement>, ParseError> {
        let mut parser = QueryParser::new(sql)?;
        let mut statements = vec![];

        while !parser.eof() {
            if parser.eat_symbol(";") {
                continue;
            }
            let start = parser.pivot();
            let statement = Self::parse(&mut parser)?;
            let end = parser.previous_end();
            if !parser.eof() && !parser.is_symbol(";") && !Self::starts_statement(&parser) {
                return ParseError::new("Unexpected token", parser.pivot(), &parser).err();
            }
            statements.push(ParsedStatement { statement, sql: parser.text_from_range(start, end) });
        }

        Ok(statements)
    }

    fn starts_statement(parser: &QueryParser) -> bool {
        parser.is_keyword("SELECT") || parser.is_keyword("UPDATE") || parser.is_keyword("DELETE")
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::Statement;

    #[test]
    fn batch_with_and_without_separators() {
        let batch = Statement::parse_batch("SELECT name FROM account; SELECT firstname FROM contact DELETE FROM contact").unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].sql, "SELECT name FROM account");
        assert_eq!(batch[1].sql, "SELECT firstname FROM contact");
        assert!(matches!(batch[2].statement, Statement::Delete(_)));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = Statement::parse_batch("SELECT name FROM account )").unwrap_err();
        assert_eq!(err.message, "Unexpected token");
    }

    #[test]
    fn unsupported_statement() {
        let err = Statement::parse_batch("INSERT INTO account (name) VALUES ('x')").unwrap_err();
        assert_eq!(err.message, "Unsupported statement");
    }
}
