use crate::parser::{ParseError, Token, TokenKind, Tokenizer};

/// Words that terminate an expression and therefore can't be used as bare aliases.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "TOP", "DISTINCT", "AS", "ON",
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "AND", "OR", "NOT", "IS", "NULL",
    "IN", "LIKE", "BETWEEN", "CASE", "WHEN", "THEN", "ELSE", "END", "UPDATE", "SET", "DELETE",
    "WITH", "OFFSET", "FETCH", "ROWS", "ROW", "ONLY", "NEXT", "ASC", "DESC", "UNION",
    "COLLATE", "EXISTS", "INSERT", "INTO", "VALUES",
];

#[derive(Debug, Default)]
pub struct QueryParser {
    pub position: usize,
    pub text: String,
    pub tokens: Vec<Token>,
}

impl QueryParser {
    pub fn new(query: &str) -> Result<Self, ParseError> {
        Ok(Self {
            position: 0,
            text: query.to_string(),
            tokens: Tokenizer::tokenize(query)?,
        })
    }

    pub fn eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    pub fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    pub fn peek(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.position + ahead)
    }

    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Source offset where the current token starts, or the end of the text.
    pub fn pivot(&self) -> usize {
        self.current().map(|t| t.start).unwrap_or(self.text.len())
    }

    pub fn current_end(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| t.end)
            .unwrap_or(0)
    }

    /// End offset of the last consumed token.
    pub fn previous_end(&self) -> usize {
        self.position
            .checked_sub(1)
            .and_then(|p| self.tokens.get(p))
            .map(|t| t.end)
            .unwrap_or(0)
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.text.len());
        self.text.get(start..end).unwrap_or_default().to_string()
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.current().is_some_and(|t| t.is_word(word))
    }

    pub fn is_keyword_at(&self, ahead: usize, word: &str) -> bool {
        self.peek(ahead).is_some_and(|t| t.is_word(word))
    }

    pub fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.position += 1;
            return true;
        }
        false
    }

    pub fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            return Ok(());
        }
        ParseError::new(&format!("Expected {}", word), self.pivot(), self).err()
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.current().is_some_and(|t| t.is_symbol(symbol))
    }

    pub fn is_symbol_at(&self, ahead: usize, symbol: &str) -> bool {
        self.peek(ahead).is_some_and(|t| t.is_symbol(symbol))
    }

    pub fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.is_symbol(symbol) {
            self.position += 1;
            return true;
        }
        false
    }

    pub fn expect_symbol(&mut self, symbol: &str) -> Result<(), ParseError> {
        if self.eat_symbol(symbol) {
            return Ok(());
        }
        ParseError::new(&format!("Expected '{}'", symbol), self.pivot(), self).err()
    }

    pub fn is_reserved(word: &str) -> bool {
        RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
    }

    /// True when the current token can name a column, table or alias.
    pub fn is_identifier(&self) -> bool {
        match self.current() {
            Some(t) if t.kind == TokenKind::QuotedIdent => true,
            Some(t) if t.kind == TokenKind::Word => !Self::is_reserved(&t.text),
            _ => false,
        }
    }

    /// Reads an identifier, returning its text and whether it was quoted.
    pub fn identifier(&mut self) -> Result<(String, bool), ParseError> {
        if self.is_identifier() {
            if let Some(token) = self.next() {
                return Ok((token.text, token.kind == TokenKind::QuotedIdent));
            }
        }
        ParseError::new("Expected identifier", self.pivot(), self).err()
    }

    /// Reads an optional `[AS] alias`. String literals are accepted as aliases as well.
    pub fn alias(&mut self) -> Result<Option<String>, ParseError> {
        let explicit = self.eat_keyword("AS");
        if let Some(token) = self.current() {
            if token.kind == TokenKind::String && explicit {
                let text = token.text.clone();
                self.position += 1;
                return Ok(Some(text));
            }
        }
        if self.is_identifier() {
            return self.identifier().map(|(name, _)| Some(name));
        }
        if explicit {
            return ParseError::new("Expected alias", self.pivot(), self).err();
        }
        Ok(None)
    }

    /// Reads a non-negative integer literal, optionally wrapped in parentheses.
    pub fn integer(&mut self) -> Result<i64, ParseError> {
        let pivot = self.pivot();
        let wrapped = self.eat_symbol("(");
        let value = match self.current() {
            Some(t) if t.kind == TokenKind::Number => t.text.parse::<i64>().ok(),
            _ => None,
        };
        let Some(value) = value else {
            return ParseError::new("Expected integer", pivot, self).err();
        };
        self.position += 1;
        if wrapped {
            self.expect_symbol(")")?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::QueryParser;

    #[test]
    fn keywords_are_case_insensitive() {
        let mut parser = QueryParser::new("select Name from").unwrap();
        assert!(parser.eat_keyword("SELECT"));
        assert!(parser.is_identifier());
        assert_eq!(parser.identifier().unwrap(), ("Name".to_string(), false));
        assert!(!parser.is_identifier());
        assert!(parser.eat_keyword("from"));
        assert!(parser.eof());
    }

    #[test]
    fn alias_handles_as_and_bare_forms() {
        let mut parser = QueryParser::new("AS total x FROM").unwrap();
        assert_eq!(parser.alias().unwrap(), Some("total".into()));
        assert_eq!(parser.alias().unwrap(), Some("x".into()));
        assert_eq!(parser.alias().unwrap(), None);
    }

    #[test]
    fn integer_accepts_parentheses() {
        let mut parser = QueryParser::new("(10) 5").unwrap();
        assert_eq!(parser.integer().unwrap(), 10);
        assert_eq!(parser.integer().unwrap(), 5);
        assert!(parser.integer().is_err());
    }

    #[test]
    fn errors_capture_source_text() {
        let mut parser = QueryParser::new("select ,").unwrap();
        parser.next();
        let err = parser.expect_keyword("FROM").unwrap_err();
        assert_eq!(err.message, "Expected FROM");
        assert_eq!(err.text, ",");
        assert_eq!(err.start, 7);
    }
}
