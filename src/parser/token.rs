use crate::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword or unquoted identifier.
    Word,
    /// `[name]` or `"name"`.
    QuotedIdent,
    /// `'text'` or `N'text'`, unescaped.
    String,
    Number,
    Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }
}

pub struct Tokenizer;

impl Tokenizer {
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
        let chars: Vec<(usize, char)> = source.char_indices().collect();
        let offset = |i: usize| chars.get(i).map(|(p, _)| *p).unwrap_or(source.len());
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let (start, ch) = chars[i];

            if ch.is_whitespace() {
                i += 1;
                continue;
            }

            // -- line comment
            if ch == '-' && matches!(chars.get(i + 1), Some((_, '-'))) {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
                continue;
            }

            // /* block comment */
            if ch == '/' && matches!(chars.get(i + 1), Some((_, '*'))) {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return ParseError::at("Unterminated comment", source, start, source.len()).err();
                    }
                    if chars[i].1 == '*' && chars[i + 1].1 == '/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                continue;
            }

            let national = (ch == 'N' || ch == 'n') && matches!(chars.get(i + 1), Some((_, '\'')));
            if ch == '\'' || national {
                if national {
                    i += 1;
                }
                let (text, next) = Self::delimited(&chars, i, '\'')
                    .ok_or_else(|| ParseError::at("Unterminated string", source, start, source.len()))?;
                i = next;
                tokens.push(Token { kind: TokenKind::String, text, start, end: offset(i) });
                continue;
            }

            if ch == '"' || ch == '[' {
                let close = if ch == '"' { '"' } else { ']' };
                let (text, next) = if ch == '[' {
                    Self::bracketed(&chars, i)
                } else {
                    Self::delimited(&chars, i, close)
                }
                .ok_or_else(|| ParseError::at("Unterminated identifier", source, start, source.len()))?;
                i = next;
                tokens.push(Token { kind: TokenKind::QuotedIdent, text, start, end: offset(i) });
                continue;
            }

            if ch.is_ascii_digit() || (ch == '.' && chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit())) {
                let mut seen_dot = false;
                let mut j = i;
                while j < chars.len() {
                    let c = chars[j].1;
                    if c.is_ascii_digit() {
                        j += 1;
                    } else if c == '.' && !seen_dot {
                        seen_dot = true;
                        j += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token { kind: TokenKind::Number, text: source[start..offset(j)].to_string(), start, end: offset(j) });
                i = j;
                continue;
            }

            if ch.is_alphabetic() || ch == '_' || ch == '@' || ch == '#' {
                let mut j = i;
                while j < chars.len() && (chars[j].1.is_alphanumeric() || matches!(chars[j].1, '_' | '@' | '#' | '$')) {
                    j += 1;
                }
                tokens.push(Token { kind: TokenKind::Word, text: source[start..offset(j)].to_string(), start, end: offset(j) });
                i = j;
                continue;
            }

            let two: String = chars[i..(i + 2).min(chars.len())].iter().map(|(_, c)| *c).collect();
            if matches!(two.as_str(), "<>" | "!=" | "<=" | ">=") {
                tokens.push(Token { kind: TokenKind::Symbol, text: two, start, end: offset(i + 2) });
                i += 2;
                continue;
            }

            if "(),.*+-/%=<>;".contains(ch) {
                tokens.push(Token { kind: TokenKind::Symbol, text: ch.to_string(), start, end: offset(i + 1) });
                i += 1;
                continue;
            }

            return ParseError::at(&format!("Unexpected character '{}'", ch), source, start, offset(i + 1)).err();
        }

        Ok(tokens)
    }

    // Reads a run delimited by `quote`, where a doubled quote is an escaped quote.
    fn delimited(chars: &[(usize, char)], open: usize, quote: char) -> Option<(String, usize)> {
        let mut text = String::new();
        let mut i = open + 1;
        while i < chars.len() {
            let c = chars[i].1;
            if c == quote {
                if matches!(chars.get(i + 1), Some((_, q)) if *q == quote) {
                    text.push(quote);
                    i += 2;
                    continue;
                }
                return Some((text, i + 1));
            }
            text.push(c);
            i += 1;
        }
        None
    }

    fn bracketed(chars: &[(usize, char)], open: usize) -> Option<(String, usize)> {
        let mut text = String::new();
        let mut i = open + 1;
        while i < chars.len() {
            let c = chars[i].1;
            if c == ']' {
                if matches!(chars.get(i + 1), Some((_, ']'))) {
                    text.push(']');
                    i += 2;
                    continue;
                }
                return Some((text, i + 1));
            }
            text.push(c);
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenKind, Tokenizer};

    #[test]
    fn splits_words_symbols_and_literals() {
        let tokens = Tokenizer::tokenize("SELECT name, N'it''s' FROM account WHERE x >= 1.5").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Word, TokenKind::Word, TokenKind::Symbol, TokenKind::String,
            TokenKind::Word, TokenKind::Word, TokenKind::Word, TokenKind::Word,
            TokenKind::Symbol, TokenKind::Number,
        ]);
        assert_eq!(tokens[3].text, "it's");
        assert_eq!(tokens[8].text, ">=");
        assert_eq!(tokens[9].text, "1.5");
    }

    #[test]
    fn quoted_identifiers_and_comments() {
        let tokens = Tokenizer::tokenize("select [my col], \"mark\" -- trailing\n /* block */ from x").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[1].text, "my col");
        assert_eq!(tokens[3].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[3].text, "mark");
        assert!(tokens[4].is_word("FROM"));
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Tokenizer::tokenize("select 'abc").unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.start, 7);
    }
}
