use std::fmt;

use crate::parser::{ast::{ArithmeticOp, Column, Function, Literal, Predicate, UnaryOp}, ParseError, QueryParser, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarExpr {
    Literal(Literal),
    Column(Column),
    Function(Function),
    Binary { left: Box<ScalarExpr>, op: ArithmeticOp, right: Box<ScalarExpr> },
    Unary { op: UnaryOp, expr: Box<ScalarExpr> },
    SearchedCase { whens: Vec<(Predicate, ScalarExpr)>, else_expr: Option<Box<ScalarExpr>> },
    SimpleCase { input: Box<ScalarExpr>, whens: Vec<(ScalarExpr, ScalarExpr)>, else_expr: Option<Box<ScalarExpr>> },
    Collate { expr: Box<ScalarExpr>, collation: String },
    WildCard,
    WildCardWithCollection(String),
}

impl ScalarExpr {
    pub fn parse(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        Self::parse_additive(parser)
    }

    fn parse_additive(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        let mut left = Self::parse_multiplicative(parser)?;
        while let Some(op) = ArithmeticOp::check(parser, false) {
            let right = Self::parse_multiplicative(parser)?;
            left = ScalarExpr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        let mut left = Self::parse_unary(parser)?;
        while let Some(op) = ArithmeticOp::check(parser, true) {
            let right = Self::parse_unary(parser)?;
            left = ScalarExpr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        if parser.eat_symbol("-") {
            let expr = Self::parse_unary(parser)?;
            return Ok(match expr {
                ScalarExpr::Literal(Literal::Int(i)) => ScalarExpr::Literal(Literal::Int(-i)),
                ScalarExpr::Literal(Literal::Float(n)) => ScalarExpr::Literal(Literal::float(-n.into_inner())),
                other => ScalarExpr::Unary { op: UnaryOp::Negate, expr: Box::new(other) },
            });
        }
        parser.eat_symbol("+");

        let expr = Self::parse_primary(parser)?;
        if parser.eat_keyword("COLLATE") {
            let (collation, _) = parser.identifier()?;
            return Ok(ScalarExpr::Collate { expr: Box::new(expr), collation });
        }
        Ok(expr)
    }

    fn parse_primary(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        let pivot = parser.pivot();
        let Some(token) = parser.current().cloned() else {
            return ParseError::new("Invalid scalar value", pivot, parser).err();
        };

        match token.kind {
            TokenKind::Number => {
                parser.next();
                if token.text.contains('.') {
                    let value = token.text.parse::<f64>()
                        .map_err(|_| ParseError::new("Invalid number", pivot, parser))?;
                    return Ok(ScalarExpr::Literal(Literal::float(value)));
                }
                token.text.parse::<i64>()
                    .map(|i| ScalarExpr::Literal(Literal::Int(i)))
                    .map_err(|_| ParseError::new("Invalid number", pivot, parser))
            }
            TokenKind::String => {
                parser.next();
                Ok(ScalarExpr::Literal(Literal::String(token.text)))
            }
            TokenKind::Symbol if token.text == "(" => {
                parser.next();
                let inner = Self::parse(parser)?;
                parser.expect_symbol(")")?;
                Ok(inner)
            }
            TokenKind::Symbol if token.text == "*" => {
                parser.next();
                Ok(ScalarExpr::WildCard)
            }
            TokenKind::Word if token.is_word("NULL") => {
                parser.next();
                Ok(ScalarExpr::Literal(Literal::Null))
            }
            TokenKind::Word if token.is_word("CASE") => Self::parse_case(parser),
            // Functions may share a name with a keyword, e.g. LEFT(...)
            TokenKind::Word if parser.is_symbol_at(1, "(") => {
                parser.next();
                Function::parse_args(token.text, parser).map(ScalarExpr::Function)
            }
            TokenKind::Word | TokenKind::QuotedIdent if parser.is_identifier() => Self::parse_column(parser),
            _ => ParseError::new("Invalid scalar value", pivot, parser).err(),
        }
    }

    fn parse_column(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        let (first, quoted) = parser.identifier()?;
        if !parser.is_symbol(".") {
            return Ok(ScalarExpr::Column(Column { collection: None, name: first, quoted }));
        }
        parser.next();
        if parser.eat_symbol("*") {
            return Ok(ScalarExpr::WildCardWithCollection(first));
        }
        let (mut collection, mut name) = (first, parser.identifier()?.0);
        // schema.table.column keeps the last two parts
        while parser.eat_symbol(".") {
            collection = name;
            name = parser.identifier()?.0;
        }
        Ok(ScalarExpr::Column(Column { collection: Some(collection), name, quoted: false }))
    }

    fn parse_case(parser: &mut QueryParser) -> Result<ScalarExpr, ParseError> {
        parser.expect_keyword("CASE")?;

        if parser.is_keyword("WHEN") {
            let mut whens = vec![];
            while parser.eat_keyword("WHEN") {
                let condition = Predicate::parse(parser)?;
                parser.expect_keyword("THEN")?;
                whens.push((condition, Self::parse(parser)?));
            }
            let else_expr = Self::parse_else(parser)?;
            return Ok(ScalarExpr::SearchedCase { whens, else_expr });
        }

        let input = Box::new(Self::parse(parser)?);
        let mut whens = vec![];
        while parser.eat_keyword("WHEN") {
            let value = Self::parse(parser)?;
            parser.expect_keyword("THEN")?;
            whens.push((value, Self::parse(parser)?));
        }
        if whens.is_empty() {
            return ParseError::new("Expected WHEN", parser.pivot(), parser).err();
        }
        let else_expr = Self::parse_else(parser)?;
        Ok(ScalarExpr::SimpleCase { input, whens, else_expr })
    }

    fn parse_else(parser: &mut QueryParser) -> Result<Option<Box<ScalarExpr>>, ParseError> {
        let else_expr = if parser.eat_keyword("ELSE") {
            Some(Box::new(Self::parse(parser)?))
        } else {
            None
        };
        parser.expect_keyword("END")?;
        Ok(else_expr)
    }

    pub fn column(&self) -> Option<&Column> {
        match self {
            ScalarExpr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match self {
            ScalarExpr::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let ScalarExpr::Function(f) = e {
                found |= f.is_aggregate();
            }
        });
        found
    }

    /// Visits this expression and every nested scalar expression, including those
    /// inside CASE conditions.
    pub fn walk(&self, visit: &mut dyn FnMut(&ScalarExpr)) {
        visit(self);
        match self {
            ScalarExpr::Function(f) => f.args.iter().for_each(|a| a.walk(visit)),
            ScalarExpr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ScalarExpr::Unary { expr, .. } | ScalarExpr::Collate { expr, .. } => expr.walk(visit),
            ScalarExpr::SearchedCase { whens, else_expr } => {
                for (condition, value) in whens {
                    condition.walk_scalars(visit);
                    value.walk(visit);
                }
                if let Some(e) = else_expr {
                    e.walk(visit);
                }
            }
            ScalarExpr::SimpleCase { input, whens, else_expr } => {
                input.walk(visit);
                for (when, then) in whens {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(e) = else_expr {
                    e.walk(visit);
                }
            }
            ScalarExpr::Literal(_) | ScalarExpr::Column(_) | ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_) => {}
        }
    }

    pub fn columns(&self) -> Vec<Column> {
        let mut out = vec![];
        self.walk(&mut |e| {
            if let ScalarExpr::Column(c) = e {
                out.push(c.clone());
            }
        });
        out
    }

    /// Collation requests a case-sensitive comparison.
    pub fn is_case_sensitive(&self) -> bool {
        match self {
            ScalarExpr::Collate { collation, .. } => {
                let upper = collation.to_uppercase();
                upper.contains("_CS") || upper.contains("_BIN")
            }
            _ => false,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &ScalarExpr, parent: ArithmeticOp, right: bool) -> fmt::Result {
    if let ScalarExpr::Binary { op, .. } = expr {
        if op.precedence() < parent.precedence() || (right && op.precedence() == parent.precedence()) {
            return write!(f, "({})", expr);
        }
    }
    write!(f, "{}", expr)
}

/// Canonical SQL text; two expressions that mean the same thing render identically.
impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Literal(l) => write!(f, "{}", l),
            ScalarExpr::Column(c) => write!(f, "{}", c),
            ScalarExpr::Function(fun) => write!(f, "{}", fun),
            ScalarExpr::Binary { left, op, right } => {
                write_operand(f, left, *op, false)?;
                write!(f, " {} ", op)?;
                write_operand(f, right, *op, true)
            }
            ScalarExpr::Unary { expr, .. } => match expr.as_ref() {
                ScalarExpr::Binary { .. } => write!(f, "-({})", expr),
                other => write!(f, "-{}", other),
            },
            ScalarExpr::SearchedCase { whens, else_expr } => {
                write!(f, "CASE")?;
                for (condition, value) in whens {
                    write!(f, " WHEN {} THEN {}", condition, value)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            ScalarExpr::SimpleCase { input, whens, else_expr } => {
                write!(f, "CASE {}", input)?;
                for (when, then) in whens {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            ScalarExpr::Collate { expr, collation } => write!(f, "{} COLLATE {}", expr, collation),
            ScalarExpr::WildCard => write!(f, "*"),
            ScalarExpr::WildCardWithCollection(coll) => write!(f, "{}.*", coll.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ast::{ArithmeticOp, Column, Literal, ScalarExpr}, QueryParser};

    fn parse(text: &str) -> ScalarExpr {
        let mut parser = QueryParser::new(text).unwrap();
        let expr = ScalarExpr::parse(&mut parser).unwrap();
        assert!(parser.eof(), "trailing tokens in {}", text);
        expr
    }

    #[test]
    fn column_with_collection() {
        match parse("c.FirstName") {
            ScalarExpr::Column(Column { collection, name, quoted }) => {
                assert_eq!(collection.as_deref(), Some("c"));
                assert_eq!(name, "FirstName");
                assert!(!quoted);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter() {
        match parse("1 + 2 * 3") {
            ScalarExpr::Binary { op: ArithmeticOp::Add, right, .. } => {
                assert!(matches!(*right, ScalarExpr::Binary { op: ArithmeticOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn negative_numbers_fold_into_literals() {
        assert_eq!(parse("-5"), ScalarExpr::Literal(Literal::Int(-5)));
    }

    #[test]
    fn canonical_text_normalises_case_and_spacing() {
        assert_eq!(parse("left( LastName,1 )").to_string(), "LEFT(lastname, 1)");
        assert_eq!(parse("count(*)").to_string(), "COUNT(*)");
        assert_eq!(parse("count( distinct Name )").to_string(), "COUNT(DISTINCT name)");
        assert_eq!(parse("a - (b - c)").to_string(), "a - (b - c)");
        assert_eq!(parse("(a * b) + c").to_string(), "a * b + c");
    }

    #[test]
    fn searched_case_round_trips() {
        let expr = parse("CASE WHEN firstname = 'Mark' THEN 1 ELSE 0 END");
        assert_eq!(expr.to_string(), "CASE WHEN firstname = 'Mark' THEN 1 ELSE 0 END");
        assert_eq!(expr.columns(), vec![Column::name("firstname")]);
    }

    #[test]
    fn simple_case_and_collate() {
        let expr = parse("CASE statecode WHEN 0 THEN 'Active' END");
        assert!(matches!(expr, ScalarExpr::SimpleCase { .. }));

        let expr = parse("lastname COLLATE Latin1_General_CS_AS");
        assert!(expr.is_case_sensitive());
    }

    #[test]
    fn keyword_named_functions() {
        assert!(matches!(parse("LEFT(name, 2)"), ScalarExpr::Function(_)));
        assert!(matches!(parse("dateadd(day, 1, createdon)"), ScalarExpr::Function(f) if f.args.len() == 3));
    }

    #[test]
    fn aggregates_are_detected_inside_expressions() {
        assert!(parse("SUM(x) + 1").contains_aggregate());
        assert!(!parse("LEFT(x, 1)").contains_aggregate());
    }
}
