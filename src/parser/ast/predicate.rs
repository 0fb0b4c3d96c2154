use std::fmt;

use crate::parser::{ast::{Column, ComparatorOp, Literal, ScalarExpr, Truth}, ParseError, QueryParser, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),

    // Predicates that *embed* scalars:
    Compare { left: ScalarExpr, op: ComparatorOp, right: ScalarExpr }, // =, <, <=, >, >=, <>, !=
    IsNull  { expr: ScalarExpr, negated: bool },
    InList  { expr: ScalarExpr, list: Vec<ScalarExpr>, negated: bool },
    Like    { expr: ScalarExpr, pattern: ScalarExpr, negated: bool },
    /// `CONTAINS(column, 'a OR b')`
    FullText { column: Column, value: ScalarExpr },

    Const3(Truth),
}

impl Predicate {
    pub fn parse(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let mut items = vec![Self::parse_and(parser)?];
        while parser.eat_keyword("OR") {
            items.push(Self::parse_and(parser)?);
        }
        Ok(Self::flatten(items, false))
    }

    fn parse_and(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let mut items = vec![Self::parse_not(parser)?];
        while parser.eat_keyword("AND") {
            items.push(Self::parse_not(parser)?);
        }
        Ok(Self::flatten(items, true))
    }

    fn flatten(items: Vec<Predicate>, and: bool) -> Predicate {
        if items.len() == 1 {
            return items.into_iter().next().unwrap_or(Predicate::Const3(Truth::True));
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Predicate::And(inner) if and => out.extend(inner),
                Predicate::Or(inner) if !and => out.extend(inner),
                other => out.push(other),
            }
        }
        if and { Predicate::And(out) } else { Predicate::Or(out) }
    }

    fn parse_not(parser: &mut QueryParser) -> Result<Self, ParseError> {
        if parser.eat_keyword("NOT") {
            return Ok(Predicate::Not(Box::new(Self::parse_not(parser)?)));
        }
        Self::parse_single(parser)
    }

    pub fn parse_single(parser: &mut QueryParser) -> Result<Self, ParseError> {
        // A parenthesis may open either a nested predicate or a scalar operand.
        if parser.is_symbol("(") {
            let start = parser.position;
            parser.next();
            if let Ok(inner) = Self::parse(parser) {
                if parser.eat_symbol(")") && !Self::continues_scalar(parser) {
                    return Ok(inner);
                }
            }
            parser.position = start;
        }

        if parser.is_keyword("CONTAINS") && parser.is_symbol_at(1, "(") {
            return Self::parse_full_text(parser);
        }

        let left = ScalarExpr::parse(parser)?;
        let pivot = parser.pivot();

        if let Some(op) = ComparatorOp::check(parser) {
            let right = ScalarExpr::parse(parser)?;
            return Ok(Self::Compare { left, op, right });
        }

        if parser.eat_keyword("IS") {
            let negated = parser.eat_keyword("NOT");
            parser.expect_keyword("NULL")?;
            return Ok(Self::IsNull { expr: left, negated });
        }

        let negated = parser.eat_keyword("NOT");

        if parser.eat_keyword("IN") {
            parser.expect_symbol("(")?;
            let mut list = vec![ScalarExpr::parse(parser)?];
            while parser.eat_symbol(",") {
                list.push(ScalarExpr::parse(parser)?);
            }
            parser.expect_symbol(")")?;
            return Ok(Self::InList { expr: left, list, negated });
        }

        if parser.eat_keyword("LIKE") {
            let pattern = ScalarExpr::parse(parser)?;
            return Ok(Self::Like { expr: left, pattern, negated });
        }

        if parser.eat_keyword("BETWEEN") {
            let low = ScalarExpr::parse(parser)?;
            parser.expect_keyword("AND")?;
            let high = ScalarExpr::parse(parser)?;
            let range = Predicate::And(vec![
                Self::Compare { left: left.clone(), op: ComparatorOp::GtEq, right: low },
                Self::Compare { left, op: ComparatorOp::LtEq, right: high },
            ]);
            return Ok(if negated { Predicate::Not(Box::new(range)) } else { range });
        }

        ParseError::new("Invalid predicate", pivot, parser).err()
    }

    // After `( ... )` a scalar operator means the parenthesis held an operand.
    fn continues_scalar(parser: &QueryParser) -> bool {
        match parser.current() {
            Some(t) if t.kind == TokenKind::Symbol => {
                matches!(t.text.as_str(), "+" | "-" | "*" | "/" | "%" | "=" | "<>" | "!=" | "<" | "<=" | ">" | ">=")
            }
            Some(t) => t.is_word("IS") || t.is_word("IN") || t.is_word("LIKE") || t.is_word("BETWEEN")
                || (t.is_word("NOT") && (parser.is_keyword_at(1, "IN") || parser.is_keyword_at(1, "LIKE") || parser.is_keyword_at(1, "BETWEEN"))),
            None => false,
        }
    }

    fn parse_full_text(parser: &mut QueryParser) -> Result<Self, ParseError> {
        let pivot = parser.pivot();
        parser.expect_keyword("CONTAINS")?;
        parser.expect_symbol("(")?;
        let column = match ScalarExpr::parse(parser)? {
            ScalarExpr::Column(c) => c,
            _ => return ParseError::new("CONTAINS expects a column", pivot, parser).err(),
        };
        parser.expect_symbol(",")?;
        let value = ScalarExpr::parse(parser)?;
        parser.expect_symbol(")")?;
        Ok(Self::FullText { column, value })
    }

    /// Top-level AND-ed parts of this predicate.
    pub fn conjuncts(&self) -> Vec<Predicate> {
        match self {
            Predicate::And(items) => items.iter().flat_map(|p| p.conjuncts()).collect(),
            other => vec![other.clone()],
        }
    }

    pub fn and_all(mut items: Vec<Predicate>) -> Option<Predicate> {
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Predicate::And(items)),
        }
    }

    pub fn walk_scalars(&self, visit: &mut dyn FnMut(&ScalarExpr)) {
        match self {
            Predicate::And(items) | Predicate::Or(items) => items.iter().for_each(|p| p.walk_scalars(visit)),
            Predicate::Not(inner) => inner.walk_scalars(visit),
            Predicate::Compare { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Predicate::IsNull { expr, .. } => expr.walk(visit),
            Predicate::InList { expr, list, .. } => {
                expr.walk(visit);
                list.iter().for_each(|e| e.walk(visit));
            }
            Predicate::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
            Predicate::FullText { column, value } => {
                ScalarExpr::Column(column.clone()).walk(visit);
                value.walk(visit);
            }
            Predicate::Const3(_) => {}
        }
    }

    pub fn columns(&self) -> Vec<Column> {
        let mut out = vec![];
        self.walk_scalars(&mut |e| {
            if let ScalarExpr::Column(c) = e {
                out.push(c.clone());
            }
        });
        out
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk_scalars(&mut |e| {
            if let ScalarExpr::Function(f) = e {
                found |= f.is_aggregate();
            }
        });
        found
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        match item {
            Predicate::And(_) | Predicate::Or(_) => write!(f, "({})", item)?,
            other => write!(f, "{}", other)?,
        }
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(items) => write_joined(f, items, "AND"),
            Predicate::Or(items) => write_joined(f, items, "OR"),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Predicate::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Predicate::InList { expr, list, negated } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Predicate::Like { expr, pattern, negated } => {
                write!(f, "{} {}LIKE {}", expr, if *negated { "NOT " } else { "" }, pattern)
            }
            Predicate::FullText { column, value } => write!(f, "CONTAINS({}, {})", column, value),
            Predicate::Const3(Truth::True) => write!(f, "1 = 1"),
            Predicate::Const3(Truth::False) => write!(f, "1 = 0"),
            Predicate::Const3(Truth::Unknown) => write!(f, "{} = 1", Literal::Null),
        }
    }
}
