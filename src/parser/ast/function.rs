use std::fmt;

use crate::parser::{ast::{Column, Literal, ScalarExpr}, ParseError, QueryParser};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    pub name: String,
    pub args: Vec<ScalarExpr>,
    pub distinct: bool,
}

impl Function {
    pub fn new(name: &str, args: Vec<ScalarExpr>) -> Self {
        Self { name: name.to_string(), args, distinct: false }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.name.to_ascii_lowercase().as_str(), "count" | "sum" | "avg" | "min" | "max")
    }

    /// `COUNT(*)` and `COUNT(1)` both count rows.
    pub fn is_count_star(&self) -> bool {
        self.name.eq_ignore_ascii_case("count")
            && !self.distinct
            && matches!(self.args.as_slice(), [ScalarExpr::WildCard] | [ScalarExpr::Literal(Literal::Int(1))])
    }

    /// Parses the argument list after the function name; the current token is `(`.
    pub fn parse_args(name: String, parser: &mut QueryParser) -> Result<Function, ParseError> {
        parser.expect_symbol("(")?;
        let distinct = parser.eat_keyword("DISTINCT");
        let mut args = vec![];

        if !parser.is_symbol(")") {
            loop {
                if parser.is_symbol("*") {
                    parser.next();
                    args.push(ScalarExpr::WildCard);
                } else {
                    args.push(ScalarExpr::parse(parser)?);
                }
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        }
        parser.expect_symbol(")")?;

        // DATEADD(day, ...) names the date part with a bare word
        if Self::takes_date_part(&name) {
            if let Some(ScalarExpr::Column(Column { collection: None, name: part, .. })) = args.first() {
                args[0] = ScalarExpr::Literal(Literal::String(part.to_ascii_lowercase()));
            }
        }

        Ok(Function { name, args, distinct })
    }

    fn takes_date_part(name: &str) -> bool {
        matches!(name.to_ascii_lowercase().as_str(), "dateadd" | "datediff" | "datepart")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name.to_uppercase())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
