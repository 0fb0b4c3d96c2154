use std::fmt;

use crate::parser::QueryParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparatorOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq
}

impl fmt::Display for ComparatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparatorOp::Eq => write!(f, "="),
            ComparatorOp::NotEq => write!(f, "<>"),
            ComparatorOp::Lt => write!(f, "<"),
            ComparatorOp::LtEq => write!(f, "<="),
            ComparatorOp::Gt => write!(f, ">"),
            ComparatorOp::GtEq => write!(f, ">="),
        }
    }
}

impl ComparatorOp {
    pub fn check(parser: &mut QueryParser) -> Option<ComparatorOp> {
        let op = match parser.current() {
            Some(t) if t.is_symbol("=") => ComparatorOp::Eq,
            Some(t) if t.is_symbol("<>") || t.is_symbol("!=") => ComparatorOp::NotEq,
            Some(t) if t.is_symbol("<") => ComparatorOp::Lt,
            Some(t) if t.is_symbol("<=") => ComparatorOp::LtEq,
            Some(t) if t.is_symbol(">") => ComparatorOp::Gt,
            Some(t) if t.is_symbol(">=") => ComparatorOp::GtEq,
            _ => return None,
        };
        parser.next();
        Some(op)
    }

    /// Operator to use when the operands are swapped: `1 < a` is `a > 1`.
    pub fn reversed(&self) -> ComparatorOp {
        match self {
            ComparatorOp::Lt => ComparatorOp::Gt,
            ComparatorOp::LtEq => ComparatorOp::GtEq,
            ComparatorOp::Gt => ComparatorOp::Lt,
            ComparatorOp::GtEq => ComparatorOp::LtEq,
            other => *other,
        }
    }

    pub fn negated(&self) -> ComparatorOp {
        match self {
            ComparatorOp::Eq => ComparatorOp::NotEq,
            ComparatorOp::NotEq => ComparatorOp::Eq,
            ComparatorOp::Lt => ComparatorOp::GtEq,
            ComparatorOp::LtEq => ComparatorOp::Gt,
            ComparatorOp::Gt => ComparatorOp::LtEq,
            ComparatorOp::GtEq => ComparatorOp::Lt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    pub fn check(parser: &mut QueryParser, multiplicative: bool) -> Option<ArithmeticOp> {
        let op = match parser.current() {
            Some(t) if !multiplicative && t.is_symbol("+") => ArithmeticOp::Add,
            Some(t) if !multiplicative && t.is_symbol("-") => ArithmeticOp::Sub,
            Some(t) if multiplicative && t.is_symbol("*") => ArithmeticOp::Mul,
            Some(t) if multiplicative && t.is_symbol("/") => ArithmeticOp::Div,
            Some(t) if multiplicative && t.is_symbol("%") => ArithmeticOp::Mod,
            _ => return None,
        };
        parser.next();
        Some(op)
    }

    pub fn precedence(&self) -> u8 {
        match self {
            ArithmeticOp::Add | ArithmeticOp::Sub => 1,
            ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Mod => 2,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticOp::Add => write!(f, "+"),
            ArithmeticOp::Sub => write!(f, "-"),
            ArithmeticOp::Mul => write!(f, "*"),
            ArithmeticOp::Div => write!(f, "/"),
            ArithmeticOp::Mod => write!(f, "%"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
}
