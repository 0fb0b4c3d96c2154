use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::RwLock,
};

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::{
    client::{Entity, Value},
    extensions::{ExtensionError, Functions, Row},
    parser::ast::{ArithmeticOp, ComparatorOp, Predicate, ScalarExpr, Truth, UnaryOp},
};

pub struct Eval;

impl Eval {
    pub fn eval_scalar(expr: &ScalarExpr, row: &Row) -> Result<Value, ExtensionError> {
        match expr {
            ScalarExpr::Literal(l) => Ok(Value::from_literal(l)),
            ScalarExpr::Column(c) => Ok(row.get(&c.row_key()).clone()),
            ScalarExpr::Function(f) => {
                let args = f.args.iter().map(|a| Self::eval_scalar(a, row)).collect::<Result<Vec<_>, _>>()?;
                Functions::call(&f.name, &args)
            }
            ScalarExpr::Binary { left, op, right } => {
                let l = Self::eval_scalar(left, row)?;
                let r = Self::eval_scalar(right, row)?;
                Self::arithmetic(&l, *op, &r)
            }
            ScalarExpr::Unary { op: UnaryOp::Negate, expr } => match Self::eval_scalar(expr, row)? {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ExtensionError::InvalidValue { function: "-".into(), value: other.to_string() }),
            },
            ScalarExpr::SearchedCase { whens, else_expr } => {
                for (condition, value) in whens {
                    if Self::eval_predicate3(condition, row)?.is_true() {
                        return Self::eval_scalar(value, row);
                    }
                }
                Self::eval_else(else_expr.as_deref(), row)
            }
            ScalarExpr::SimpleCase { input, whens, else_expr } => {
                let input = Self::eval_scalar(input, row)?;
                for (when, then) in whens {
                    let candidate = Self::eval_scalar(when, row)?;
                    if input.sql_equals(&candidate, false) == Some(true) {
                        return Self::eval_scalar(then, row);
                    }
                }
                Self::eval_else(else_expr.as_deref(), row)
            }
            ScalarExpr::Collate { expr, .. } => Self::eval_scalar(expr, row),
            ScalarExpr::WildCard | ScalarExpr::WildCardWithCollection(_) => {
                Err(ExtensionError::InvalidValue { function: "SELECT".into(), value: expr.to_string() })
            }
        }
    }

    fn eval_else(else_expr: Option<&ScalarExpr>, row: &Row) -> Result<Value, ExtensionError> {
        match else_expr {
            Some(e) => Self::eval_scalar(e, row),
            None => Ok(Value::Null),
        }
    }

    /// Evaluates an expression that references no columns.
    pub fn eval_constant(expr: &ScalarExpr) -> Result<Value, ExtensionError> {
        Self::eval_scalar(expr, &Row::new(Entity::new("")))
    }

    pub fn eval_predicate3(predicate: &Predicate, row: &Row) -> Result<Truth, ExtensionError> {
        Ok(match predicate {
            Predicate::And(items) => {
                let mut acc = Truth::True;
                for item in items {
                    acc = acc.and(Self::eval_predicate3(item, row)?);
                    if acc == Truth::False {
                        break;
                    }
                }
                acc
            }
            Predicate::Or(items) => {
                let mut acc = Truth::False;
                for item in items {
                    acc = acc.or(Self::eval_predicate3(item, row)?);
                    if acc == Truth::True {
                        break;
                    }
                }
                acc
            }
            Predicate::Not(inner) => Self::eval_predicate3(inner, row)?.not(),
            Predicate::Compare { left, op, right } => {
                let case_sensitive = left.is_case_sensitive() || right.is_case_sensitive();
                let l = Self::eval_scalar(left, row)?;
                let r = Self::eval_scalar(right, row)?;
                Self::compare3(&l, *op, &r, case_sensitive)
            }
            Predicate::IsNull { expr, negated } => {
                let t = Truth::from_bool(Self::eval_scalar(expr, row)?.is_null());
                if *negated { t.not() } else { t }
            }
            Predicate::InList { expr, list, negated } => {
                let v = Self::eval_scalar(expr, row)?;
                let mut t = Truth::False;
                for item in list {
                    let candidate = Self::eval_scalar(item, row)?;
                    t = t.or(Self::compare3(&v, ComparatorOp::Eq, &candidate, false));
                    if t == Truth::True {
                        break;
                    }
                }
                if *negated { t.not() } else { t }
            }
            Predicate::Like { expr, pattern, negated } => {
                let value = Self::eval_scalar(expr, row)?;
                let pattern = Self::eval_scalar(pattern, row)?;
                let t = if value.is_null() || pattern.is_null() {
                    Truth::Unknown
                } else {
                    Truth::from_bool(like_regex(&pattern.to_string())?.is_match(&value.to_string()))
                };
                if *negated { t.not() } else { t }
            }
            Predicate::FullText { column, value } => {
                let stored = row.get(&column.row_key());
                let wanted = Self::eval_scalar(value, row)?;
                if stored.is_null() || wanted.is_null() {
                    Truth::Unknown
                } else {
                    let stored = split_values(&stored.to_string());
                    let wanted = wanted.to_string();
                    let any = wanted
                        .split(',')
                        .flat_map(|part| part.split(" OR ").flat_map(|p| p.split(" or ")))
                        .map(str::trim)
                        .filter(|w| !w.is_empty())
                        .any(|w| stored.iter().any(|s| s.eq_ignore_ascii_case(w)));
                    Truth::from_bool(any)
                }
            }
            Predicate::Const3(t) => *t,
        })
    }

    pub fn compare3(l: &Value, op: ComparatorOp, r: &Value, case_sensitive: bool) -> Truth {
        let Some(ord) = l.compare(r, case_sensitive) else {
            return Truth::Unknown;
        };
        Truth::from_bool(match op {
            ComparatorOp::Eq => ord == Ordering::Equal,
            ComparatorOp::NotEq => ord != Ordering::Equal,
            ComparatorOp::Lt => ord == Ordering::Less,
            ComparatorOp::LtEq => ord != Ordering::Greater,
            ComparatorOp::Gt => ord == Ordering::Greater,
            ComparatorOp::GtEq => ord != Ordering::Less,
        })
    }

    fn arithmetic(l: &Value, op: ArithmeticOp, r: &Value) -> Result<Value, ExtensionError> {
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        let invalid = || ExtensionError::InvalidValue { function: op.to_string(), value: format!("{}, {}", l, r) };

        match (l, op, r) {
            (Value::String(_), ArithmeticOp::Add, _) | (_, ArithmeticOp::Add, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", l, r)))
            }
            (Value::DateTime(d), ArithmeticOp::Add | ArithmeticOp::Sub, n) => {
                let days = n.as_f64().ok_or_else(invalid)?;
                let delta = Duration::try_milliseconds((days * 86_400_000.0).round() as i64).ok_or_else(invalid)?;
                let shifted = if op == ArithmeticOp::Add { d.checked_add_signed(delta) } else { d.checked_sub_signed(delta) };
                shifted.map(Value::DateTime).ok_or_else(invalid)
            }
            (Value::Int(a), _, Value::Int(b)) => {
                let (a, b) = (*a, *b);
                let result = match op {
                    ArithmeticOp::Add => a.checked_add(b),
                    ArithmeticOp::Sub => a.checked_sub(b),
                    ArithmeticOp::Mul => a.checked_mul(b),
                    ArithmeticOp::Div if b == 0 => return Err(ExtensionError::DivideByZero),
                    ArithmeticOp::Div => a.checked_div(b),
                    ArithmeticOp::Mod if b == 0 => return Err(ExtensionError::DivideByZero),
                    ArithmeticOp::Mod => a.checked_rem(b),
                };
                result.map(Value::Int).ok_or_else(invalid)
            }
            _ => {
                let (a, b) = (l.as_f64().ok_or_else(invalid)?, r.as_f64().ok_or_else(invalid)?);
                Ok(Value::Float(match op {
                    ArithmeticOp::Add => a + b,
                    ArithmeticOp::Sub => a - b,
                    ArithmeticOp::Mul => a * b,
                    ArithmeticOp::Div if b == 0.0 => return Err(ExtensionError::DivideByZero),
                    ArithmeticOp::Div => a / b,
                    ArithmeticOp::Mod if b == 0.0 => return Err(ExtensionError::DivideByZero),
                    ArithmeticOp::Mod => a % b,
                }))
            }
        }
    }
}

const LIKE_CACHE_LIMIT: usize = 256;

static LIKE_PATTERNS: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Case-insensitive matcher for a T-SQL LIKE pattern: `%`, `_` and `[...]` sets.
///
/// Compiled patterns are shared process-wide, so a per-row LIKE compiles each distinct pattern once.
pub fn like_regex(pattern: &str) -> Result<Regex, ExtensionError> {
    if let Some(re) = LIKE_PATTERNS.read().ok().and_then(|cache| cache.get(pattern).cloned()) {
        return Ok(re);
    }
    let re = compile_like(pattern)?;
    if let Ok(mut cache) = LIKE_PATTERNS.write() {
        if cache.len() >= LIKE_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

#[cfg(test)]
fn like_cached(pattern: &str) -> bool {
    LIKE_PATTERNS.read().map(|cache| cache.contains_key(pattern)).unwrap_or(false)
}

fn compile_like(pattern: &str) -> Result<Regex, ExtensionError> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '[' => {
                let mut set = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    set.push(c);
                }
                if !closed {
                    return Err(ExtensionError::InvalidPattern(pattern.to_string()));
                }
                regex.push('[');
                if let Some(rest) = set.strip_prefix('^') {
                    regex.push('^');
                    set = rest.to_string();
                }
                for c in set.chars() {
                    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                        regex.push('\\');
                    }
                    regex.push(c);
                }
                regex.push(']');
            }
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    RegexBuilder::new(&regex)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|_| ExtensionError::InvalidPattern(pattern.to_string()))
}

/// Members of a multi-select value stored as `a,b,c`.
pub fn split_values(stored: &str) -> Vec<String> {
    stored.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::like_cached;
    use crate::{
        client::{Entity, Value},
        extensions::{like_regex, Eval, ExtensionError, Row},
        parser::{ast::{Predicate, ScalarExpr, Truth}, QueryParser},
    };

    fn expr(text: &str) -> ScalarExpr {
        ScalarExpr::parse(&mut QueryParser::new(text).unwrap()).unwrap()
    }

    fn predicate(text: &str) -> Predicate {
        Predicate::parse(&mut QueryParser::new(text).unwrap()).unwrap()
    }

    fn row() -> Row {
        Row::new(
            Entity::new("contact")
                .set("firstname", "Mark")
                .set("lastname", "Carrington")
                .set("createdon", Value::parse_datetime("2020-01-01 00:30:00").unwrap())
                .set("c.name", "Data8"),
        )
    }

    #[test]
    fn string_concatenation_and_arithmetic() {
        let row = row();
        assert_eq!(Eval::eval_scalar(&expr("'Hello ' + firstname"), &row).unwrap(), Value::from("Hello Mark"));
        assert_eq!(Eval::eval_scalar(&expr("7 / 2"), &row).unwrap(), Value::Int(3));
        assert_eq!(Eval::eval_scalar(&expr("7.0 / 2"), &row).unwrap(), Value::Float(3.5));
        assert_eq!(Eval::eval_scalar(&expr("1 / 0"), &row), Err(ExtensionError::DivideByZero));
        assert_eq!(Eval::eval_scalar(&expr("middlename + 'x'"), &row).unwrap(), Value::Null);
    }

    #[test]
    fn case_expressions() {
        let row = row();
        let e = expr("CASE WHEN middlename IS NULL THEN 'none' ELSE middlename END");
        assert_eq!(Eval::eval_scalar(&e, &row).unwrap(), Value::from("none"));
        let e = expr("CASE firstname WHEN 'mark' THEN 1 WHEN 'joe' THEN 2 END");
        assert_eq!(Eval::eval_scalar(&e, &row).unwrap(), Value::Int(1));
        assert_eq!(Eval::eval_scalar(&expr("CASE WHEN 1 = 0 THEN 1 END"), &row).unwrap(), Value::Null);
    }

    #[test]
    fn link_columns_use_qualified_keys() {
        assert_eq!(Eval::eval_scalar(&expr("c.name"), &row()).unwrap(), Value::from("Data8"));
    }

    #[test]
    fn three_valued_logic() {
        let row = row();
        assert_eq!(Eval::eval_predicate3(&predicate("middlename = 'x'"), &row).unwrap(), Truth::Unknown);
        assert_eq!(Eval::eval_predicate3(&predicate("NOT middlename = 'x'"), &row).unwrap(), Truth::Unknown);
        assert_eq!(
            Eval::eval_predicate3(&predicate("middlename = 'x' OR firstname = 'MARK'"), &row).unwrap(),
            Truth::True
        );
        assert_eq!(
            Eval::eval_predicate3(&predicate("firstname IN ('Joe', NULL)"), &row).unwrap(),
            Truth::Unknown
        );
    }

    #[test]
    fn collation_makes_comparison_case_sensitive() {
        let row = row();
        assert!(Eval::eval_predicate3(&predicate("firstname = 'mark'"), &row).unwrap().is_true());
        assert!(!Eval::eval_predicate3(&predicate("firstname COLLATE Latin1_General_CS_AS = 'mark'"), &row)
            .unwrap()
            .is_true());
    }

    #[test]
    fn like_is_positional() {
        let row = row();
        assert!(Eval::eval_predicate3(&predicate("'Mark' LIKE firstname"), &row).unwrap().is_true());
        assert!(Eval::eval_predicate3(&predicate("lastname LIKE 'car%'"), &row).unwrap().is_true());
        assert!(Eval::eval_predicate3(&predicate("lastname NOT LIKE '[a-b]%'"), &row).unwrap().is_true());
    }

    #[test]
    fn like_patterns() {
        let re = like_regex("D_ta[0-9]%").unwrap();
        assert!(re.is_match("data8 ltd"));
        assert!(!re.is_match("dta8"));
        assert!(like_regex("a.b").unwrap().is_match("A.B"));
        assert!(!like_regex("a.b").unwrap().is_match("axb"));
        assert!(like_regex("[abc").is_err());
    }

    #[test]
    fn like_patterns_compile_once() {
        let first = like_regex("Carr%ngton_").unwrap();
        assert!(like_cached("Carr%ngton_"));
        let second = like_regex("Carr%ngton_").unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(second.is_match("CARRINGTONS"));
        assert!(like_regex("[unclosed").is_err());
        assert!(!like_cached("[unclosed"));
    }

    #[test]
    fn date_arithmetic_out_of_range() {
        assert!(Eval::eval_scalar(&expr("createdon + 1000000000000000"), &row()).is_err());
    }

    #[test]
    fn date_arithmetic() {
        let row = row();
        assert_eq!(
            Eval::eval_scalar(&expr("createdon + 1"), &row).unwrap(),
            Value::DateTime(Value::parse_datetime("2020-01-02 00:30:00").unwrap())
        );
        assert!(Eval::eval_predicate3(&predicate("DATEDIFF(hour, '2020-01-01', createdon) < 1"), &row)
            .unwrap()
            .is_true());
    }

    #[test]
    fn constants_fold() {
        assert_eq!(Eval::eval_constant(&expr("'Ma' + 'rk'")).unwrap(), Value::from("Mark"));
    }
}
