use chrono::{Datelike, Days, Duration, Local, Months, NaiveDate, NaiveDateTime, Timelike, Utc};
use regex::{NoExpand, RegexBuilder};

use crate::{client::Value, extensions::ExtensionError};

/// Scalar functions available to computed columns and local filters.
pub struct Functions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePart {
    Year,
    Quarter,
    Month,
    DayOfYear,
    Day,
    Week,
    Weekday,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DatePart {
    fn parse(name: &str) -> Result<Self, ExtensionError> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "year" | "yy" | "yyyy" => DatePart::Year,
            "quarter" | "qq" | "q" => DatePart::Quarter,
            "month" | "mm" | "m" => DatePart::Month,
            "dayofyear" | "dy" | "y" => DatePart::DayOfYear,
            "day" | "dd" | "d" => DatePart::Day,
            "week" | "wk" | "ww" => DatePart::Week,
            "weekday" | "dw" => DatePart::Weekday,
            "hour" | "hh" => DatePart::Hour,
            "minute" | "mi" | "n" => DatePart::Minute,
            "second" | "ss" | "s" => DatePart::Second,
            "millisecond" | "ms" => DatePart::Millisecond,
            other => return Err(ExtensionError::InvalidValue { function: "date part".into(), value: other.into() }),
        })
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn int_arg(name: &str, value: &Value) -> Result<Option<i64>, ExtensionError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
        .map(Some)
        .ok_or_else(|| ExtensionError::InvalidValue { function: name.to_uppercase(), value: value.to_string() })
}

fn date_arg(name: &str, value: &Value) -> Result<Option<NaiveDateTime>, ExtensionError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_datetime()
        .map(Some)
        .ok_or_else(|| ExtensionError::InvalidValue { function: name.to_uppercase(), value: value.to_string() })
}

fn part_arg(value: &Value) -> Result<DatePart, ExtensionError> {
    match value {
        Value::String(s) => DatePart::parse(s),
        other => Err(ExtensionError::InvalidValue { function: "date part".into(), value: other.to_string() }),
    }
}

fn chars(s: &str, skip: usize, take: usize) -> String {
    s.chars().skip(skip).take(take).collect()
}

impl Functions {
    pub fn call(name: &str, args: &[Value]) -> Result<Value, ExtensionError> {
        let lname = name.to_ascii_lowercase();
        match (lname.as_str(), args) {
            ("upper", [v]) => Ok(text(v).map(|s| Value::String(s.to_uppercase())).unwrap_or_default()),
            ("lower", [v]) => Ok(text(v).map(|s| Value::String(s.to_lowercase())).unwrap_or_default()),
            ("trim", [v]) => Ok(text(v).map(|s| Value::String(s.trim().to_string())).unwrap_or_default()),
            ("ltrim", [v]) => Ok(text(v).map(|s| Value::String(s.trim_start().to_string())).unwrap_or_default()),
            ("rtrim", [v]) => Ok(text(v).map(|s| Value::String(s.trim_end().to_string())).unwrap_or_default()),
            ("len", [v]) => Ok(text(v).map(|s| Value::Int(s.trim_end().chars().count() as i64)).unwrap_or_default()),
            ("left", [v, n]) => {
                let (Some(s), Some(n)) = (text(v), int_arg(&lname, n)?) else { return Ok(Value::Null) };
                Ok(Value::String(chars(&s, 0, n.max(0) as usize)))
            }
            ("right", [v, n]) => {
                let (Some(s), Some(n)) = (text(v), int_arg(&lname, n)?) else { return Ok(Value::Null) };
                let len = s.chars().count();
                let n = (n.max(0) as usize).min(len);
                Ok(Value::String(chars(&s, len - n, n)))
            }
            ("substring", [v, start, length]) => {
                let (Some(s), Some(start), Some(length)) = (text(v), int_arg(&lname, start)?, int_arg(&lname, length)?) else {
                    return Ok(Value::Null);
                };
                if length < 0 {
                    return Err(ExtensionError::InvalidValue { function: "SUBSTRING".into(), value: length.to_string() });
                }
                // positions before 1 eat into the length
                let end = start.saturating_add(length).max(1);
                let start = start.max(1);
                let skip = usize::try_from(start - 1).unwrap_or(usize::MAX);
                let take = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
                Ok(Value::String(chars(&s, skip, take)))
            }
            ("replace", [v, find, replacement]) => {
                let (Some(s), Some(find), Some(replacement)) = (text(v), text(find), text(replacement)) else {
                    return Ok(Value::Null);
                };
                if find.is_empty() {
                    return Ok(Value::String(s));
                }
                let re = RegexBuilder::new(&regex::escape(&find))
                    .case_insensitive(true)
                    .build()
                    .map_err(|_| ExtensionError::InvalidPattern(find.clone()))?;
                Ok(Value::String(re.replace_all(&s, NoExpand(&replacement)).into_owned()))
            }
            ("charindex", [find, v]) => Self::charindex(find, v, 1),
            ("charindex", [find, v, start]) => match int_arg(&lname, start)? {
                Some(start) => Self::charindex(find, v, start),
                None => Ok(Value::Null),
            },
            ("concat", values) if values.len() >= 2 => {
                Ok(Value::String(values.iter().filter_map(text).collect::<Vec<_>>().concat()))
            }
            ("isnull", [v, fallback]) => Ok(if v.is_null() { fallback.clone() } else { v.clone() }),
            ("coalesce", values) if !values.is_empty() => {
                Ok(values.iter().find(|v| !v.is_null()).cloned().unwrap_or_default())
            }
            ("abs", [v]) => Ok(match v {
                Value::Null => Value::Null,
                Value::Int(i) => Value::Int(i.checked_abs().ok_or_else(|| ExtensionError::InvalidValue {
                    function: "ABS".into(),
                    value: i.to_string(),
                })?),
                other => other.as_f64().map(|f| Value::Float(f.abs())).ok_or_else(|| ExtensionError::InvalidValue {
                    function: "ABS".into(),
                    value: other.to_string(),
                })?,
            }),
            ("round", [v, digits]) => {
                let Some(digits) = int_arg(&lname, digits)? else { return Ok(Value::Null) };
                Ok(match v {
                    Value::Null => Value::Null,
                    Value::Int(i) if digits >= 0 => Value::Int(*i),
                    other => {
                        let f = other.as_f64().ok_or_else(|| ExtensionError::InvalidValue {
                            function: "ROUND".into(),
                            value: other.to_string(),
                        })?;
                        let factor = 10f64.powi(digits as i32);
                        Value::Float((f * factor).round() / factor)
                    }
                })
            }
            ("getdate", []) => Ok(Value::DateTime(Local::now().naive_local())),
            ("getutcdate", []) => Ok(Value::DateTime(Utc::now().naive_utc())),
            ("year", [v]) => Ok(date_arg(&lname, v)?.map(|d| Value::Int(d.year() as i64)).unwrap_or_default()),
            ("month", [v]) => Ok(date_arg(&lname, v)?.map(|d| Value::Int(d.month() as i64)).unwrap_or_default()),
            ("day", [v]) => Ok(date_arg(&lname, v)?.map(|d| Value::Int(d.day() as i64)).unwrap_or_default()),
            ("dateadd", [part, n, date]) => {
                let part = part_arg(part)?;
                let (Some(n), Some(date)) = (int_arg(&lname, n)?, date_arg(&lname, date)?) else { return Ok(Value::Null) };
                Self::date_add(part, n, date).map(Value::DateTime)
            }
            ("datediff", [part, start, end]) => {
                let part = part_arg(part)?;
                let (Some(start), Some(end)) = (date_arg(&lname, start)?, date_arg(&lname, end)?) else {
                    return Ok(Value::Null);
                };
                Ok(Value::Int(Self::date_diff(part, start, end)))
            }
            ("datepart", [part, date]) => {
                let part = part_arg(part)?;
                Ok(date_arg(&lname, date)?.map(|d| Value::Int(Self::date_part(part, d))).unwrap_or_default())
            }
            (
                "upper" | "lower" | "trim" | "ltrim" | "rtrim" | "len" | "left" | "right" | "substring" | "replace"
                | "charindex" | "concat" | "isnull" | "coalesce" | "abs" | "round" | "getdate" | "getutcdate" | "year"
                | "month" | "day" | "dateadd" | "datediff" | "datepart",
                _,
            ) => Err(ExtensionError::arguments(name, &format!("{} arguments", Self::arity(&lname)))),
            _ => Err(ExtensionError::UnknownFunction(name.to_uppercase())),
        }
    }

    fn arity(name: &str) -> &'static str {
        match name {
            "getdate" | "getutcdate" => "no",
            "left" | "right" | "isnull" | "round" | "datepart" => "2",
            "substring" | "replace" | "dateadd" | "datediff" => "3",
            "charindex" => "2 or 3",
            "concat" => "at least 2",
            "coalesce" => "at least 1",
            _ => "1",
        }
    }

    fn charindex(find: &Value, v: &Value, start: i64) -> Result<Value, ExtensionError> {
        let (Some(find), Some(s)) = (text(find), text(v)) else { return Ok(Value::Null) };
        let haystack: Vec<char> = s.to_lowercase().chars().collect();
        let needle: Vec<char> = find.to_lowercase().chars().collect();
        let from = (start.max(1) - 1) as usize;
        if needle.is_empty() || haystack.len() < needle.len() {
            return Ok(Value::Int(0));
        }
        let position = (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == needle[..]);
        Ok(Value::Int(position.map(|p| p as i64 + 1).unwrap_or(0)))
    }

    fn date_add(part: DatePart, n: i64, date: NaiveDateTime) -> Result<NaiveDateTime, ExtensionError> {
        let months = |m: Option<i64>| {
            let m = m?;
            let count = Months::new(u32::try_from(m.unsigned_abs()).ok()?);
            if m >= 0 { date.checked_add_months(count) } else { date.checked_sub_months(count) }
        };
        let shift = |delta: Option<Duration>| date.checked_add_signed(delta?);
        let result = match part {
            DatePart::Year => months(n.checked_mul(12)),
            DatePart::Quarter => months(n.checked_mul(3)),
            DatePart::Month => months(Some(n)),
            DatePart::DayOfYear | DatePart::Day | DatePart::Weekday => shift(Duration::try_days(n)),
            DatePart::Week => shift(Duration::try_weeks(n)),
            DatePart::Hour => shift(Duration::try_hours(n)),
            DatePart::Minute => shift(Duration::try_minutes(n)),
            DatePart::Second => shift(Duration::try_seconds(n)),
            DatePart::Millisecond => shift(Duration::try_milliseconds(n)),
        };
        result.ok_or_else(|| ExtensionError::InvalidValue { function: "DATEADD".into(), value: n.to_string() })
    }

    /// Number of `part` boundaries crossed between the two dates.
    fn date_diff(part: DatePart, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        let days = |a: NaiveDate, b: NaiveDate| (b - a).num_days();
        let week_start = |d: NaiveDate| d.checked_sub_days(Days::new(d.weekday().num_days_from_sunday() as u64)).unwrap_or(d);
        match part {
            DatePart::Year => (end.year() - start.year()) as i64,
            DatePart::Quarter => {
                (end.year() as i64 * 4 + (end.month0() / 3) as i64) - (start.year() as i64 * 4 + (start.month0() / 3) as i64)
            }
            DatePart::Month => (end.year() as i64 * 12 + end.month0() as i64) - (start.year() as i64 * 12 + start.month0() as i64),
            DatePart::DayOfYear | DatePart::Day | DatePart::Weekday => days(start.date(), end.date()),
            DatePart::Week => days(week_start(start.date()), week_start(end.date())) / 7,
            DatePart::Hour => days(start.date(), end.date()) * 24 + end.hour() as i64 - start.hour() as i64,
            DatePart::Minute => {
                Self::date_diff(DatePart::Hour, start, end) * 60 + end.minute() as i64 - start.minute() as i64
            }
            DatePart::Second => {
                Self::date_diff(DatePart::Minute, start, end) * 60 + end.second() as i64 - start.second() as i64
            }
            DatePart::Millisecond => (end - start).num_milliseconds(),
        }
    }

    fn date_part(part: DatePart, date: NaiveDateTime) -> i64 {
        match part {
            DatePart::Year => date.year() as i64,
            DatePart::Quarter => (date.month0() / 3 + 1) as i64,
            DatePart::Month => date.month() as i64,
            DatePart::DayOfYear => date.ordinal() as i64,
            DatePart::Day => date.day() as i64,
            DatePart::Week => {
                let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date.date());
                ((date.ordinal0() + jan1.weekday().num_days_from_sunday()) / 7 + 1) as i64
            }
            DatePart::Weekday => (date.weekday().num_days_from_sunday() + 1) as i64,
            DatePart::Hour => date.hour() as i64,
            DatePart::Minute => date.minute() as i64,
            DatePart::Second => date.second() as i64,
            DatePart::Millisecond => (date.nanosecond() / 1_000_000) as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{client::Value, extensions::{ExtensionError, Functions}};

    fn call(name: &str, args: &[Value]) -> Value {
        Functions::call(name, args).unwrap()
    }

    fn date(text: &str) -> Value {
        Value::DateTime(Value::parse_datetime(text).unwrap())
    }

    #[test]
    fn string_functions() {
        assert_eq!(call("LEFT", &["Carrington".into(), 1.into()]), Value::from("C"));
        assert_eq!(call("right", &["Carrington".into(), 3.into()]), Value::from("ton"));
        assert_eq!(call("substring", &["Carrington".into(), 2.into(), 3.into()]), Value::from("arr"));
        assert_eq!(call("len", &["abc  ".into()]), Value::Int(3));
        assert_eq!(
            call("replace", &["--Dataflex Pro--".into(), "dataflex pro".into(), "CDS".into()]),
            Value::from("--CDS--")
        );
        assert_eq!(call("charindex", &["ring".into(), "Carrington".into()]), Value::Int(4));
        assert_eq!(call("concat", &["a".into(), Value::Null, 1.into()]), Value::from("a1"));
    }

    #[test]
    fn null_arguments_propagate() {
        assert_eq!(call("upper", &[Value::Null]), Value::Null);
        assert_eq!(call("left", &[Value::Null, 1.into()]), Value::Null);
        assert_eq!(call("isnull", &[Value::Null, "x".into()]), Value::from("x"));
        assert_eq!(call("coalesce", &[Value::Null, Value::Null, 2.into()]), Value::Int(2));
    }

    #[test]
    fn date_functions() {
        assert_eq!(call("dateadd", &["day".into(), 1.into(), date("2020-01-01 00:30:00")]), date("2020-01-02 00:30:00"));
        assert_eq!(call("dateadd", &["month".into(), (-1).into(), date("2020-03-31")]), date("2020-02-29"));
        assert_eq!(call("datepart", &["minute".into(), date("2020-01-01 00:30:00")]), Value::Int(30));
        assert_eq!(call("datediff", &["hour".into(), "2020-01-01".into(), date("2020-01-01 00:30:00")]), Value::Int(0));
        assert_eq!(call("datediff", &["hour".into(), "2020-01-01".into(), date("2020-02-01")]), Value::Int(744));
        assert_eq!(call("datediff", &["year".into(), date("2019-12-31"), date("2020-01-01")]), Value::Int(1));
        assert_eq!(call("year", &[date("2020-02-01")]), Value::Int(2020));
    }

    #[test]
    fn out_of_range_arguments() {
        assert_eq!(call("substring", &["Carrington".into(), Value::Int(i64::MAX), Value::Int(5)]), Value::from(""));
        assert_eq!(call("substring", &["Carrington".into(), Value::Int(8), Value::Int(i64::MAX)]), Value::from("ton"));
        assert!(Functions::call("substring", &["Carrington".into(), Value::Int(1), Value::Int(-1)]).is_err());
        assert!(Functions::call("abs", &[Value::Int(i64::MIN)]).is_err());

        let cases = [("day", 999_999_999_999_999), ("year", 999_999_999_999_999_999), ("month", 4_294_967_297), ("millisecond", i64::MIN)];
        for (part, n) in cases {
            let err = Functions::call("dateadd", &[part.into(), Value::Int(n), date("2020-01-01")]).unwrap_err();
            assert!(matches!(err, ExtensionError::InvalidValue { ref function, .. } if function == "DATEADD"), "{} {}", part, n);
        }
    }

    #[test]
    fn errors() {
        assert_eq!(Functions::call("soundex", &[]), Err(ExtensionError::UnknownFunction("SOUNDEX".into())));
        assert!(matches!(Functions::call("left", &["a".into()]), Err(ExtensionError::InvalidArguments { .. })));
        assert!(Functions::call("dateadd", &["fortnight".into(), 1.into(), date("2020-01-01")]).is_err());
    }
}
