use std::fmt;

use crate::parser::ast::{Column, Predicate, ScalarExpr};

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: ScalarExpr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    pub expr: ScalarExpr,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateColumn {
    /// Lowercase aggregate name: count, sum, avg, min, max.
    pub func: String,
    /// `None` counts rows.
    pub arg: Option<ScalarExpr>,
    pub distinct: bool,
    pub output: String,
}

/// A post-processing step applied to retrieved rows, in list order.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    ComputeColumn { expr: ScalarExpr, output: String },
    FilterRows { predicate: Predicate },
    Sort { keys: Vec<SortKey> },
    ApplyLimit { offset: usize, count: Option<usize> },
    /// Same rule as `FilterRows`, over one row per group.
    Having { predicate: Predicate },
    NormalizeCollationKey { column: Column },
    Aggregate { groups: Vec<GroupKey>, aggregates: Vec<AggregateColumn> },
    Distinct { columns: Vec<DistinctColumn> },
}

/// An output column compared by `Distinct`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinctColumn {
    pub name: String,
    pub case_sensitive: bool,
}

impl DistinctColumn {
    /// One entry per output column; names in `case_sensitive` keep their case.
    pub fn for_outputs(column_set: &[String], case_sensitive: &[String]) -> Vec<Self> {
        column_set
            .iter()
            .map(|name| DistinctColumn { name: name.clone(), case_sensitive: case_sensitive.contains(name) })
            .collect()
    }
}

impl Extension {
    /// Whether the step can drop, add or reorder rows.
    pub fn changes_rows(&self) -> bool {
        !matches!(self, Extension::ComputeColumn { .. } | Extension::NormalizeCollationKey { .. })
    }

    /// The output of a computed column that asks for a case-sensitive collation.
    pub fn case_sensitive_output(&self) -> Option<&str> {
        match self {
            Extension::ComputeColumn { expr, output } if expr.is_case_sensitive() => Some(output),
            _ => None,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::ComputeColumn { expr, output } => write!(f, "ComputeColumn({} AS {})", expr, output),
            Extension::FilterRows { predicate } => write!(f, "FilterRows({})", predicate),
            Extension::Sort { keys } => {
                write!(f, "Sort(")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}{}", k.expr, if k.descending { " DESC" } else { "" })?;
                }
                write!(f, ")")
            }
            Extension::ApplyLimit { offset, count } => match count {
                Some(c) => write!(f, "ApplyLimit({}, {})", offset, c),
                None => write!(f, "ApplyLimit({})", offset),
            },
            Extension::Having { predicate } => write!(f, "Having({})", predicate),
            Extension::NormalizeCollationKey { column } => write!(f, "NormalizeCollationKey({})", column),
            Extension::Aggregate { groups, aggregates } => write!(
                f,
                "Aggregate([{}], [{}])",
                groups.iter().map(|g| g.output.as_str()).collect::<Vec<_>>().join(", "),
                aggregates.iter().map(|a| a.output.as_str()).collect::<Vec<_>>().join(", ")
            ),
            Extension::Distinct { columns } => {
                let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                write!(f, "Distinct({})", names.join(", "))
            }
        }
    }
}
