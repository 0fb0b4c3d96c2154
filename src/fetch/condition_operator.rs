use std::collections::HashMap;

use once_cell::sync::Lazy;

macro_rules! condition_operators {
    ($($variant:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ConditionOperator {
            $($variant),*
        }

        impl ConditionOperator {
            pub const ALL: &'static [ConditionOperator] = &[$(ConditionOperator::$variant),*];

            /// Name used in the `operator` attribute.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ConditionOperator::$variant => $name),*
                }
            }
        }
    };
}

condition_operators! {
    Equal => "eq",
    NotEqual => "ne",
    LessThan => "lt",
    LessEqual => "le",
    GreaterThan => "gt",
    GreaterEqual => "ge",
    Like => "like",
    NotLike => "not-like",
    Null => "null",
    NotNull => "not-null",
    In => "in",
    NotIn => "not-in",
    ContainValues => "contain-values",
    NotContainValues => "not-contain-values",
    On => "on",
    OnOrAfter => "on-or-after",
    OnOrBefore => "on-or-before",
    Yesterday => "yesterday",
    Today => "today",
    Tomorrow => "tomorrow",
    Last7Days => "last-seven-days",
    Next7Days => "next-seven-days",
    LastWeek => "last-week",
    ThisWeek => "this-week",
    NextWeek => "next-week",
    LastMonth => "last-month",
    ThisMonth => "this-month",
    NextMonth => "next-month",
    LastYear => "last-year",
    ThisYear => "this-year",
    NextYear => "next-year",
    LastXHours => "last-x-hours",
    NextXHours => "next-x-hours",
    LastXDays => "last-x-days",
    NextXDays => "next-x-days",
    LastXWeeks => "last-x-weeks",
    NextXWeeks => "next-x-weeks",
    LastXMonths => "last-x-months",
    NextXMonths => "next-x-months",
    LastXYears => "last-x-years",
    NextXYears => "next-x-years",
    OlderThanXDays => "olderthan-x-days",
    OlderThanXMonths => "olderthan-x-months",
    OlderThanXYears => "olderthan-x-years",
    Under => "under",
    UnderOrEqual => "eq-or-under",
    Above => "above",
    AboveOrEqual => "eq-or-above",
    EqualUserId => "eq-userid",
    NotEqualUserId => "ne-userid",
    EqualBusinessId => "eq-businessid",
}

// SQL spelling of the function form: `lastxdays(7)`, `today()`, `under(@id)`.
static FUNCTION_NAMES: Lazy<HashMap<String, ConditionOperator>> = Lazy::new(|| {
    ConditionOperator::ALL
        .iter()
        .filter(|op| !op.is_comparison())
        .map(|op| (op.as_str().replace('-', ""), *op))
        .collect()
});

impl ConditionOperator {
    /// Operators a SQL comparison or predicate can map onto directly.
    pub fn is_comparison(&self) -> bool {
        use ConditionOperator::*;
        matches!(self, Equal | NotEqual | LessThan | LessEqual | GreaterThan | GreaterEqual
            | Like | NotLike | Null | NotNull | In | NotIn | ContainValues | NotContainValues)
    }

    pub fn from_function_name(name: &str) -> Option<ConditionOperator> {
        FUNCTION_NAMES.get(&name.to_ascii_lowercase()).copied()
    }

    /// Number of values the function form takes.
    pub fn value_count(&self) -> usize {
        use ConditionOperator::*;
        match self {
            Null | NotNull | Yesterday | Today | Tomorrow | Last7Days | Next7Days | LastWeek | ThisWeek
            | NextWeek | LastMonth | ThisMonth | NextMonth | LastYear | ThisYear | NextYear
            | EqualUserId | NotEqualUserId | EqualBusinessId => 0,
            In | NotIn | ContainValues | NotContainValues => usize::MAX,
            _ => 1,
        }
    }

    pub fn negated(&self) -> Option<ConditionOperator> {
        use ConditionOperator::*;
        Some(match self {
            Equal => NotEqual,
            NotEqual => Equal,
            LessThan => GreaterEqual,
            LessEqual => GreaterThan,
            GreaterThan => LessEqual,
            GreaterEqual => LessThan,
            Like => NotLike,
            NotLike => Like,
            Null => NotNull,
            NotNull => Null,
            In => NotIn,
            NotIn => In,
            ContainValues => NotContainValues,
            NotContainValues => ContainValues,
            EqualUserId => NotEqualUserId,
            NotEqualUserId => EqualUserId,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ConditionOperator;

    #[test]
    fn function_names_drop_hyphens() {
        assert_eq!(ConditionOperator::from_function_name("LastXDays"), Some(ConditionOperator::LastXDays));
        assert_eq!(ConditionOperator::from_function_name("today"), Some(ConditionOperator::Today));
        assert_eq!(ConditionOperator::from_function_name("eq"), None);
        assert_eq!(ConditionOperator::from_function_name("left"), None);
    }

    #[test]
    fn negation_is_symmetric() {
        for op in ConditionOperator::ALL {
            if let Some(n) = op.negated() {
                assert_eq!(n.negated(), Some(*op));
            }
        }
    }
}
