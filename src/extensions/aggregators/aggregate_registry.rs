use std::{collections::HashMap, sync::Arc};

use crate::extensions::{AggregateImpl, AvgImpl, CountImpl, MaxImpl, MinImpl, SumImpl};

/// Case-insensitive registry of aggregates.
#[derive(Default)]
pub struct AggregateRegistry {
    by_name: HashMap<String, Arc<dyn AggregateImpl>>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self { by_name: HashMap::new() }
    }

    pub fn register<I: AggregateImpl + 'static>(&mut self, implementation: I) {
        self.by_name.insert(implementation.name().to_string(), Arc::new(implementation));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AggregateImpl>> {
        self.by_name.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn default_aggregate_registry() -> Self {
        let mut registry = Self::new();
        registry.register(CountImpl);
        registry.register(SumImpl);
        registry.register(AvgImpl);
        registry.register(MinImpl);
        registry.register(MaxImpl);
        registry
    }
}

#[cfg(test)]
mod tests {
    use crate::{client::Value, extensions::{AggregateRegistry, AvgImpl, AggregateImpl, CountImpl, MaxImpl, MinImpl, SumImpl}};

    #[test]
    fn registry_contains_all_and_lookup_is_case_insensitive() {
        let r = AggregateRegistry::default_aggregate_registry();
        assert_eq!(r.list(), vec!["avg", "count", "max", "min", "sum"]);
        assert!(r.get("COUNT").is_some());
        assert!(r.get("sUm").is_some());
        assert!(r.get("median").is_none());
    }

    #[test]
    fn count_star_and_count_expr() {
        let mut acc = CountImpl.create_accumulator();
        acc.update(&[]).unwrap();
        acc.update(&[Value::Null]).unwrap();
        acc.update(&[Value::Int(1)]).unwrap();
        assert_eq!(acc.finalize(), Value::Int(2));
    }

    #[test]
    fn sum_widens_to_float() {
        let mut a = SumImpl.create_accumulator();
        a.update(&[Value::Null]).unwrap();
        a.update(&[Value::Int(2)]).unwrap();
        a.update(&[Value::Int(3)]).unwrap();
        assert_eq!(a.finalize(), Value::Int(5));

        a.update(&[Value::Float(0.5)]).unwrap();
        assert_eq!(a.finalize(), Value::Float(5.5));

        let mut empty = SumImpl.create_accumulator();
        empty.update(&[Value::Null]).unwrap();
        assert_eq!(empty.finalize(), Value::Null);
    }

    #[test]
    fn sum_rejects_text() {
        let mut a = SumImpl.create_accumulator();
        assert!(a.update(&[Value::from("abc")]).is_err());
    }

    #[test]
    fn avg_ignores_null() {
        let mut a = AvgImpl.create_accumulator();
        a.update(&[Value::Null]).unwrap();
        a.update(&[Value::Int(2)]).unwrap();
        a.update(&[Value::Int(3)]).unwrap();
        assert_eq!(a.finalize(), Value::Float(2.5));
    }

    #[test]
    fn min_max_compare_strings_case_insensitively() {
        let mut min = MinImpl.create_accumulator();
        let mut max = MaxImpl.create_accumulator();
        for s in ["pear", "Apple", "plum"] {
            min.update(&[Value::from(s)]).unwrap();
            max.update(&[Value::from(s)]).unwrap();
        }
        assert_eq!(min.finalize(), Value::from("Apple"));
        assert_eq!(max.finalize(), Value::from("plum"));
    }
}
