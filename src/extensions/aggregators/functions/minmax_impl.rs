use std::cmp::Ordering;

use crate::{client::Value, extensions::{Accumulator, AggregateImpl, ExtensionError}};

pub struct MinImpl;
pub struct MaxImpl;

impl AggregateImpl for MinImpl {
    fn name(&self) -> &'static str { "min" }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(MinMaxAcc { best: None, keep: Ordering::Less })
    }
}

impl AggregateImpl for MaxImpl {
    fn name(&self) -> &'static str { "max" }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(MinMaxAcc { best: None, keep: Ordering::Greater })
    }
}

struct MinMaxAcc {
    best: Option<Value>,
    /// A new value replaces the current one when it compares this way.
    keep: Ordering,
}

impl Accumulator for MinMaxAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), ExtensionError> {
        let [v] = args else {
            return Err(ExtensionError::arguments(if self.keep == Ordering::Less { "min" } else { "max" }, "MIN|MAX(expr)"));
        };
        if v.is_null() {
            return Ok(());
        }
        let replace = match &self.best {
            None => true,
            Some(best) => v.compare(best, false) == Some(self.keep),
        };
        if replace {
            self.best = Some(v.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        self.best.clone().unwrap_or(Value::Null)
    }
}
