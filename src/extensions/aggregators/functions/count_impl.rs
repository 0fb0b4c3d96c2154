use crate::{client::Value, extensions::{Accumulator, AggregateImpl, ExtensionError}};

pub struct CountImpl;

impl AggregateImpl for CountImpl {
    fn name(&self) -> &'static str { "count" }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(CountAcc { cnt: 0 })
    }
}

struct CountAcc {
    cnt: i64,
}

impl Accumulator for CountAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), ExtensionError> {
        match args {
            [] => self.cnt += 1,
            [v] if !v.is_null() => self.cnt += 1,
            [_] => {}
            _ => return Err(ExtensionError::arguments("count", "COUNT(*|expr)")),
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        Value::Int(self.cnt)
    }
}
