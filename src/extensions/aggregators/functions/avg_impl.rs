use crate::{client::Value, extensions::{Accumulator, AggregateImpl, ExtensionError}};

pub struct AvgImpl;

impl AggregateImpl for AvgImpl {
    fn name(&self) -> &'static str { "avg" }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(AvgAcc { sum: 0.0, cnt: 0 })
    }
}

struct AvgAcc {
    sum: f64,
    cnt: i64,
}

impl Accumulator for AvgAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), ExtensionError> {
        let [v] = args else {
            return Err(ExtensionError::arguments("avg", "AVG(expr)"));
        };
        if v.is_null() {
            return Ok(());
        }
        let f = v.as_f64().ok_or_else(|| ExtensionError::InvalidValue { function: "AVG".into(), value: v.to_string() })?;
        self.sum += f;
        self.cnt += 1;
        Ok(())
    }

    fn finalize(&self) -> Value {
        if self.cnt == 0 {
            Value::Null
        } else {
            Value::Float(self.sum / self.cnt as f64)
        }
    }
}
