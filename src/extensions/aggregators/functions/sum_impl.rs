use crate::{client::Value, extensions::{Accumulator, AggregateImpl, ExtensionError}};

pub struct SumImpl;

impl AggregateImpl for SumImpl {
    fn name(&self) -> &'static str { "sum" }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SumAcc { int: 0, float: 0.0, seen_float: false, seen: false })
    }
}

struct SumAcc {
    int: i64,
    float: f64,
    seen_float: bool,
    seen: bool,
}

impl Accumulator for SumAcc {
    fn update(&mut self, args: &[Value]) -> Result<(), ExtensionError> {
        let [v] = args else {
            return Err(ExtensionError::arguments("sum", "SUM(expr)"));
        };
        match v {
            Value::Null => return Ok(()),
            Value::Int(i) => self.int += i,
            Value::Bool(b) => self.int += *b as i64,
            other => {
                let f = other.as_f64().ok_or_else(|| ExtensionError::InvalidValue {
                    function: "SUM".into(),
                    value: other.to_string(),
                })?;
                self.float += f;
                self.seen_float = true;
            }
        }
        self.seen = true;
        Ok(())
    }

    fn finalize(&self) -> Value {
        match (self.seen, self.seen_float) {
            (false, _) => Value::Null,
            (true, false) => Value::Int(self.int),
            (true, true) => Value::Float(self.float + self.int as f64),
        }
    }
}
