use crate::extensions::Accumulator;

/// Factory for one aggregate function; stateless and shared between groups.
pub trait AggregateImpl: Send + Sync {
    /// Lowercase function name.
    fn name(&self) -> &'static str;

    fn create_accumulator(&self) -> Box<dyn Accumulator>;
}
