use crate::{client::Value, extensions::ExtensionError};

/// The per-group state.
///
/// The interpreter evaluates the aggregate's arguments for every row of a group, calls
/// `update` with them and, once the group is complete, `finalize`. DISTINCT is handled
/// by the caller, which only forwards the first occurrence of each value.
pub trait Accumulator: Send {
    /// An empty slice means `COUNT(*)`.
    fn update(&mut self, args: &[Value]) -> Result<(), ExtensionError>;

    fn finalize(&self) -> Value;
}
