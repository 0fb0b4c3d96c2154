pub mod scalar_resolver;
pub use scalar_resolver::*;

pub mod predicate_resolver;
pub use predicate_resolver::*;

pub mod join_resolver;
pub use join_resolver::*;

pub mod projection_resolver;
pub use projection_resolver::*;

pub mod order_by_resolver;
pub use order_by_resolver::*;

pub mod limit_resolver;
pub use limit_resolver::*;

pub mod aggregate_resolver;
pub use aggregate_resolver::*;

pub mod dml_resolver;
pub use dml_resolver::*;

pub mod metadata_resolver;
pub use metadata_resolver::*;
