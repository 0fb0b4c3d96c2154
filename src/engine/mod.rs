pub mod execution_error;
pub use execution_error::*;

pub mod options;
pub use options::*;

pub mod query;
pub use query::*;

pub mod executor;

pub mod mutation;

pub mod metadata_execution;
pub use metadata_execution::*;
