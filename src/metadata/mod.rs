pub mod entity_metadata;
pub use entity_metadata::*;

pub mod resolution_error;
pub use resolution_error::*;

pub mod virtual_tables;
pub use virtual_tables::*;

pub mod cache;
pub use cache::*;

pub mod scope;
pub use scope::*;
