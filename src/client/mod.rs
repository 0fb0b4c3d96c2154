pub mod value;
pub use value::*;

pub mod entity;
pub use entity::*;

pub mod service;
pub use service::*;

pub mod memory;
pub use memory::*;
