pub mod extension_error;
pub use extension_error::*;

pub mod extension;
pub use extension::*;

pub mod row;
pub use row::*;

pub mod eval;
pub use eval::*;

pub mod functions;
pub use functions::*;

pub mod aggregators;
pub use aggregators::*;

pub mod interpreter;
pub use interpreter::*;
