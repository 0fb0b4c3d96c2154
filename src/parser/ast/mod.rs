pub mod truth;
pub use truth::*;

pub mod literal;
pub use literal::*;

pub mod operators;
pub use operators::*;

pub mod column;
pub use column::*;

pub mod function;
pub use function::*;

pub mod scalar_expr;
pub use scalar_expr::*;

pub mod predicate;
pub use predicate::*;

pub mod table_source;
pub use table_source::*;

pub mod select;
pub use select::*;

pub mod dml;
pub use dml::*;

pub mod statement;
pub use statement::*;
