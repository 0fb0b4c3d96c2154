pub mod condition_operator;
pub use condition_operator::*;

pub mod model;
pub use model::*;

pub mod serializer;

pub mod evaluator;
pub use evaluator::*;
