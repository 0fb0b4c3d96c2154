pub mod rewrite_visitor_base;
pub use rewrite_visitor_base::*;

pub mod rewrite_visitor;
pub use rewrite_visitor::*;
