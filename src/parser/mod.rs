pub mod ast;

pub mod parse_error;
pub use parse_error::*;

pub mod token;
pub use token::*;

pub mod query_parser;
pub use query_parser::*;
