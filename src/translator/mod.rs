pub mod translation_error;
pub use translation_error::*;

pub mod translator_options;
pub use translator_options::*;

pub mod translation_context;
pub use translation_context::*;

pub mod resolvers;
pub use resolvers::*;

pub mod sql2fetchxml;
pub use sql2fetchxml::*;
