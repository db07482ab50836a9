//! IQL AST - grammar, narrowing, argument resolution and type validation
//!
//! ```ignore
//! let query = iql_ast::parse_filter("filter_by_city('cracow')", &catalog, &[]).await?;
//! ```

mod builder;
pub mod error;
mod grammar;
mod normalize;
mod parser;
mod resolver;
mod validator;

pub use error::{IqlError, ParseError, Snippet, Span};
pub use normalize::normalize;
pub use parser::{parse_aggregation, parse_filter};
pub use validator::{validate, TypeMismatch};
