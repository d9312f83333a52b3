//! JavaScript parser
//!
//! Tokenizes and parses source text into a syntax tree that the
//! interpreter walks directly.

pub mod ast;
pub mod lexer;
pub mod parser;

// Re-exports
pub use ast::{FunctionNode, Source};
pub use lexer::{Lexer, Token};
pub use parser::{MAX_NESTING_DEPTH, ParseError, parse_program};
