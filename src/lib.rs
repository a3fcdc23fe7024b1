//! Netsift: a display filter engine for decoded network records.
//!
//! The engine compiles a textual filter ("tcp.port == 80 &&
//! http.request.method == \"GET\"") into an immutable bytecode object and
//! evaluates it against the field tree a protocol dissector produced for
//! each captured record.
//!
//! # Architecture
//! - Field registry (names and value kinds, supplied by the dissector)
//! - Lexer and recursive-descent parser (AST with source locations)
//! - Semantic analysis (name resolution, type checking, coercions)
//! - Compilation to a flat instruction sequence
//! - Stack-machine evaluation, one call per record, shareable across
//!   worker threads
//! - Plugin registry for externally supplied filter functions

mod ast;
mod compiler;
mod engine;
mod filter;
mod functions;
mod ir;
mod lexer;
mod loc;
mod parser;
mod plugin;
mod record;
mod schema;
mod semantic;
mod types;
mod vm;

pub use ast::*;
pub use compiler::*;
pub use engine::*;
pub use filter::*;
pub use functions::*;
pub use ir::*;
pub use lexer::*;
pub use loc::*;
pub use parser::*;
pub use plugin::*;
pub use record::*;
pub use schema::*;
pub use semantic::*;
pub use types::*;

use thiserror::Error;

/// Result type alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Unified error type. Every variant that can point at filter text
/// carries the offending [`Location`], for editors to highlight.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Unrecognized character or malformed literal.
    #[error("lexical error at {loc}: {message}")]
    Lex { loc: Location, message: String },

    /// Grammar violation, unexpected token, unterminated expression.
    #[error("syntax error at {loc}: {message}")]
    Syntax { loc: Location, message: String },

    /// Field or function name not present in the registry.
    #[error("unknown identifier '{name}' at {loc}")]
    UnknownIdentifier { loc: Location, name: String },

    /// Function called with the wrong number of arguments.
    #[error("function '{name}' takes {expected} argument(s), got {got} at {loc}")]
    Arity {
        loc: Location,
        name: String,
        expected: String,
        got: usize,
    },

    /// Operands of incompatible kinds with no defined coercion.
    #[error("type mismatch at {loc}: {message}")]
    TypeMismatch { loc: Location, message: String },

    /// Malformed regular expression, byte sequence, or address literal.
    #[error("malformed literal at {loc}: {message}")]
    Pattern { loc: Location, message: String },

    /// Plugin init/cleanup failure; fatal to that plugin only.
    #[error("filter plugin '{name}': {message}")]
    Plugin { name: String, message: String },

    /// Compiler-stage inconsistency. Unreachable from a correctly checked
    /// tree; never user-facing.
    #[error("internal filter engine error: {message}")]
    Internal { message: String },
}

impl FilterError {
    /// The source span this error points at, or [`Location::EMPTY`] when
    /// no meaningful span exists.
    pub fn location(&self) -> Location {
        match self {
            FilterError::Lex { loc, .. }
            | FilterError::Syntax { loc, .. }
            | FilterError::UnknownIdentifier { loc, .. }
            | FilterError::Arity { loc, .. }
            | FilterError::TypeMismatch { loc, .. }
            | FilterError::Pattern { loc, .. } => *loc,
            FilterError::Plugin { .. } | FilterError::Internal { .. } => Location::EMPTY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_location_accessor() {
        let err = FilterError::Syntax {
            loc: Location::new(4, 2),
            message: "unexpected token".into(),
        };
        assert_eq!(err.location(), Location::new(4, 2));
        let err = FilterError::Plugin {
            name: "p".into(),
            message: "down".into(),
        };
        assert_eq!(err.location(), Location::EMPTY);
    }

    #[test]
    fn test_error_display_mentions_location() {
        let err = FilterError::UnknownIdentifier {
            loc: Location::new(0, 11),
            name: "bogus.field".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bogus.field"));
        assert!(msg.contains("column 0"));
    }
}
