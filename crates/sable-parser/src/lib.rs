//! Scanner, recovering parser and directive extraction for Dart sources

pub mod ast;
pub mod directives;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod token;

pub use ast::{CompilationUnit, NodeId, Span};
pub use directives::{extract_dependencies, resolve_directive_uri, DirectiveDependencies};
pub use error::ParserError;
pub use parser::{parse_source, ParseOptions, ParseResult, ParsedSource, Parser};
pub use scanner::{scan, ScanResult};
pub use token::{Keyword, Token, TokenKind, TokenStream};
