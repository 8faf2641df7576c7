//! Syntax layer: Logos lexer, parser and the lossless [`SyntaxTree`].
//!
//! The file view hands every source file it loads through
//! [`SyntaxTree::from_bytes`], so syntax errors stay attached to the tree
//! instead of failing the load.

mod lexer;
pub mod parser;
mod syntax_kind;
mod tree;

pub use lexer::{Lexer, Token, tokenize};
pub use parser::{Parse, SyntaxError, parse};
pub use syntax_kind::{SourceLanguage, SyntaxKind, SyntaxNode, SyntaxToken};
pub use tree::SyntaxTree;
