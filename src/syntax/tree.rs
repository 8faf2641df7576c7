//! Parsed source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowan::GreenNode;
use smol_str::SmolStr;
use text_size::TextSize;

use super::parser::{self, SyntaxError};
use super::syntax_kind::{SyntaxKind, SyntaxNode, SyntaxToken};
use crate::base::LineIndex;
use crate::core::{LoadError, LoadResult};

/// A parsed source file: the lossless tree plus its line index.
///
/// Only the green tree is stored, so a `SyntaxTree` can be shared across
/// threads; [`SyntaxTree::syntax`] materializes a cursor on demand.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    path: PathBuf,
    green: GreenNode,
    line_index: Arc<LineIndex>,
    errors: Vec<SyntaxError>,
}

impl SyntaxTree {
    /// Parses `text` as the content of `path`.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Self {
        let parse = parser::parse(text);
        Self {
            path: path.into(),
            green: parse.green,
            line_index: Arc::new(LineIndex::new(text)),
            errors: parse.errors,
        }
    }

    /// Parses raw file bytes, which must be UTF-8.
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> LoadResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 {
            path: path.to_path_buf(),
        })?;
        Ok(Self::parse(path, text))
    }

    /// The file this tree was parsed from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn line_index(&self) -> &Arc<LineIndex> {
        &self.line_index
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The exact source text the tree was built from.
    pub fn text(&self) -> String {
        self.syntax().text().to_string()
    }

    /// Import paths declared in this file, in source order, without quotes.
    pub fn imports(&self) -> Vec<SmolStr> {
        self.syntax()
            .descendants()
            .filter(|node| node.kind() == SyntaxKind::IMPORT_DECL)
            .flat_map(|node| {
                node.children_with_tokens()
                    .filter_map(|element| element.into_token())
                    .filter(|token| token.kind() == SyntaxKind::STRING)
                    .collect::<Vec<_>>()
            })
            .map(|token| SmolStr::new(unquote(token.text())))
            .collect()
    }

    /// The non-trivia token covering `offset`, preferring the right-hand
    /// token at a boundary.
    pub fn token_at_offset(&self, offset: TextSize) -> Option<SyntaxToken> {
        if offset > self.line_index.len() {
            return None;
        }
        let root = self.syntax();
        let at = root.token_at_offset(offset);
        let mut candidates = at.clone().right_biased().into_iter().chain(at.left_biased());
        candidates.find(|token| !token.kind().is_trivia())
    }
}

fn unquote(text: &str) -> &str {
    let trimmed = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('`').and_then(|t| t.strip_suffix('`')));
    trimmed.unwrap_or(text)
}
