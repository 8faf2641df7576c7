//! Syntax kinds for the Rowan-based CST
//!
//! Tokens are leaf kinds produced by the lexer; nodes are the composite
//! kinds built by the parser.

/// All syntax kinds (tokens and nodes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // =========================================================================
    // TRIVIA (whitespace and comments - preserved but not semantically meaningful)
    // =========================================================================
    WHITESPACE = 0,
    LINE_COMMENT,
    BLOCK_COMMENT,

    // =========================================================================
    // TOKENS
    // =========================================================================
    IDENT,    // identifier
    NUMBER,   // 42, 0x1f, 3.14
    STRING,   // "path" or `path`
    IMPORT_KW,
    L_PAREN,  // (
    R_PAREN,  // )
    PUNCT,    // any other punctuation character
    ERROR,

    // =========================================================================
    // NODES
    // =========================================================================
    SOURCE_FILE,
    IMPORT_DECL,

    #[doc(hidden)]
    __LAST,
}

impl SyntaxKind {
    /// Check if this is a trivia token (whitespace or comment)
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::LINE_COMMENT | Self::BLOCK_COMMENT)
    }

    /// Check if this is a node kind rather than a token kind
    pub fn is_node(self) -> bool {
        matches!(self, Self::SOURCE_FILE | Self::IMPORT_DECL)
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<rowan::SyntaxKind> for SyntaxKind {
    fn from(raw: rowan::SyntaxKind) -> Self {
        assert!(raw.0 < SyntaxKind::__LAST as u16);
        // Safety: we control all syntax kinds and check bounds above
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
}

/// Language definition for Rowan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceLanguage {}

impl rowan::Language for SourceLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        raw.into()
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// Type aliases for convenience
pub type SyntaxNode = rowan::SyntaxNode<SourceLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<SourceLanguage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        for kind in [SyntaxKind::WHITESPACE, SyntaxKind::STRING, SyntaxKind::IMPORT_DECL] {
            let raw: rowan::SyntaxKind = kind.into();
            assert_eq!(SyntaxKind::from(raw), kind);
        }
    }

    #[test]
    fn test_classification() {
        assert!(SyntaxKind::LINE_COMMENT.is_trivia());
        assert!(!SyntaxKind::IDENT.is_trivia());
        assert!(SyntaxKind::SOURCE_FILE.is_node());
        assert!(!SyntaxKind::PUNCT.is_node());
    }
}
