//! Recursive descent parser
//!
//! Builds a rowan GreenNode tree from tokens. Only import declarations get
//! their own nodes; every other token is kept flat under the root so the
//! tree stays lossless.

use super::lexer::{Lexer, Token};
use super::syntax_kind::SyntaxKind;
use rowan::{GreenNode, GreenNodeBuilder};
use text_size::{TextRange, TextSize};

/// Parse result containing the green tree and any errors
#[derive(Debug, Clone)]
pub struct Parse {
    pub green: GreenNode,
    pub errors: Vec<SyntaxError>,
}

/// A syntax error with location and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Parse source text into a CST
pub fn parse(input: &str) -> Parse {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens, TextSize::of(input));
    parser.parse_source_file();
    parser.finish()
}

/// The parser state
struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    end: TextSize,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>], end: TextSize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Parse {
        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> SyntaxKind {
        self.current().map(|t| t.kind).unwrap_or(SyntaxKind::ERROR)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        !self.at_eof() && self.current_kind() == kind
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_range(&self) -> TextRange {
        match self.current() {
            Some(token) => TextRange::at(token.offset, TextSize::of(token.text)),
            None => TextRange::empty(self.end),
        }
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn bump(&mut self) {
        let tokens = self.tokens;
        if let Some(token) = tokens.get(self.pos) {
            if token.kind == SyntaxKind::ERROR {
                let range = TextRange::at(token.offset, TextSize::of(token.text));
                self.errors.push(SyntaxError::new(
                    format!("unexpected input {:?}", token.text),
                    range,
                ));
            }
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) {
        while !self.at_eof() && self.current_kind().is_trivia() {
            self.bump();
        }
    }

    fn error(&mut self, message: &str) {
        let range = self.current_range();
        self.errors.push(SyntaxError::new(message, range));
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    fn parse_source_file(&mut self) {
        self.builder.start_node(SyntaxKind::SOURCE_FILE.into());
        while !self.at_eof() {
            if self.at(SyntaxKind::IMPORT_KW) {
                self.parse_import();
            } else {
                self.bump();
            }
        }
        self.builder.finish_node();
    }

    /// `import "path"`, `import name "path"` or `import ( ... )`
    fn parse_import(&mut self) {
        self.builder.start_node(SyntaxKind::IMPORT_DECL.into());
        self.bump();
        self.skip_trivia();

        if self.at(SyntaxKind::L_PAREN) {
            self.bump();
            loop {
                self.skip_trivia();
                if self.at(SyntaxKind::R_PAREN) {
                    self.bump();
                    break;
                }
                if !self.parse_import_spec() {
                    self.error("expected import path or ')'");
                    break;
                }
            }
        } else if !self.parse_import_spec() {
            self.error("expected import path");
        }

        self.builder.finish_node();
    }

    fn parse_import_spec(&mut self) -> bool {
        if self.at(SyntaxKind::IDENT) || self.at(SyntaxKind::PUNCT) {
            self.bump();
            self.skip_trivia();
        }
        if self.at(SyntaxKind::STRING) {
            self.bump();
            true
        } else {
            false
        }
    }
}
