//! Foundation types for the package cache.
//!
//! This module provides the types every other layer builds on:
//! - [`Uri`] - File identities used as registry keys
//! - [`LineIndex`] - Byte offset to line/column conversion
//! - [`Position`], [`Span`] - Line/column locations
//!
//! This module depends only on [`crate::core`] for its error type.

mod line_index;
mod position;
mod uri;

pub use line_index::LineIndex;
pub use position::{Position, Span};
pub use uri::Uri;

// Re-export text-size types for convenience
pub use text_size::{self, TextRange, TextSize};
