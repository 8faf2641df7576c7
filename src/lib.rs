//! # pkgcache-base
//!
//! Package-loading cache and file view for source analysis servers.
//!
//! Request handlers use two independent caches:
//! - [`view::View`] - session-scoped file registry. Serves [`view::File`]s by
//!   URI and parses them on demand, with unsaved edits taking precedence over
//!   disk content.
//! - [`cache::PackageCache`] - root-scoped package cache keyed by normalized
//!   directory. A miss rebuilds the whole reachable package graph.
//!
//! The two share no state or locks; callers compose them.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! view, cache → File registry, package cache
//!   ↓
//! loader      → PackageLoader seam, Package, reference DirLoader
//!   ↓
//! syntax      → Logos lexer, parser, SyntaxTree
//!   ↓
//! base, core  → Uri, LineIndex, LoadError, Settings
//! ```

/// Foundation types: Uri, LineIndex, Position
pub mod base;

/// Errors and load settings
pub mod core;

/// Syntax: lexer, lossless tree, import declarations
pub mod syntax;

/// The compiler seam and the directory-based reference loader
pub mod loader;

/// File registry with overlay-aware parsing
pub mod view;

/// Root-scoped package cache
pub mod cache;

// Re-export commonly needed items
pub use base::{LineIndex, Position, Span, Uri};
pub use cache::{CacheKey, PackageCache, PathStyle};
pub use crate::core::{LoadError, LoadResult, Settings, SettingsOverrides};
pub use loader::{DirLoader, LoadConfig, Package, PackageLoader, ParseHook, Pattern};
pub use syntax::SyntaxTree;
pub use view::{File, LoadDirFn, View};
