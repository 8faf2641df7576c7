//! The compiler seam: how packages are loaded.
//!
//! Semantic analysis itself lives behind [`PackageLoader`]. Given a
//! [`LoadConfig`] (working directory, test inclusion, unsaved-edit overlay
//! and an optional content hook) and a set of [`Pattern`]s, a loader returns
//! compiled [`Package`]s with their syntax trees and dependencies.
//!
//! [`DirLoader`] is the reference implementation used by the tests and by
//! embedders without an external compiler.

mod dir_loader;
mod package;

pub use dir_loader::DirLoader;
pub use package::Package;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{LoadError, LoadResult};
use crate::syntax::SyntaxTree;

/// Content-override hook, invoked once per file the loader parses.
///
/// Receives the file path and, when the file has an unsaved edit, its bytes.
/// With `None` the hook is responsible for reading the file from disk.
pub type ParseHook = Arc<dyn Fn(&Path, Option<&[u8]>) -> LoadResult<SyntaxTree> + Send + Sync>;

/// In-memory file contents keyed by on-disk path.
pub type Overlay = FxHashMap<PathBuf, Arc<[u8]>>;

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// The package (or packages) containing this file.
    File(PathBuf),
    /// Every package in this directory and all of its subdirectories.
    Recursive(PathBuf),
}

/// Configuration for one load.
#[derive(Clone)]
pub struct LoadConfig {
    /// Working directory the load runs in.
    pub dir: PathBuf,
    /// Also load test-only files.
    pub tests: bool,
    /// Unsaved edits that take precedence over disk content.
    pub overlay: Overlay,
    /// Hook used to parse each file; `None` parses overlay or disk content
    /// directly.
    pub parse_hook: Option<ParseHook>,
}

impl LoadConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tests: true,
            overlay: Overlay::default(),
            parse_hook: None,
        }
    }

    pub fn with_tests(mut self, tests: bool) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_parse_hook(mut self, hook: ParseHook) -> Self {
        self.parse_hook = Some(hook);
        self
    }

    /// Parses one file, honoring the overlay and the hook.
    ///
    /// Overlay bytes are passed to the hook explicitly; without an overlay
    /// entry the hook receives `None` and reads the disk itself.
    pub fn parse_file(&self, path: &Path) -> LoadResult<SyntaxTree> {
        let src = self.overlay.get(path).map(|bytes| &bytes[..]);
        match &self.parse_hook {
            Some(hook) => hook(path, src),
            None => match src {
                Some(bytes) => SyntaxTree::from_bytes(path, bytes),
                None => {
                    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
                    SyntaxTree::from_bytes(path, &bytes)
                }
            },
        }
    }
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("dir", &self.dir)
            .field("tests", &self.tests)
            .field("overlay", &self.overlay.keys().collect::<Vec<_>>())
            .field("parse_hook", &self.parse_hook.is_some())
            .finish()
    }
}

/// Loads compiled packages. Errors are surfaced to callers verbatim.
pub trait PackageLoader: Send + Sync {
    fn load(&self, config: &LoadConfig, patterns: &[Pattern]) -> LoadResult<Vec<Arc<Package>>>;
}
