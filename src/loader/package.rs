//! Compiled units returned by a [`PackageLoader`](super::PackageLoader).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::syntax::SyntaxTree;

/// One compiled unit: a set of source files sharing an import path.
///
/// Packages are immutable once built and shared as `Arc<Package>`; a
/// dependency graph is built bottom-up, so every import is complete before
/// the packages that depend on it.
pub struct Package {
    id: SmolStr,
    pkg_path: SmolStr,
    compiled_files: Vec<PathBuf>,
    syntax: Vec<Arc<SyntaxTree>>,
    imports: Vec<Arc<Package>>,
}

impl Package {
    /// Creates an empty package whose id equals its import path.
    pub fn new(pkg_path: impl Into<SmolStr>) -> Self {
        let pkg_path = pkg_path.into();
        Self {
            id: pkg_path.clone(),
            pkg_path,
            compiled_files: Vec::new(),
            syntax: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Sets a distinct id, e.g. for the test variant of a package.
    pub fn with_id(mut self, id: impl Into<SmolStr>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_compiled_files(mut self, files: Vec<PathBuf>) -> Self {
        self.compiled_files = files;
        self
    }

    pub fn with_syntax(mut self, syntax: Vec<Arc<SyntaxTree>>) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_imports(mut self, imports: Vec<Arc<Package>>) -> Self {
        self.imports = imports;
        self
    }

    /// Unique id within one load. Test variants share the import path but
    /// not the id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Symbolic import path.
    pub fn pkg_path(&self) -> &str {
        &self.pkg_path
    }

    pub fn compiled_files(&self) -> &[PathBuf] {
        &self.compiled_files
    }

    /// Syntax trees, one per compiled file.
    pub fn syntax(&self) -> &[Arc<SyntaxTree>] {
        &self.syntax
    }

    /// Direct dependencies.
    pub fn imports(&self) -> &[Arc<Package>] {
        &self.imports
    }

    /// Directory of the first compiled file, which names the package on disk.
    pub fn dir(&self) -> Option<&Path> {
        self.compiled_files.first().and_then(|f| f.parent())
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.compiled_files.iter().any(|f| f == path)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Imports are listed by id; the full graph can be large.
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("pkg_path", &self.pkg_path)
            .field("compiled_files", &self.compiled_files)
            .field(
                "imports",
                &self.imports.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
