//! Error types for loading, parsing and caching.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors surfaced by the file view and the package cache.
///
/// Neither component retries on its own: every error goes back to the
/// immediate caller, and both caches can be retried from a clean state.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The URI is not a `file:` URI, so no directory can be derived from it.
    #[error("invalid file URI: {uri}")]
    InvalidUri { uri: String },

    /// A path that must become a URI is not absolute.
    #[error("cannot build a file URI from non-absolute path {}", path.display())]
    NotAbsolute { path: PathBuf },

    /// A source file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Source bytes are not valid UTF-8.
    #[error("{} is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },

    /// A package imports itself, directly or transitively.
    #[error("import cycle not allowed: {import_path}")]
    ImportCycle { import_path: String },

    /// Error reported verbatim by an external compiler.
    #[error("{0}")]
    Compiler(String),

    /// The load succeeded but produced no packages.
    #[error("no packages found for {}", path.display())]
    NoPackages { path: PathBuf },

    /// A cache rebuild was requested before a root directory was set.
    #[error("package cache has no root directory")]
    NoRoot,
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the synthesized "nothing loaded" error, as opposed to a
    /// failure reported while loading.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoPackages { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_packages_display() {
        let err = LoadError::NoPackages {
            path: PathBuf::from("/repo/a/main.src"),
        };
        assert_eq!(err.to_string(), "no packages found for /repo/a/main.src");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_display_keeps_source() {
        let err = LoadError::io(
            "/repo/missing.src",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/repo/missing.src"));
        assert!(msg.contains("file not found"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_compiler_error_is_verbatim() {
        let err = LoadError::Compiler("go: cannot find main module".to_string());
        assert_eq!(err.to_string(), "go: cannot find main module");
    }
}
