//! File identity used to key the file registry.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::core::{LoadError, LoadResult};

/// A `file:` URI naming one source file.
///
/// Two paths that denote the same file produce equal URIs regardless of the
/// platform's separator conventions, which makes `Uri` a safe map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uri(Url);

impl Uri {
    /// Builds a URI from an absolute filesystem path.
    pub fn from_file_path(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| LoadError::NotAbsolute {
                path: path.to_path_buf(),
            })
    }

    /// Parses a URI string, accepting only the `file` scheme.
    pub fn parse(uri: &str) -> LoadResult<Self> {
        let url = Url::parse(uri).map_err(|_| LoadError::InvalidUri {
            uri: uri.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(LoadError::InvalidUri {
                uri: uri.to_string(),
            });
        }
        Ok(Self(url))
    }

    /// The filesystem path this URI names.
    pub fn to_file_path(&self) -> LoadResult<PathBuf> {
        self.0.to_file_path().map_err(|()| LoadError::InvalidUri {
            uri: self.0.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
