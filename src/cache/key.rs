//! Cache key normalization.
//!
//! Filesystems with drive letters and two separator styles may report the
//! same directory as `C:\repo\a`, `c:\repo\a` or `c:/repo/a`. Keys fold all of
//! those into one form so the cache does not fragment.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

/// Path conventions used to normalize directories into keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStyle {
    /// Single separator, case-sensitive: keys are the directory unchanged.
    Posix,
    /// Drive letters and `\`/`/` separators: drive lower-cased, `/` only.
    Windows,
}

impl PathStyle {
    /// The style of the platform this process runs on.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Directory to hand to the loader for `dir`.
    ///
    /// URI-derived Windows paths look like `/C:/repo`; the leading slash is
    /// dropped.
    pub fn load_dir(self, dir: &str) -> String {
        match self {
            Self::Posix => dir.to_string(),
            Self::Windows => dir.strip_prefix('/').unwrap_or(dir).to_string(),
        }
    }

    /// Parent directory of a file path, splitting on this style's separators.
    pub fn parent_dir(self, file: &str) -> String {
        match self {
            Self::Posix => Path::new(file)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Windows => match file.rfind(['/', '\\']) {
                Some(0) => file[..1].to_string(),
                // A drive root keeps its separator: `C:\a.src` lives in `C:\`.
                Some(idx) if file[..idx].ends_with(':') => file[..=idx].to_string(),
                Some(idx) => file[..idx].to_string(),
                None => String::new(),
            },
        }
    }
}

/// Normalized directory used to index the package cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a directory.
    pub fn from_dir(dir: &str, style: PathStyle) -> Self {
        match style {
            PathStyle::Posix => Self(dir.to_string()),
            PathStyle::Windows => {
                let mut parts: Vec<String> = dir.split(':').map(str::to_string).collect();
                if parts.len() >= 2 {
                    parts[0] = parts[0].to_lowercase();
                }
                Self(parts.join(":").replace('\\', "/"))
            }
        }
    }

    /// Key for the directory holding `file`.
    pub fn from_file(file: &str, style: PathStyle) -> Self {
        Self::from_dir(&style.parent_dir(file), style)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
