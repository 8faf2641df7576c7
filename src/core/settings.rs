//! Load settings shared by the file view, the package cache and the loader.

/// Settings that control how packages are loaded.
///
/// Embedders build this from their initialization options with
/// [`Settings::apply`]; fields that are not overridden keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Load test-only files as well, producing test variants of packages.
    ///
    /// Defaults to true.
    pub include_tests: bool,

    /// Maximum number of worker threads used to parse the files of a load.
    ///
    /// Defaults to half of the CPU cores, but at least one.
    pub max_parallelism: usize,

    /// File extensions (without the dot) treated as source files.
    ///
    /// Defaults to `["src"]`.
    pub source_extensions: Vec<String>,
}

/// Optional overrides for [`Settings`], one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub include_tests: Option<bool>,
    pub max_parallelism: Option<usize>,
    pub source_extensions: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            include_tests: true,
            max_parallelism: (cores / 2).max(1),
            source_extensions: vec!["src".to_string()],
        }
    }
}

impl Settings {
    /// Sets each field that has an override, leaving the rest untouched.
    pub fn apply(mut self, overrides: Option<&SettingsOverrides>) -> Self {
        let Some(o) = overrides else {
            return self;
        };
        if let Some(include_tests) = o.include_tests {
            self.include_tests = include_tests;
        }
        if let Some(max_parallelism) = o.max_parallelism {
            self.max_parallelism = max_parallelism.max(1);
        }
        if let Some(extensions) = &o.source_extensions {
            self.source_extensions = extensions.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.include_tests);
        assert!(settings.max_parallelism >= 1);
        assert_eq!(settings.source_extensions, vec!["src".to_string()]);
    }

    #[test]
    fn test_apply_none_keeps_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.clone().apply(None), settings);
    }

    #[test]
    fn test_apply_overrides_only_set_fields() {
        let overrides = SettingsOverrides {
            include_tests: Some(false),
            max_parallelism: Some(0),
            ..Default::default()
        };
        let settings = Settings::default().apply(Some(&overrides));
        assert!(!settings.include_tests);
        assert_eq!(settings.max_parallelism, 1);
        assert_eq!(settings.source_extensions, vec!["src".to_string()]);
    }
}
