//! Directory-based reference loader.
//!
//! Every directory holding at least one source file is a package. Its import
//! path is the module name followed by the directory's path relative to the
//! working directory, so `/repo/a/b` loads as `repo/a/b` when the working
//! directory is `/repo`. Imports inside the module resolve to directories
//! and are loaded recursively; anything else is left unresolved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};
use walkdir::WalkDir;

use super::{LoadConfig, Package, PackageLoader, Pattern};
use crate::core::{LoadError, LoadResult, Settings};
use crate::syntax::SyntaxTree;

/// File stem suffix marking test-only files.
const TEST_SUFFIX: &str = "_test";

/// Loads packages from a directory tree, one package per directory.
pub struct DirLoader {
    module_name: Option<SmolStr>,
    extensions: Vec<String>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl DirLoader {
    /// Creates a loader for `.src` files that parses on the global rayon pool.
    pub fn new() -> Self {
        Self {
            module_name: None,
            extensions: vec!["src".to_string()],
            pool: None,
        }
    }

    /// Creates a loader using the configured extensions, parsing on a
    /// dedicated pool of `max_parallelism` threads.
    pub fn from_settings(settings: &Settings) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.max_parallelism)
            .thread_name(|i| format!("pkgcache-parse-{i}"))
            .build();
        let pool = match pool {
            Ok(pool) => Some(Arc::new(pool)),
            Err(err) => {
                tracing::warn!(%err, "falling back to the global parse pool");
                None
            }
        };
        Self {
            module_name: None,
            extensions: settings.source_extensions.clone(),
            pool,
        }
    }

    /// Overrides the module name, which otherwise is the final component of
    /// the working directory.
    pub fn with_module_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x == e))
    }

    /// Source files of one directory, split into regular and test-only
    /// files, each sorted by path. A missing directory has no files.
    fn source_files(&self, dir: &Path) -> LoadResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        if !dir.is_dir() {
            return Ok((Vec::new(), Vec::new()));
        }
        let entries = std::fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))?;

        let mut sources = Vec::new();
        let mut tests = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| LoadError::io(dir, e))?.path();
            if !path.is_file() || !self.is_source(&path) {
                continue;
            }
            let is_test = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.ends_with(TEST_SUFFIX));
            if is_test {
                tests.push(path);
            } else {
                sources.push(path);
            }
        }
        sources.sort();
        tests.sort();
        Ok((sources, tests))
    }

    /// All directories under `root` (inclusive) that may hold packages.
    ///
    /// Hidden directories, directories starting with `_` and `testdata` are
    /// skipped along with everything beneath them.
    fn package_dirs(&self, root: &Path) -> LoadResult<Vec<PathBuf>> {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry.path()));

        let mut dirs = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                LoadError::io(path, source)
            })?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }
}

impl Default for DirLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageLoader for DirLoader {
    fn load(&self, config: &LoadConfig, patterns: &[Pattern]) -> LoadResult<Vec<Arc<Package>>> {
        let mut session = LoadSession::new(self, config);
        let mut roots: Vec<Arc<Package>> = Vec::new();

        for pattern in patterns {
            match pattern {
                Pattern::File(path) => {
                    let Some(dir) = path.parent() else {
                        continue;
                    };
                    if let Some(unit) = session.load_dir(dir)? {
                        roots.extend(unit.variants().filter(|p| p.contains_file(path)));
                    }
                }
                Pattern::Recursive(root) => {
                    for dir in self.package_dirs(root)? {
                        if let Some(unit) = session.load_dir(&dir)? {
                            roots.extend(unit.variants());
                        }
                    }
                }
            }
        }

        let mut seen = FxHashSet::default();
        roots.retain(|p| seen.insert(p.id().to_string()));
        tracing::debug!(
            dir = %config.dir.display(),
            packages = roots.len(),
            "directory load finished"
        );
        Ok(roots)
    }
}

fn is_ignored_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n.starts_with('_') || n == "testdata")
}

/// The package of one directory plus its test variant, if any.
#[derive(Clone)]
struct DirUnit {
    base: Arc<Package>,
    test: Option<Arc<Package>>,
}

impl DirUnit {
    fn variants(&self) -> impl Iterator<Item = Arc<Package>> + '_ {
        std::iter::once(self.base.clone()).chain(self.test.clone())
    }
}

/// A directory whose files are parsed and whose base package is built, but
/// whose test files' imports are not yet resolved.
struct Staged {
    pkg_path: SmolStr,
    source_count: usize,
    files: Vec<PathBuf>,
    trees: Vec<Arc<SyntaxTree>>,
    base: Option<Arc<Package>>,
}

/// State of a single `load` call. Every directory is built at most once, so
/// shared dependencies are shared `Arc`s.
struct LoadSession<'a> {
    loader: &'a DirLoader,
    config: &'a LoadConfig,
    module: SmolStr,
    loaded: FxHashMap<PathBuf, Option<DirUnit>>,
    in_progress: FxHashSet<PathBuf>,
}

impl<'a> LoadSession<'a> {
    fn new(loader: &'a DirLoader, config: &'a LoadConfig) -> Self {
        let module = loader.module_name.clone().unwrap_or_else(|| {
            config
                .dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(SmolStr::new)
                .unwrap_or_else(|| SmolStr::new_static("main"))
        });
        Self {
            loader,
            config,
            module,
            loaded: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    fn import_path(&self, dir: &Path) -> SmolStr {
        match dir.strip_prefix(&self.config.dir) {
            Ok(rel) if rel.as_os_str().is_empty() => self.module.clone(),
            Ok(rel) => {
                let parts: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                format_smolstr!("{}/{}", self.module, parts.join("/"))
            }
            Err(_) => SmolStr::new(dir.to_string_lossy()),
        }
    }

    /// Directory an import path names, if it lies inside the module.
    fn resolve(&self, import_path: &str) -> Option<PathBuf> {
        if import_path == self.module {
            return Some(self.config.dir.clone());
        }
        let rest = import_path.strip_prefix(self.module.as_str())?.strip_prefix('/')?;
        let mut dir = self.config.dir.clone();
        dir.extend(rest.split('/').filter(|s| !s.is_empty()));
        Some(dir)
    }

    /// Loads the package of `dir` and its test variant.
    ///
    /// The regular files' imports are resolved while `dir` is in progress, so
    /// a cycle through them is an error. The base package is then published
    /// before the test files' imports are resolved: a test may import a
    /// package that itself depends on the package under test.
    fn load_dir(&mut self, dir: &Path) -> LoadResult<Option<DirUnit>> {
        if let Some(unit) = self.loaded.get(dir) {
            return Ok(unit.clone());
        }
        if !self.in_progress.insert(dir.to_path_buf()) {
            return Err(LoadError::ImportCycle {
                import_path: self.import_path(dir).to_string(),
            });
        }

        let staged = self.build_base(dir);
        self.in_progress.remove(dir);
        let Some(staged) = staged? else {
            self.loaded.insert(dir.to_path_buf(), None);
            return Ok(None);
        };

        let base_only = staged.base.clone().map(|base| DirUnit { base, test: None });
        self.loaded.insert(dir.to_path_buf(), base_only);

        let unit = self.build_tests(dir, staged)?;
        self.loaded.insert(dir.to_path_buf(), Some(unit.clone()));
        Ok(Some(unit))
    }

    /// Parses every file of `dir` and builds the package of its regular
    /// files. `None` when the directory has no files to load.
    fn build_base(&mut self, dir: &Path) -> LoadResult<Option<Staged>> {
        let (sources, mut tests) = self.loader.source_files(dir)?;
        if !self.config.tests {
            tests.clear();
        }
        if sources.is_empty() && tests.is_empty() {
            return Ok(None);
        }

        let source_count = sources.len();
        let files: Vec<PathBuf> = sources.into_iter().chain(tests).collect();
        let trees = self.parse_all(&files)?;
        let pkg_path = self.import_path(dir);

        let base = if source_count == 0 {
            None
        } else {
            let imports = self.resolve_imports(dir, &trees[..source_count], false)?;
            let base = Package::new(pkg_path.clone())
                .with_compiled_files(files[..source_count].to_vec())
                .with_syntax(trees[..source_count].to_vec())
                .with_imports(imports);
            Some(Arc::new(base))
        };

        Ok(Some(Staged {
            pkg_path,
            source_count,
            files,
            trees,
            base,
        }))
    }

    /// Resolves the test files' imports and builds the test variant.
    ///
    /// A directory holding only test files loads as a single package made of
    /// them.
    fn build_tests(&mut self, dir: &Path, staged: Staged) -> LoadResult<DirUnit> {
        let Staged {
            pkg_path,
            source_count,
            files,
            trees,
            base,
        } = staged;
        let test_imports = self.resolve_imports(dir, &trees[source_count..], true)?;
        tracing::debug!(
            %pkg_path,
            files = source_count,
            test_files = files.len() - source_count,
            "built package"
        );

        let Some(base) = base else {
            let only_tests = Package::new(pkg_path)
                .with_compiled_files(files)
                .with_syntax(trees)
                .with_imports(test_imports);
            return Ok(DirUnit {
                base: Arc::new(only_tests),
                test: None,
            });
        };
        if source_count == files.len() {
            return Ok(DirUnit { base, test: None });
        }

        let mut imports = base.imports().to_vec();
        for dep in test_imports {
            if !imports.iter().any(|p| Arc::ptr_eq(p, &dep)) {
                imports.push(dep);
            }
        }
        let id = format_smolstr!("{pkg_path} [{pkg_path}.test]");
        let test = Package::new(pkg_path)
            .with_id(id)
            .with_compiled_files(files)
            .with_syntax(trees)
            .with_imports(imports);
        Ok(DirUnit {
            base,
            test: Some(Arc::new(test)),
        })
    }

    /// Loads the packages imported by `trees`, deduplicated, in source order.
    ///
    /// External test files may import the package they test; those imports
    /// are dropped.
    fn resolve_imports(
        &mut self,
        dir: &Path,
        trees: &[Arc<SyntaxTree>],
        is_test: bool,
    ) -> LoadResult<Vec<Arc<Package>>> {
        let mut imports: Vec<Arc<Package>> = Vec::new();
        for tree in trees {
            for import_path in tree.imports() {
                let Some(dep_dir) = self.resolve(&import_path) else {
                    tracing::trace!(%import_path, "import outside module left unresolved");
                    continue;
                };
                if is_test && dep_dir == dir {
                    continue;
                }
                let Some(dep) = self.load_dir(&dep_dir)? else {
                    tracing::debug!(%import_path, "import has no package");
                    continue;
                };
                if !imports.iter().any(|p| Arc::ptr_eq(p, &dep.base)) {
                    imports.push(dep.base);
                }
            }
        }
        Ok(imports)
    }

    /// Parses `files` in parallel through the config's hook, keeping order.
    fn parse_all(&self, files: &[PathBuf]) -> LoadResult<Vec<Arc<SyntaxTree>>> {
        let config = self.config;
        let parse = || {
            files
                .par_iter()
                .map(|path| config.parse_file(path).map(Arc::new))
                .collect::<LoadResult<Vec<_>>>()
        };
        match &self.loader.pool {
            Some(pool) => pool.install(parse),
            None => parse(),
        }
    }
}
