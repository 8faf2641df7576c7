//! Process-wide package cache for one root directory.
//!
//! The cache maps a normalized package directory ([`CacheKey`]) to the
//! package loaded from it. A miss rebuilds the whole cache from the root:
//! the root's recursive package set is loaded, and every package plus
//! everything it imports, transitively, is inserted. Insertion is
//! first-write-wins, so a key already present keeps its package.
//!
//! ## Usage
//!
//! ```ignore
//! let cache = PackageCache::new(Arc::new(DirLoader::new()));
//! cache.init("/repo")?;
//! let pkg = cache.load("/repo/a")?;          // hit, no rebuild
//! let pkg = cache.lookup("repo/a");         // scan by import path
//! ```

mod key;

pub use key::{CacheKey, PathStyle};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxBuildHasher;

use crate::core::{LoadError, LoadResult, Settings};
use crate::loader::{LoadConfig, Package, PackageLoader, Pattern};

type PackagePool = IndexMap<CacheKey, Arc<Package>, FxBuildHasher>;

/// Cache of loaded packages for one root directory.
///
/// Construct one per root and pass it to whoever needs it; instances are
/// independent of each other.
pub struct PackageCache {
    loader: Arc<dyn PackageLoader>,
    root: RwLock<Option<PathBuf>>,
    pool: RwLock<PackagePool>,
    /// Serializes rebuilds.
    rebuild: Mutex<()>,
    /// Bumped after every successful rebuild.
    generation: AtomicU64,
    include_tests: bool,
    style: PathStyle,
}

impl PackageCache {
    pub fn new(loader: Arc<dyn PackageLoader>) -> Self {
        Self::with_settings(loader, &Settings::default())
    }

    pub fn with_settings(loader: Arc<dyn PackageLoader>, settings: &Settings) -> Self {
        Self {
            loader,
            root: RwLock::new(None),
            pool: RwLock::new(PackagePool::default()),
            rebuild: Mutex::new(()),
            generation: AtomicU64::new(0),
            include_tests: settings.include_tests,
            style: PathStyle::host(),
        }
    }

    /// Overrides the path conventions used for keys.
    pub fn with_path_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the root directory and builds the cache from it.
    pub fn init(&self, root: impl Into<PathBuf>) -> LoadResult<()> {
        *self.root.write() = Some(root.into());
        self.invalidate()
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.root.read().clone()
    }

    /// Returns the package for `dir`, rebuilding the cache once on a miss.
    ///
    /// `Ok(None)` means the directory is not reachable from the root.
    pub fn load(&self, dir: impl AsRef<Path>) -> LoadResult<Option<Arc<Package>>> {
        let load_dir = self.style.load_dir(&dir.as_ref().to_string_lossy());
        let key = CacheKey::from_dir(&load_dir, self.style);
        tracing::debug!(%load_dir, %key, "package cache load");

        let seen = self.generation.load(Ordering::Acquire);
        if let Some(pkg) = self.pool.read().get(&key) {
            return Ok(Some(pkg.clone()));
        }

        self.rebuild_since(seen)?;
        Ok(self.pool.read().get(&key).cloned())
    }

    /// Finds a cached package by import path. Scans the whole cache.
    pub fn lookup(&self, pkg_path: &str) -> Option<Arc<Package>> {
        self.pool
            .read()
            .values()
            .find(|pkg| pkg.pkg_path() == pkg_path)
            .cloned()
    }

    /// Visits every cached package, stopping at the first error.
    ///
    /// The cache is read-locked for the whole walk; `visit` must not call
    /// back into a rebuilding operation.
    pub fn iterate<E>(&self, mut visit: impl FnMut(&Arc<Package>) -> Result<(), E>) -> Result<(), E> {
        let pool = self.pool.read();
        for pkg in pool.values() {
            visit(pkg)?;
        }
        Ok(())
    }

    /// Inserts packages and their dependencies. Keys already present keep
    /// their package.
    pub fn push(&self, packages: &[Arc<Package>]) {
        let mut pool = self.pool.write();
        for pkg in packages {
            cache_package(&mut pool, pkg, self.style);
        }
    }

    /// Clears the cache and rebuilds it from the root.
    ///
    /// On failure the cache stays empty, so the next miss retries.
    pub fn invalidate(&self) -> LoadResult<()> {
        let _rebuild = self.rebuild.lock();
        self.rebuild_locked()
    }

    pub fn len(&self) -> usize {
        self.pool.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.read().is_empty()
    }

    /// Rebuilds unless another caller finished a rebuild after `seen` was
    /// read; concurrent misses then share that rebuild.
    fn rebuild_since(&self, seen: u64) -> LoadResult<()> {
        let _rebuild = self.rebuild.lock();
        if self.generation.load(Ordering::Acquire) != seen {
            tracing::debug!("reusing concurrent package cache rebuild");
            return Ok(());
        }
        self.rebuild_locked()
    }

    /// Must be called with `self.rebuild` held.
    fn rebuild_locked(&self) -> LoadResult<()> {
        let root = self.root().ok_or(LoadError::NoRoot)?;
        let load_dir = PathBuf::from(self.style.load_dir(&root.to_string_lossy()));

        let mut pool = self.pool.write();
        pool.clear();
        tracing::debug!(root = %root.display(), load_dir = %load_dir.display(), "rebuilding package cache");

        let config = LoadConfig::new(&load_dir).with_tests(self.include_tests);
        let packages = self
            .loader
            .load(&config, &[Pattern::Recursive(load_dir.clone())])?;
        for pkg in &packages {
            cache_package(&mut pool, pkg, self.style);
        }

        self.generation.fetch_add(1, Ordering::Release);
        tracing::info!(
            root = %root.display(),
            roots = packages.len(),
            cached = pool.len(),
            "package cache rebuilt"
        );
        Ok(())
    }
}

/// Inserts `pkg` and, recursively, everything it imports.
fn cache_package(pool: &mut PackagePool, pkg: &Arc<Package>, style: PathStyle) {
    let Some(first) = pkg.compiled_files().first() else {
        return;
    };
    let key = CacheKey::from_file(&first.to_string_lossy(), style);
    if pool.contains_key(&key) {
        return;
    }

    tracing::debug!(%key, pkg = pkg.id(), "cached package");
    pool.insert(key, pkg.clone());
    for import in pkg.imports() {
        cache_package(pool, import, style);
    }
}
