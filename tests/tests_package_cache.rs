//! Tests for the package cache over a real directory tree.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use pkgcache::{
    DirLoader, LoadConfig, LoadError, LoadResult, Package, PackageCache, PackageLoader, PathStyle,
    Pattern, Settings, SettingsOverrides,
};
use tempfile::TempDir;

/// Wraps a loader and counts rebuilds.
struct Counting<L> {
    inner: L,
    loads: AtomicUsize,
}

impl<L: PackageLoader> Counting<L> {
    fn new(inner: L) -> Arc<Self> {
        Arc::new(Self {
            inner,
            loads: AtomicUsize::new(0),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl<L: PackageLoader> PackageLoader for Counting<L> {
    fn load(&self, config: &LoadConfig, patterns: &[Pattern]) -> LoadResult<Vec<Arc<Package>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(config, patterns)
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `repo/A` has no imports, `repo/B` imports it.
fn repo() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("repo");
    write(&root, "A/a.src", "alpha\n");
    write(&root, "B/b.src", "import \"repo/A\"\n\nbeta\n");
    (temp, root)
}

fn cache(loader: Arc<dyn PackageLoader>) -> PackageCache {
    PackageCache::new(loader).with_path_style(PathStyle::Posix)
}

#[test]
fn test_init_caches_every_package() {
    let (_temp, root) = repo();
    let loader = Counting::new(DirLoader::new());
    let cache = cache(loader.clone());

    cache.init(&root).unwrap();

    assert_eq!(cache.root(), Some(root.clone()));
    assert_eq!(cache.len(), 2);
    assert_eq!(loader.loads(), 1);

    let a = cache.lookup("repo/A").unwrap();
    assert_eq!(a.compiled_files(), &[root.join("A/a.src")]);
    let b = cache.lookup("repo/B").unwrap();
    assert!(Arc::ptr_eq(&b.imports()[0], &a));
}

#[test]
fn test_iterate_visits_each_package_once() {
    let (_temp, root) = repo();
    let cache = cache(Arc::new(DirLoader::new()));
    cache.init(&root).unwrap();

    let mut visited = Vec::new();
    cache
        .iterate(|pkg| {
            visited.push(pkg.pkg_path().to_string());
            Ok::<_, ()>(())
        })
        .unwrap();
    visited.sort();
    assert_eq!(visited, vec!["repo/A", "repo/B"]);
}

#[test]
fn test_load_hit_is_idempotent() {
    let (_temp, root) = repo();
    let loader = Counting::new(DirLoader::new());
    let cache = cache(loader.clone());
    cache.init(&root).unwrap();

    let first = cache.load(root.join("B")).unwrap().unwrap();
    let second = cache.load(root.join("B")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.pkg_path(), "repo/B");
    assert_eq!(loader.loads(), 1);
}

#[test]
fn test_missing_directory_rebuilds_once() {
    let (_temp, root) = repo();
    let loader = Counting::new(DirLoader::new());
    let cache = cache(loader.clone());
    cache.init(&root).unwrap();

    assert!(cache.load(root.join("missing")).unwrap().is_none());
    assert_eq!(loader.loads(), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_miss_picks_up_new_packages() {
    let (_temp, root) = repo();
    let cache = cache(Arc::new(DirLoader::new()));
    cache.init(&root).unwrap();
    assert!(cache.lookup("repo/C").is_none());

    write(&root, "C/c.src", "import \"repo/B\"\n");
    let c = cache.load(root.join("C")).unwrap().unwrap();
    assert_eq!(c.pkg_path(), "repo/C");
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_base_package_keeps_its_key() {
    let (_temp, root) = repo();
    write(&root, "A/a_test.src", "import \"repo/B\"\n");
    let cache = cache(Arc::new(DirLoader::new()));
    cache.init(&root).unwrap();

    // The test variant shares the directory, so it never displaces the base.
    let a = cache.load(root.join("A")).unwrap().unwrap();
    assert_eq!(a.id(), "repo/A");
    assert_eq!(a.compiled_files().len(), 1);

    // B depends on A, and the test of A imports B.
    let b = cache.load(root.join("B")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&b.imports()[0], &a));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_tests_disabled_by_settings() {
    let (_temp, root) = repo();
    write(&root, "T/t_test.src", "only tests\n");

    let overrides = SettingsOverrides {
        include_tests: Some(false),
        ..Default::default()
    };
    let settings = Settings::default().apply(Some(&overrides));
    let cache = PackageCache::with_settings(Arc::new(DirLoader::from_settings(&settings)), &settings)
        .with_path_style(PathStyle::Posix);
    cache.init(&root).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.lookup("repo/T").is_none());
}

#[test]
fn test_loader_error_propagates() {
    let (_temp, root) = repo();
    write(&root, "A/cycle.src", "import \"repo/B\"\n");
    let cache = cache(Arc::new(DirLoader::new()));

    let err = cache.init(&root).unwrap_err();
    assert!(matches!(err, LoadError::ImportCycle { .. }));
    assert!(cache.is_empty());
}

/// Counts loads; once armed, a load waits until every caller has arrived
/// and then lingers, so all of them miss against the same generation.
struct Gated {
    inner: DirLoader,
    loads: AtomicUsize,
    armed: AtomicBool,
    arrived: AtomicUsize,
    callers: usize,
}

impl PackageLoader for Gated {
    fn load(&self, config: &LoadConfig, patterns: &[Pattern]) -> LoadResult<Vec<Arc<Package>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.armed.load(Ordering::SeqCst) {
            while self.arrived.load(Ordering::SeqCst) < self.callers {
                std::thread::yield_now();
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        self.inner.load(config, patterns)
    }
}

#[test]
fn test_concurrent_misses_share_rebuilds() {
    const CALLERS: usize = 8;
    let (_temp, root) = repo();
    let loader = Arc::new(Gated {
        inner: DirLoader::new(),
        loads: AtomicUsize::new(0),
        armed: AtomicBool::new(false),
        arrived: AtomicUsize::new(0),
        callers: CALLERS,
    });
    let cache = cache(loader.clone());
    cache.init(&root).unwrap();
    loader.armed.store(true, Ordering::SeqCst);

    let missing = root.join("missing");
    std::thread::scope(|s| {
        for _ in 0..CALLERS {
            s.spawn(|| {
                loader.arrived.fetch_add(1, Ordering::SeqCst);
                assert!(cache.load(&missing).unwrap().is_none());
            });
        }
    });

    // Init plus a single rebuild shared by every concurrent miss.
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
    assert!(cache.load(root.join("A")).unwrap().is_some());
}
