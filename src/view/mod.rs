//! Session-scoped file registry with overlay-aware parsing.
//!
//! A [`View`] hands out [`File`]s by URI and fills them by running the
//! package loader on demand. Unsaved edits take precedence over disk
//! content, and every populated file keeps the exact bytes its tree was
//! parsed from.
//!
//! ## Locking
//!
//! - `files` guards URI lookup and creation only; it is never held while
//!   parsing.
//! - `parsed` records bytes handed to the parser. It is written from inside
//!   the loader's parse hook, which may run on other threads.
//! - `settings` holds the loader configuration, including the overlay of
//!   unsaved edits.

mod file;

pub use file::File;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::base::Uri;
use crate::core::{LoadError, LoadResult, Settings};
use crate::loader::{LoadConfig, Overlay, PackageLoader, ParseHook, Pattern};
use crate::syntax::SyntaxTree;

/// Maps a file path to the working directory its package is loaded from.
pub type LoadDirFn = Arc<dyn Fn(&Path) -> PathBuf + Send + Sync>;

struct ViewSettings {
    include_tests: bool,
    overlay: Overlay,
}

/// Registry of all files known to one analysis session.
pub struct View {
    files: Mutex<FxHashMap<Uri, Arc<File>>>,
    parsed: Arc<Mutex<Overlay>>,
    settings: RwLock<ViewSettings>,
    get_load_dir: LoadDirFn,
    loader: Arc<dyn PackageLoader>,
    this: Weak<View>,
}

impl View {
    /// Creates a view with default settings.
    pub fn new(loader: Arc<dyn PackageLoader>, get_load_dir: LoadDirFn) -> Arc<Self> {
        Self::with_settings(loader, get_load_dir, &Settings::default())
    }

    pub fn with_settings(
        loader: Arc<dyn PackageLoader>,
        get_load_dir: LoadDirFn,
        settings: &Settings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            files: Mutex::new(FxHashMap::default()),
            parsed: Arc::new(Mutex::new(Overlay::default())),
            settings: RwLock::new(ViewSettings {
                include_tests: settings.include_tests,
                overlay: Overlay::default(),
            }),
            get_load_dir,
            loader,
            this: this.clone(),
        })
    }

    /// Returns the file for `uri`, registering an empty one if needed.
    ///
    /// Never parses; the returned file may still be empty.
    pub fn get_file(&self, uri: &Uri) -> Arc<File> {
        let mut files = self.files.lock();
        files
            .entry(uri.clone())
            .or_insert_with(|| Arc::new(File::new(uri.clone(), self.this.clone())))
            .clone()
    }

    /// True if the file exists and has been assigned a package.
    pub fn has_parsed(&self, uri: &Uri) -> bool {
        let file = self.files.lock().get(uri).cloned();
        file.is_some_and(|f| f.has_package())
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Loads the package(s) containing `uri` and populates every file they
    /// contain.
    ///
    /// Runs synchronously on the calling thread. When a file belongs to more
    /// than one returned package, the last package wins. Snapshots recorded
    /// by this call are evicted on every exit path.
    pub fn parse(&self, uri: &Uri) -> LoadResult<()> {
        let path = uri.to_file_path()?;
        let dir = (self.get_load_dir)(&path);
        let guard = SnapshotGuard::new(&self.parsed);
        let config = {
            let settings = self.settings.read();
            LoadConfig::new(dir)
                .with_tests(settings.include_tests)
                .with_overlay(settings.overlay.clone())
                .with_parse_hook(guard.hook())
        };

        let packages = self
            .loader
            .load(&config, &[Pattern::File(path.clone())])?;
        if packages.is_empty() {
            return Err(LoadError::NoPackages { path });
        }

        for package in &packages {
            for syntax in package.syntax() {
                let file_uri = match Uri::from_file_path(syntax.path()) {
                    Ok(file_uri) => file_uri,
                    Err(err) => {
                        tracing::warn!(%err, "skipping syntax tree without a file URI");
                        continue;
                    }
                };
                let file = self.get_file(&file_uri);
                let snapshot = self.parsed.lock().remove(syntax.path());
                file.populate(snapshot, syntax.clone(), package.clone());
                tracing::trace!(uri = %file_uri, package = package.id(), "parsed file");
            }
        }
        tracing::debug!(%uri, packages = packages.len(), "parse finished");
        Ok(())
    }

    /// Unsaved content registered for `path`, if any.
    pub fn overlay(&self, path: &Path) -> Option<Arc<[u8]>> {
        self.settings.read().overlay.get(path).cloned()
    }

    pub(crate) fn overlay_insert(&self, path: PathBuf, content: Arc<[u8]>) {
        self.settings.write().overlay.insert(path, content);
    }

    pub(crate) fn overlay_remove(&self, path: &Path) {
        self.settings.write().overlay.remove(path);
    }

    /// Number of parsed snapshots not yet merged into a file.
    pub fn pending_snapshots(&self) -> usize {
        self.parsed.lock().len()
    }
}

/// Records the bytes of every file parsed during one [`View::parse`] call
/// and evicts them all when dropped.
///
/// Entries not merged into a file (imported packages, failed loads) would
/// otherwise stay in the view's transient overlay.
struct SnapshotGuard<'a> {
    parsed: &'a Arc<Mutex<Overlay>>,
    recorded: Arc<Mutex<Vec<PathBuf>>>,
}

impl<'a> SnapshotGuard<'a> {
    fn new(parsed: &'a Arc<Mutex<Overlay>>) -> Self {
        Self {
            parsed,
            recorded: Arc::default(),
        }
    }

    /// Hook that records the bytes of a file before parsing them, reading
    /// the disk when no content is supplied.
    fn hook(&self) -> ParseHook {
        let parsed = Arc::clone(self.parsed);
        let recorded = Arc::clone(&self.recorded);
        Arc::new(move |path: &Path, src: Option<&[u8]>| {
            let bytes: Arc<[u8]> = match src {
                Some(src) => Arc::from(src),
                None => std::fs::read(path)
                    .map_err(|e| LoadError::io(path, e))?
                    .into(),
            };
            parsed.lock().insert(path.to_path_buf(), bytes.clone());
            recorded.lock().push(path.to_path_buf());
            SyntaxTree::from_bytes(path, &bytes)
        })
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        let recorded = std::mem::take(&mut *self.recorded.lock());
        let mut parsed = self.parsed.lock();
        for path in &recorded {
            parsed.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Package;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Parses the requested file through the hook and returns it as a
    /// single-file package, or nothing when `empty` is set.
    struct SingleFileLoader {
        calls: AtomicUsize,
        empty: bool,
    }

    impl PackageLoader for SingleFileLoader {
        fn load(
            &self,
            config: &LoadConfig,
            patterns: &[Pattern],
        ) -> LoadResult<Vec<Arc<Package>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(Vec::new());
            }
            let Pattern::File(path) = &patterns[0] else {
                return Ok(Vec::new());
            };
            let tree = config.parse_file(path)?;
            let pkg = Package::new("virtual")
                .with_compiled_files(vec![path.clone()])
                .with_syntax(vec![Arc::new(tree)]);
            Ok(vec![Arc::new(pkg)])
        }
    }

    fn view(empty: bool) -> (Arc<View>, Arc<SingleFileLoader>) {
        let loader = Arc::new(SingleFileLoader {
            calls: AtomicUsize::new(0),
            empty,
        });
        let view = View::new(loader.clone(), Arc::new(|_: &Path| PathBuf::from("/virtual")));
        (view, loader)
    }

    #[test]
    fn test_get_file_is_lazy_and_stable() {
        let (view, loader) = view(false);
        let uri = Uri::from_file_path("/virtual/a.src").unwrap();

        let first = view.get_file(&uri);
        assert!(first.content().is_none());
        assert!(first.syntax().is_none());
        assert!(first.package().is_none());
        assert!(!view.has_parsed(&uri));

        let second = view.get_file(&uri);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(view.file_count(), 1);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_has_parsed_unknown_uri() {
        let (view, _) = view(false);
        let uri = Uri::from_file_path("/virtual/unknown.src").unwrap();
        assert!(!view.has_parsed(&uri));
        assert_eq!(view.file_count(), 0);
    }

    #[test]
    fn test_unsaved_content_is_parsed_and_kept() {
        let (view, _) = view(false);
        let uri = Uri::from_file_path("/virtual/a.src").unwrap();
        let file = view.get_file(&uri);

        file.set_content(Some(Arc::from(&b"import \"virtual/b\""[..])))
            .unwrap();
        assert!(file.has_unsaved_edits());
        assert!(view.overlay(Path::new("/virtual/a.src")).is_some());

        view.parse(&uri).unwrap();
        assert!(view.has_parsed(&uri));
        assert_eq!(file.content().as_deref(), Some(&b"import \"virtual/b\""[..]));
        let syntax = file.syntax().unwrap();
        assert_eq!(syntax.imports().len(), 1);
        assert_eq!(syntax.imports()[0].as_str(), "virtual/b");
        assert!(file.line_index().is_some());
        assert_eq!(view.pending_snapshots(), 0);
    }

    #[test]
    fn test_set_content_resets_parse_state() {
        let (view, _) = view(false);
        let uri = Uri::from_file_path("/virtual/a.src").unwrap();
        let file = view.get_file(&uri);
        file.set_content(Some(Arc::from(&b"one"[..]))).unwrap();
        view.parse(&uri).unwrap();
        assert!(view.has_parsed(&uri));

        file.set_content(Some(Arc::from(&b"two"[..]))).unwrap();
        assert!(!view.has_parsed(&uri));
        view.parse(&uri).unwrap();
        assert_eq!(file.syntax().unwrap().text(), "two");

        file.set_content(None).unwrap();
        assert!(!file.has_unsaved_edits());
        assert!(file.content().is_none());
        assert!(view.overlay(Path::new("/virtual/a.src")).is_none());
    }

    #[test]
    fn test_no_packages_is_not_found() {
        let (view, loader) = view(true);
        let uri = Uri::from_file_path("/virtual/a.src").unwrap();
        let err = view.parse(&uri).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(!view.has_parsed(&uri));
    }

    #[cfg(unix)]
    #[test]
    fn test_uri_without_local_path_fails_before_loading() {
        let (view, loader) = view(false);
        // A host-qualified file URI has no local path on unix.
        let uri = Uri::parse("file://server/share/a.src").unwrap();
        let err = view.parse(&uri).unwrap_err();
        assert!(matches!(err, LoadError::InvalidUri { .. }));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    /// Parses the requested file, then fails or returns no packages.
    struct DiscardingLoader {
        fail: bool,
    }

    impl PackageLoader for DiscardingLoader {
        fn load(
            &self,
            config: &LoadConfig,
            patterns: &[Pattern],
        ) -> LoadResult<Vec<Arc<Package>>> {
            if let Pattern::File(path) = &patterns[0] {
                config.parse_file(path)?;
            }
            if self.fail {
                return Err(LoadError::Compiler("type check failed".to_string()));
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_snapshots_evicted_when_parse_fails() {
        for fail in [true, false] {
            let view = View::new(
                Arc::new(DiscardingLoader { fail }),
                Arc::new(|_: &Path| PathBuf::from("/virtual")),
            );
            let uri = Uri::from_file_path("/virtual/a.src").unwrap();
            view.get_file(&uri)
                .set_content(Some(Arc::from(&b"x"[..])))
                .unwrap();

            let err = view.parse(&uri).unwrap_err();
            assert_eq!(err.is_not_found(), !fail);
            assert_eq!(view.pending_snapshots(), 0);
        }
    }

    #[test]
    fn test_file_back_reference() {
        let (view, _) = view(false);
        let uri = Uri::from_file_path("/virtual/a.src").unwrap();
        let file = view.get_file(&uri);
        assert!(Arc::ptr_eq(&file.view().unwrap(), &view));
    }
}
