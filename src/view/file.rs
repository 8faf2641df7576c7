//! Per-file state tracked by a [`View`].

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::View;
use crate::base::{LineIndex, Uri};
use crate::core::{LoadError, LoadResult};
use crate::loader::Package;
use crate::syntax::SyntaxTree;

/// One source file known to a session.
///
/// Created empty on first lookup and filled in place as parse results
/// arrive. Lives as long as its view.
#[derive(Debug)]
pub struct File {
    uri: Uri,
    view: Weak<View>,
    state: RwLock<FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    content: Option<Arc<[u8]>>,
    syntax: Option<Arc<SyntaxTree>>,
    line_index: Option<Arc<LineIndex>>,
    package: Option<Arc<Package>>,
    /// Content is an unsaved edit registered in the view's overlay.
    active: bool,
}

impl File {
    pub(super) fn new(uri: Uri, view: Weak<View>) -> Self {
        Self {
            uri,
            view,
            state: RwLock::new(FileState::default()),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The owning view, while it is alive.
    pub fn view(&self) -> Option<Arc<View>> {
        self.view.upgrade()
    }

    /// Raw content, `None` until loaded.
    pub fn content(&self) -> Option<Arc<[u8]>> {
        self.state.read().content.clone()
    }

    pub fn syntax(&self) -> Option<Arc<SyntaxTree>> {
        self.state.read().syntax.clone()
    }

    /// Token/position index of the parsed content.
    pub fn line_index(&self) -> Option<Arc<LineIndex>> {
        self.state.read().line_index.clone()
    }

    /// The package this file was last parsed as part of.
    pub fn package(&self) -> Option<Arc<Package>> {
        self.state.read().package.clone()
    }

    pub fn has_package(&self) -> bool {
        self.state.read().package.is_some()
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.state.read().active
    }

    /// Returns the content, reading it from disk when it was never loaded.
    pub fn read(&self) -> LoadResult<Arc<[u8]>> {
        if let Some(content) = self.content() {
            return Ok(content);
        }
        let path = self.uri.to_file_path()?;
        let bytes: Arc<[u8]> = std::fs::read(&path)
            .map_err(|e| LoadError::io(&path, e))?
            .into();
        let mut state = self.state.write();
        Ok(state.content.get_or_insert(bytes).clone())
    }

    /// Replaces the content and drops parse results.
    ///
    /// `Some` registers an unsaved edit in the view's overlay, so the next
    /// parse sees it ahead of disk content. `None` forgets an earlier edit.
    pub fn set_content(&self, content: Option<Arc<[u8]>>) -> LoadResult<()> {
        let path = self.uri.to_file_path()?;
        let view = self.view.upgrade();
        let mut state = self.state.write();
        state.syntax = None;
        state.line_index = None;
        state.package = None;

        match content {
            Some(bytes) => {
                state.active = true;
                state.content = Some(bytes.clone());
                if let Some(view) = view {
                    view.overlay_insert(path, bytes);
                }
            }
            None => {
                let was_active = std::mem::take(&mut state.active);
                state.content = None;
                if let (true, Some(view)) = (was_active, view) {
                    view.overlay_remove(&path);
                }
            }
        }
        Ok(())
    }

    /// Stores one parse result. `snapshot` (the bytes the tree was parsed
    /// from) only fills content that was never set.
    ///
    /// A concurrent parse may already have evicted the snapshot; the tree is
    /// lossless, so its text stands in.
    pub(super) fn populate(
        &self,
        snapshot: Option<Arc<[u8]>>,
        syntax: Arc<SyntaxTree>,
        package: Arc<Package>,
    ) {
        let mut state = self.state.write();
        if state.content.is_none() {
            state.content =
                Some(snapshot.unwrap_or_else(|| Arc::from(syntax.text().as_bytes())));
        }
        state.line_index = Some(syntax.line_index().clone());
        state.syntax = Some(syntax);
        state.package = Some(package);
    }
}
