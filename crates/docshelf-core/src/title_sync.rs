use crate::doc_id::DocUrl;
use crate::doc_type::DocTypeRegistry;
use crate::folder::FolderCollection;
use crate::selection::Selection;
use crate::store::DocStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Result of one title sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleSyncOutcome {
    Renamed { from: String, to: String },
    Unchanged,
    /// Selection moved on while the title was being read; nothing written.
    Stale,
    NoFolder,
    NoEntry,
    NoDocument,
    /// The document has no content to take a title from yet.
    NoTitle,
    UnknownType,
}

/// Keeps the folder entry name of the selected document in step with the
/// title stored in the document itself.
#[derive(Clone)]
pub struct TitleSync {
    registry: Arc<DocTypeRegistry>,
    store: Arc<DocStore>,
    selection: watch::Receiver<Selection>,
    folder: watch::Receiver<Option<FolderCollection>>,
}

impl TitleSync {
    pub fn new(
        registry: Arc<DocTypeRegistry>,
        store: Arc<DocStore>,
        selection: watch::Receiver<Selection>,
        folder: watch::Receiver<Option<FolderCollection>>,
    ) -> Self {
        Self {
            registry,
            store,
            selection,
            folder,
        }
    }

    /// One pass for `target`.
    ///
    /// The target is captured up front. Reading the title may suspend, so the
    /// selection is checked again before anything is written; a title read
    /// for a document that is no longer selected is dropped.
    pub async fn sync_once(&self, target: &DocUrl) -> TitleSyncOutcome {
        let Some(folder) = self.folder.borrow().clone() else {
            return TitleSyncOutcome::NoFolder;
        };
        let Some(entry) = folder.find(target) else {
            return TitleSyncOutcome::NoEntry;
        };
        let Some(handle) = self.store.get(target) else {
            return TitleSyncOutcome::NoDocument;
        };
        let Some(doc_type) = self.registry.get(entry.doc_type.as_str()).cloned() else {
            tracing::warn!("No descriptor for type {} of {}", entry.doc_type, target);
            return TitleSyncOutcome::UnknownType;
        };

        let Some(title) = doc_type.title(handle.doc()).await else {
            return TitleSyncOutcome::NoTitle;
        };

        if self.selection.borrow().url() != Some(target) {
            tracing::debug!("Dropping stale title {:?} for {}", title, target);
            return TitleSyncOutcome::Stale;
        }

        // The entry may have been renamed or removed during the read.
        let Some(entry) = folder.find(target) else {
            return TitleSyncOutcome::NoEntry;
        };
        if entry.name == title {
            return TitleSyncOutcome::Unchanged;
        }
        folder.update_name(target, &title);
        TitleSyncOutcome::Renamed {
            from: entry.name,
            to: title,
        }
    }

    /// Run until the selection channel closes.
    ///
    /// Re-syncs whenever the selection, the selected document, the folder or
    /// the folder's contents change.
    pub async fn run(mut self) {
        tracing::info!("Title sync started");
        loop {
            let target = self.selection.borrow_and_update().url().cloned();
            let mut folder_rev = self
                .folder
                .borrow_and_update()
                .as_ref()
                .map(|folder| folder.subscribe());
            let mut doc_rev = target.as_ref().and_then(|url| self.store.subscribe(url).ok());

            if let Some(url) = &target {
                match self.sync_once(url).await {
                    TitleSyncOutcome::Renamed { from, to } => {
                        tracing::info!("Renamed {} from {:?} to {:?}", url, from, to)
                    }
                    outcome => tracing::debug!("Title sync for {}: {:?}", url, outcome),
                }
            }

            tokio::select! {
                changed = self.selection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = self.folder.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = revision_changed(&mut doc_rev) => {}
                _ = revision_changed(&mut folder_rev) => {}
            }
        }
        tracing::info!("Title sync stopped");
    }
}

/// Resolves on the next revision; never resolves without a receiver.
async fn revision_changed(rx: &mut Option<watch::Receiver<u64>>) {
    if let Some(rx) = rx {
        if rx.changed().await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
