use crate::doc_id::DocUrl;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use yrs::{Doc, Transact, Transaction, TransactionMut};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(DocUrl),
}

/// A document and its change signal.
///
/// Every write made through [`DocHandle::change`] bumps the revision, which
/// is what subscribers wait on. Cloning shares the same document.
#[derive(Clone)]
pub struct DocHandle {
    url: DocUrl,
    doc: Doc,
    revision: Arc<watch::Sender<u64>>,
}

impl DocHandle {
    fn new(url: DocUrl) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            url,
            doc: Doc::new(),
            revision: Arc::new(revision),
        }
    }

    pub fn url(&self) -> &DocUrl {
        &self.url
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Apply a mutation in a single write transaction.
    pub fn change<R>(&self, f: impl FnOnce(&mut TransactionMut<'_>) -> R) -> R {
        let result = {
            let mut txn = self.doc.transact_mut();
            f(&mut txn)
        };
        self.bump();
        result
    }

    /// Like [`DocHandle::change`], tagging the transaction with `origin` so
    /// observers can tell who wrote it.
    pub fn change_with<R>(&self, origin: &str, f: impl FnOnce(&mut TransactionMut<'_>) -> R) -> R {
        let result = {
            let mut txn = self.doc.transact_mut_with(origin);
            f(&mut txn)
        };
        self.bump();
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&Transaction<'_>) -> R) -> R {
        let txn = self.doc.transact();
        f(&txn)
    }

    /// Live revision counter of this document.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// In-process document store keyed by identifier.
///
/// Stands in for the replicated document repository: it mints identifiers,
/// hands out live handles and serializes writes per document. Sync and
/// persistence live elsewhere.
#[derive(Default)]
pub struct DocStore {
    docs: DashMap<DocUrl, DocHandle>,
}

impl DocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new document under a fresh identifier, seeding it with `init`.
    pub fn create(&self, init: impl FnOnce(&mut TransactionMut<'_>)) -> DocHandle {
        use dashmap::mapref::entry::Entry;
        let handle = loop {
            match self.docs.entry(DocUrl::generate()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(e) => {
                    let url = e.key().clone();
                    break e.insert(DocHandle::new(url)).value().clone();
                }
            }
        };
        // DashMap guard is gone; init may touch the store again.
        handle.change(init);
        tracing::info!("Created document {}", handle.url());
        handle
    }

    /// Handle for `url`, registering an empty document if none is known.
    ///
    /// Documents reached through a shared link start empty here; their content
    /// arrives through sync.
    pub fn open(&self, url: &DocUrl) -> DocHandle {
        self.docs
            .entry(url.clone())
            .or_insert_with(|| {
                tracing::info!("Opened unknown document {}, awaiting content", url);
                DocHandle::new(url.clone())
            })
            .value()
            .clone()
    }

    pub fn get(&self, url: &DocUrl) -> Option<DocHandle> {
        self.docs.get(url).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, url: &DocUrl) -> bool {
        self.docs.contains_key(url)
    }

    pub fn change<R>(
        &self,
        url: &DocUrl,
        f: impl FnOnce(&mut TransactionMut<'_>) -> R,
    ) -> Result<R, StoreError> {
        let handle = self
            .get(url)
            .ok_or_else(|| StoreError::NotFound(url.clone()))?;
        Ok(handle.change(f))
    }

    pub fn subscribe(&self, url: &DocUrl) -> Result<watch::Receiver<u64>, StoreError> {
        self.get(url)
            .map(|handle| handle.subscribe())
            .ok_or_else(|| StoreError::NotFound(url.clone()))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
