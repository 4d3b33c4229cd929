use crate::doc_id::DocUrl;
use crate::doc_type::DocTypeTag;
use crate::store::{DocHandle, DocStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;
use yrs::{Any, Array, ArrayRef, Map, MapPrelim, Out, ReadTxn, TransactionMut, WriteTxn};

/// Y.Array holding the folder entries, most recent first.
pub const FOLDER_DOCS: &str = "docs";
/// Y.Map holding folder-level settings such as its title.
pub const FOLDER_CONFIG: &str = "folder_config";

/// A folder entry: which document, of what type, under what cached name.
///
/// `name` is only a display cache; the authoritative title lives inside the
/// referenced document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    #[serde(rename = "type")]
    pub doc_type: DocTypeTag,
    pub name: String,
    pub url: DocUrl,
}

// ---------------------------------------------------------------------------
// Entry encoding
// ---------------------------------------------------------------------------

/// Extract a string field from a folder entry value.
///
/// Entries can be stored as either:
/// - `Out::YMap(MapRef)`: nested shared maps, as written by this crate
/// - `Out::Any(Any::Map(HashMap))`: plain objects, as written by older JS clients
fn extract_entry_field(value: &Out, txn: &impl ReadTxn, key: &str) -> Option<String> {
    match value {
        Out::YMap(entry) => {
            if let Some(Out::Any(Any::String(ref s))) = entry.get(txn, key) {
                Some(s.to_string())
            } else {
                None
            }
        }
        Out::Any(Any::Map(ref map)) => {
            if let Some(Any::String(ref s)) = map.get(key) {
                Some(s.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Decode a folder entry. Returns `None` for entries with a missing or
/// malformed `url` or `type`; a missing name decodes as empty.
pub fn read_doc_ref(value: &Out, txn: &impl ReadTxn) -> Option<DocumentReference> {
    let url = DocUrl::new(extract_entry_field(value, txn, "url")?).ok()?;
    let doc_type = DocTypeTag::new(extract_entry_field(value, txn, "type")?).ok()?;
    let name = extract_entry_field(value, txn, "name").unwrap_or_default();
    Some(DocumentReference {
        doc_type,
        name,
        url,
    })
}

/// Entries are nested maps so a rename touches only the `name` key.
fn entry_value(doc_ref: &DocumentReference) -> MapPrelim {
    [
        ("type", Any::String(doc_ref.doc_type.as_str().into())),
        ("name", Any::String(doc_ref.name.as_str().into())),
        ("url", Any::String(doc_ref.url.as_str().into())),
    ]
    .into_iter()
    .collect()
}

/// Raw index of the entry for `url`, counting malformed entries too.
fn position_in(docs: &ArrayRef, txn: &impl ReadTxn, url: &DocUrl) -> Option<u32> {
    docs.iter(txn)
        .position(|value| extract_entry_field(&value, txn, "url").as_deref() == Some(url.as_str()))
        .map(|i| i as u32)
}

/// Read all well-formed entries, in order.
pub fn read_entries(txn: &impl ReadTxn) -> Vec<DocumentReference> {
    let Some(docs) = txn.get_array(FOLDER_DOCS) else {
        return Vec::new();
    };
    docs.iter(txn)
        .filter_map(|value| {
            let doc_ref = read_doc_ref(&value, txn);
            if doc_ref.is_none() {
                tracing::warn!("Skipping malformed folder entry: {:?}", value);
            }
            doc_ref
        })
        .collect()
}

/// Read the folder's own display title.
pub fn read_folder_title(txn: &impl ReadTxn) -> Option<String> {
    let config = txn.get_map(FOLDER_CONFIG)?;
    match config.get(txn, "title") {
        Some(Out::Any(Any::String(title))) => Some(title.to_string()),
        _ => None,
    }
}

fn insert_front_in(txn: &mut TransactionMut<'_>, doc_ref: &DocumentReference) {
    let docs = txn.get_or_insert_array(FOLDER_DOCS);
    docs.insert(txn, 0, entry_value(doc_ref));
}

// ---------------------------------------------------------------------------
// FolderCollection
// ---------------------------------------------------------------------------

/// The root folder: the ordered list of document references.
///
/// The list lives inside its own replicated document, so every mutation here
/// is a single write transaction on that document and every reader sees the
/// same structural change. Uniqueness by `url` is a caller concern except in
/// [`FolderCollection::insert_front_if_absent`].
#[derive(Clone)]
pub struct FolderCollection {
    handle: DocHandle,
}

impl FolderCollection {
    /// Create a new, empty root folder document.
    pub fn create(store: &DocStore, title: &str) -> Self {
        let handle = store.create(|txn| {
            txn.get_or_insert_array(FOLDER_DOCS);
            let config = txn.get_or_insert_map(FOLDER_CONFIG);
            config.insert(txn, "title", Any::String(title.into()));
        });
        tracing::info!("Created root folder {} ({})", handle.url(), title);
        Self { handle }
    }

    /// Wrap an existing folder document.
    pub fn open(store: &DocStore, url: &DocUrl) -> Self {
        Self {
            handle: store.open(url),
        }
    }

    pub fn url(&self) -> &DocUrl {
        self.handle.url()
    }

    pub fn title(&self) -> Option<String> {
        self.handle.read(|txn| read_folder_title(txn))
    }

    pub fn entries(&self) -> Vec<DocumentReference> {
        self.handle.read(|txn| read_entries(txn))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, url: &DocUrl) -> Option<DocumentReference> {
        self.entries().into_iter().find(|entry| &entry.url == url)
    }

    /// Index of `url` among the well-formed entries.
    pub fn position(&self, url: &DocUrl) -> Option<usize> {
        self.entries().iter().position(|entry| &entry.url == url)
    }

    /// Insert at the front. Performs no deduplication.
    pub fn insert_front(&self, doc_ref: DocumentReference) {
        self.handle.change(|txn| insert_front_in(txn, &doc_ref));
        tracing::info!("Added {} ({}) to root folder", doc_ref.url, doc_ref.doc_type);
    }

    /// Insert at the front unless an entry with the same url exists.
    /// Lookup and insert share one transaction. Returns whether it inserted.
    pub fn insert_front_if_absent(&self, doc_ref: DocumentReference) -> bool {
        let inserted = self.handle.change(|txn| {
            let docs = txn.get_or_insert_array(FOLDER_DOCS);
            if position_in(&docs, &*txn, &doc_ref.url).is_some() {
                return false;
            }
            insert_front_in(txn, &doc_ref);
            true
        });
        if inserted {
            tracing::info!("Added {} ({}) to root folder", doc_ref.url, doc_ref.doc_type);
        }
        inserted
    }

    /// Delete the entry for `url`. Choosing what to select next is the caller's job.
    pub fn remove_at(&self, url: &DocUrl) -> Option<DocumentReference> {
        let removed = self.handle.change(|txn| {
            let docs = txn.get_or_insert_array(FOLDER_DOCS);
            let index = position_in(&docs, &*txn, url)?;
            let removed = docs.get(&*txn, index).and_then(|value| read_doc_ref(&value, &*txn));
            docs.remove(txn, index);
            removed
        });
        match &removed {
            Some(doc_ref) => tracing::info!("Removed {} from root folder", doc_ref.url),
            None => tracing::debug!("Remove of {} skipped: not in root folder", url),
        }
        removed
    }

    /// Set the cached name of `url`'s entry. Only `name` changes; `url` and
    /// `type` are carried over untouched. Returns whether anything was written.
    pub fn update_name(&self, url: &DocUrl, name: &str) -> bool {
        let written = self.handle.change_with("title-sync", |txn| {
            let docs = txn.get_or_insert_array(FOLDER_DOCS);
            let Some(index) = position_in(&docs, &*txn, url) else {
                return false;
            };
            let Some(value) = docs.get(&*txn, index) else {
                return false;
            };
            if extract_entry_field(&value, &*txn, "name").as_deref() == Some(name) {
                return false;
            }
            match value {
                Out::YMap(entry) => {
                    entry.insert(txn, "name", Any::String(name.into()));
                }
                Out::Any(Any::Map(fields)) => {
                    // Plain objects can't be edited in place; replace the
                    // element with a nested map at the same index.
                    let mut fields: HashMap<String, Any> = fields.as_ref().clone();
                    fields.insert("name".to_string(), Any::String(name.into()));
                    let upgraded: MapPrelim = fields.into_iter().collect();
                    docs.remove(txn, index);
                    docs.insert(txn, index, upgraded);
                }
                _ => return false,
            }
            true
        });
        if written {
            tracing::info!("Renamed folder entry {} to {:?}", url, name);
        }
        written
    }

    /// Revision counter of the folder document; changes on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.handle.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn handle(&self) -> &DocHandle {
        &self.handle
    }
}

impl std::fmt::Debug for FolderCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderCollection")
            .field("url", self.url())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
