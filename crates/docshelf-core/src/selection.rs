use crate::doc_id::DocUrl;
use crate::doc_type::DocTypeRegistry;
use crate::folder::{DocumentReference, FolderCollection};
use crate::notify::Notifier;
use crate::store::DocStore;
use crate::url_codec::{self, HashDecode, UrlHashParams};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Folder entry name for documents first seen through a link.
pub const UNKNOWN_DOCUMENT_NAME: &str = "Unknown document";

/// Which document is selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Empty,
    Selected(DocUrl),
}

impl Selection {
    pub fn url(&self) -> Option<&DocUrl> {
        match self {
            Selection::Empty => None,
            Selection::Selected(url) => Some(url),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Could not find document {0} in the root folder")]
    UnknownDocument(DocUrl),
    #[error("Document type {0:?} is not registered")]
    UnregisteredType(String),
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Make sure the folder has an entry for a document reached by link.
    Rehydrate(UrlHashParams),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub selection: Selection,
    pub effects: Vec<Effect>,
}

/// Next selection for a decoded fragment.
///
/// - no document: `Empty`, no effects
/// - malformed (already alerted): selection unchanged
/// - document: selected, with a rehydration effect
pub fn reduce(current: &Selection, decoded: &HashDecode) -> Transition {
    match decoded {
        HashDecode::Empty => Transition {
            selection: Selection::Empty,
            effects: Vec::new(),
        },
        HashDecode::Rejected => Transition {
            selection: current.clone(),
            effects: Vec::new(),
        },
        HashDecode::Doc(params) => Transition {
            selection: Selection::Selected(params.doc_url.clone()),
            effects: vec![Effect::Rehydrate(params.clone())],
        },
    }
}

/// What to select after removing the entry at `index` from `entries`.
///
/// Computed on the pre-removal list: the entry that will shift into the slot
/// (`index + 1`), else the previous one when `index > 1`, else nothing.
pub fn neighbor_after_removal(entries: &[DocumentReference], index: usize) -> Option<DocUrl> {
    if let Some(next) = entries.get(index + 1) {
        return Some(next.url.clone());
    }
    if index > 1 {
        return entries.get(index - 1).map(|prev| prev.url.clone());
    }
    None
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A navigation event, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Mounted { fragment: String },
    HashChanged { fragment: String },
}

impl NavEvent {
    pub fn fragment(&self) -> &str {
        match self {
            NavEvent::Mounted { fragment } | NavEvent::HashChanged { fragment } => fragment,
        }
    }
}

/// The location fragment. Changing it emits a `HashChanged` event; setting
/// the value it already has emits nothing.
pub struct Location {
    fragment: String,
    events: mpsc::UnboundedSender<NavEvent>,
}

impl Location {
    pub fn new(initial: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<NavEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                fragment: initial.into(),
                events,
            },
            rx,
        )
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Returns whether an event was emitted.
    pub fn set_fragment(&mut self, fragment: impl Into<String>) -> bool {
        let fragment = fragment.into();
        if url_codec::same_fragment(&self.fragment, &fragment) {
            return false;
        }
        self.fragment = fragment.clone();
        if self.events.send(NavEvent::HashChanged { fragment }).is_err() {
            tracing::error!("Navigation event dropped: controller receiver is gone");
        }
        true
    }

    fn mount(&self) {
        let fragment = self.fragment.clone();
        if self.events.send(NavEvent::Mounted { fragment }).is_err() {
            tracing::error!("Mount event dropped: controller receiver is gone");
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionController
// ---------------------------------------------------------------------------

/// Keeps the selection, the location fragment and the root folder consistent.
///
/// The fragment is the single source of truth: user actions write the
/// fragment, and the selection only ever changes while processing the
/// navigation event that write produces. Processing an event never writes the
/// fragment, so one pass always converges.
pub struct SelectionController {
    registry: Arc<DocTypeRegistry>,
    store: Arc<DocStore>,
    notifier: Arc<dyn Notifier>,
    location: Location,
    nav_rx: mpsc::UnboundedReceiver<NavEvent>,
    selection: watch::Sender<Selection>,
    folder: watch::Sender<Option<FolderCollection>>,
    /// Last document opened from the fragment, replayed when a folder arrives.
    last_opened: Option<UrlHashParams>,
}

impl SelectionController {
    /// A controller with no folder loaded yet. The initial fragment is queued
    /// as a mount event.
    pub fn new(
        registry: Arc<DocTypeRegistry>,
        store: Arc<DocStore>,
        notifier: Arc<dyn Notifier>,
        initial_fragment: impl Into<String>,
    ) -> Self {
        let (location, nav_rx) = Location::new(initial_fragment);
        location.mount();
        let (selection, _) = watch::channel(Selection::Empty);
        let (folder, _) = watch::channel(None);
        Self {
            registry,
            store,
            notifier,
            location,
            nav_rx,
            selection,
            folder,
            last_opened: None,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    pub fn folder(&self) -> Option<FolderCollection> {
        self.folder.borrow().clone()
    }

    pub fn subscribe_folder(&self) -> watch::Receiver<Option<FolderCollection>> {
        self.folder.subscribe()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn registry(&self) -> &Arc<DocTypeRegistry> {
        &self.registry
    }

    /// Folder entry of the current selection, if both exist.
    pub fn selected_entry(&self) -> Option<DocumentReference> {
        let url = self.selection().url().cloned()?;
        self.folder()?.find(&url)
    }

    /// Install the root folder once it has loaded.
    ///
    /// A document selected while the folder was still loading is rehydrated
    /// now, so the selected document always has a folder entry.
    pub fn attach_folder(&mut self, folder: FolderCollection) {
        tracing::info!("Root folder {} loaded", folder.url());
        self.folder.send_replace(Some(folder));
        if let Some(params) = self.last_opened.clone() {
            if self.selection().url() == Some(&params.doc_url) {
                self.rehydrate(&params);
            }
        }
    }

    /// External navigation, e.g. the user edited the address bar.
    pub fn navigate(&mut self, fragment: impl Into<String>) {
        self.location.set_fragment(fragment);
    }

    /// Process every queued navigation event, in order. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.nav_rx.try_recv() {
            self.handle_nav_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_nav_event(&mut self, event: NavEvent) {
        tracing::debug!("Navigation event {:?}", event);
        let decoded = url_codec::decode(event.fragment(), &self.registry, self.notifier.as_ref());
        self.apply(&decoded);
    }

    /// Open the document a link points at, adding it to the folder if unseen.
    ///
    /// Goes through the fragment like every other selection change; the
    /// selection follows when the resulting navigation event is processed.
    pub fn open_doc_from_url(&mut self, params: UrlHashParams) {
        self.write_fragment(url_codec::encode(&params));
    }

    /// User-initiated selection.
    ///
    /// `None` clears the fragment. `Some(url)` must name a folder entry; the
    /// fragment is rewritten with the entry's own type and the selection
    /// follows when that navigation event is processed.
    pub fn select_doc(&mut self, url: Option<&DocUrl>) -> Result<(), SelectionError> {
        let fragment = match url {
            None => String::new(),
            Some(url) => {
                let Some(entry) = self.folder().and_then(|folder| folder.find(url)) else {
                    let err = SelectionError::UnknownDocument(url.clone());
                    self.notifier.alert(&err.to_string());
                    return Err(err);
                };
                url_codec::encode(&UrlHashParams {
                    doc_url: entry.url,
                    doc_type: entry.doc_type,
                })
            }
        };
        self.write_fragment(fragment);
        Ok(())
    }

    /// Create a document of type `tag`, add it to the front of the folder and
    /// point the fragment at it.
    ///
    /// An unregistered `tag` is a caller bug and fails before anything is created.
    pub fn add_new_document(&mut self, tag: &str) -> Result<DocumentReference, SelectionError> {
        let doc_type = self
            .registry
            .get(tag)
            .cloned()
            .ok_or_else(|| SelectionError::UnregisteredType(tag.to_string()))?;

        let handle = self.store.create(|txn| doc_type.init(txn));
        let doc_ref = DocumentReference {
            doc_type: doc_type.tag().clone(),
            name: doc_type.initial_title().to_string(),
            url: handle.url().clone(),
        };

        match self.folder() {
            Some(folder) => folder.insert_front(doc_ref.clone()),
            None => tracing::debug!(
                "No root folder loaded yet, {} not added to folder",
                doc_ref.url
            ),
        }

        self.write_fragment(url_codec::encode(&UrlHashParams {
            doc_url: doc_ref.url.clone(),
            doc_type: doc_ref.doc_type.clone(),
        }));
        Ok(doc_ref)
    }

    /// Remove `url` from the folder and select its neighbor.
    /// Returns the neighbor that was selected, if any.
    pub fn delete_from_root_folder(&mut self, url: &DocUrl) -> Result<Option<DocUrl>, SelectionError> {
        let Some(folder) = self.folder() else {
            tracing::debug!("No root folder loaded yet, ignoring delete of {}", url);
            return Ok(None);
        };

        let entries = folder.entries();
        let Some(index) = entries.iter().position(|entry| &entry.url == url) else {
            let err = SelectionError::UnknownDocument(url.clone());
            self.notifier.alert(&err.to_string());
            return Err(err);
        };
        let neighbor = neighbor_after_removal(&entries, index);

        folder.remove_at(url);
        self.select_doc(neighbor.as_ref())?;
        Ok(neighbor)
    }

    // -----------------------------------------------------------------------

    fn apply(&mut self, decoded: &HashDecode) {
        let current = self.selection();
        let transition = reduce(&current, decoded);
        for effect in &transition.effects {
            match effect {
                Effect::Rehydrate(params) => {
                    self.last_opened = Some(params.clone());
                    self.rehydrate(params);
                }
            }
        }
        if transition.selection != current {
            tracing::info!("Selection {:?} -> {:?}", current, transition.selection);
            self.selection.send_replace(transition.selection);
        }
    }

    fn rehydrate(&self, params: &UrlHashParams) {
        self.store.open(&params.doc_url);
        let Some(folder) = self.folder() else {
            tracing::debug!(
                "No root folder loaded yet, deferring folder entry for {}",
                params.doc_url
            );
            return;
        };
        let doc_ref = DocumentReference {
            doc_type: params.doc_type.clone(),
            name: UNKNOWN_DOCUMENT_NAME.to_string(),
            url: params.doc_url.clone(),
        };
        if folder.insert_front_if_absent(doc_ref) {
            tracing::info!("Rehydrated {} from link", params.doc_url);
        }
    }

    /// Write the fragment. When it already holds this value no event fires,
    /// so the fragment is re-processed directly to keep selection in step.
    fn write_fragment(&mut self, fragment: String) {
        if !self.location.set_fragment(fragment.clone()) {
            let decoded = url_codec::decode(&fragment, &self.registry, self.notifier.as_ref());
            self.apply(&decoded);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
