//! Document selection and navigation core.
//!
//! The location fragment decides which document is open. A
//! [`selection::SelectionController`] turns fragment changes into selection
//! changes and keeps the root [`folder::FolderCollection`] consistent with
//! them, while [`title_sync::TitleSync`] mirrors document titles into the
//! folder's entry names.

pub mod doc_id;
pub mod doc_type;
pub mod folder;
pub mod notify;
pub mod selection;
pub mod store;
pub mod title_sync;
pub mod url_codec;

pub use doc_id::DocUrl;
pub use doc_type::{DocType, DocTypeRegistry, DocTypeTag};
pub use folder::{DocumentReference, FolderCollection};
pub use selection::{Selection, SelectionController, SelectionError};
pub use store::{DocHandle, DocStore};
pub use title_sync::{TitleSync, TitleSyncOutcome};
