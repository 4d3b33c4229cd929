use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use yrs::{Any, Doc, GetString, Map, Out, ReadTxn, Text, Transact, TransactionMut, WriteTxn};

/// Type assumed for links in the legacy `#<id>` form.
pub const LEGACY_DOC_TYPE: &str = "tldraw";

/// Name of a document type, e.g. "essay".
///
/// Lowercase ASCII letters, digits and `-`. Whether a tag is *registered* is
/// a separate question answered by [`DocTypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocTypeTag(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid document type tag {0:?}")]
pub struct InvalidDocTypeTag(pub String);

impl DocTypeTag {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidDocTypeTag> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid {
            Ok(Self(value))
        } else {
            Err(InvalidDocTypeTag(value))
        }
    }

    pub fn legacy() -> Self {
        Self(LEGACY_DOC_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for DocTypeTag {
    type Error = InvalidDocTypeTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocTypeTag> for String {
    fn from(value: DocTypeTag) -> Self {
        value.0
    }
}

/// A tool able to present documents of some type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub name: &'static str,
}

/// Per-type capabilities: initialization, title access and the tools that
/// can open the type. The first tool is the default one.
#[async_trait]
pub trait DocType: Send + Sync {
    fn tag(&self) -> &DocTypeTag;

    /// Title written by `init`, used as the folder entry name of new documents.
    fn initial_title(&self) -> &str;

    /// Seed a freshly created document. Runs once, inside the creation transaction.
    fn init(&self, txn: &mut TransactionMut<'_>);

    /// Read the document's own title.
    ///
    /// Returns `None` while the document has no content of this type yet,
    /// e.g. a document opened by link whose data has not arrived.
    async fn title(&self, doc: &Doc) -> Option<String>;

    fn set_title(&self, txn: &mut TransactionMut<'_>, title: &str);

    fn tools(&self) -> &[ToolDescriptor];
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Mapping from tag to descriptor, looked up once per tag.
#[derive(Default, Clone)]
pub struct DocTypeRegistry {
    types: BTreeMap<String, Arc<dyn DocType>>,
}

impl DocTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the essay, tldraw and datagrid types.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EssayType::new()));
        registry.register(Arc::new(TldrawType::new()));
        registry.register(Arc::new(DatagridType::new()));
        registry
    }

    /// Register a descriptor, replacing any previous one for the same tag.
    pub fn register(&mut self, doc_type: Arc<dyn DocType>) {
        let tag = doc_type.tag().as_str().to_string();
        if self.types.insert(tag.clone(), doc_type).is_some() {
            tracing::warn!("Document type {} registered twice, keeping the latest", tag);
        }
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn DocType>> {
        self.types.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Tools for a tag; empty for unregistered tags.
    pub fn tools_for(&self, tag: &str) -> &[ToolDescriptor] {
        self.types.get(tag).map(|t| t.tools()).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Shared Y.Doc helpers
// ---------------------------------------------------------------------------

/// Read a string field from a top-level Y.Map.
fn read_map_string(doc: &Doc, map_name: &str, key: &str) -> Option<String> {
    let txn = doc.transact();
    let map = txn.get_map(map_name)?;
    match map.get(&txn, key) {
        Some(Out::Any(Any::String(value))) => Some(value.to_string()),
        _ => None,
    }
}

fn write_map_string(txn: &mut TransactionMut<'_>, map_name: &str, key: &str, value: &str) {
    let map = txn.get_or_insert_map(map_name);
    map.insert(txn, key, Any::String(value.into()));
}

// ---------------------------------------------------------------------------
// Essay: markdown in Y.Text("content"), titled by its first `# ` heading
// ---------------------------------------------------------------------------

const ESSAY_CONTENT: &str = "content";
const ESSAY_TOOLS: &[ToolDescriptor] = &[ToolDescriptor {
    id: "essay-editor",
    name: "Editor",
}];

pub struct EssayType {
    tag: DocTypeTag,
}

impl EssayType {
    pub fn new() -> Self {
        Self {
            tag: DocTypeTag("essay".to_string()),
        }
    }
}

impl Default for EssayType {
    fn default() -> Self {
        Self::new()
    }
}

/// Title of a markdown document: text of the first level-one heading.
///
/// Falls back to "Untitled" when the document has no such heading.
pub fn essay_title_from_markdown(markdown: &str) -> String {
    markdown
        .lines()
        .find_map(|line| {
            line.strip_prefix("# ")
                .map(str::trim)
                .filter(|title| !title.is_empty())
        })
        .unwrap_or("Untitled")
        .to_string()
}

#[async_trait]
impl DocType for EssayType {
    fn tag(&self) -> &DocTypeTag {
        &self.tag
    }

    fn initial_title(&self) -> &str {
        "Untitled"
    }

    fn init(&self, txn: &mut TransactionMut<'_>) {
        let text = txn.get_or_insert_text(ESSAY_CONTENT);
        text.insert(txn, 0, "# Untitled\n\n");
    }

    async fn title(&self, doc: &Doc) -> Option<String> {
        let markdown = {
            let txn = doc.transact();
            let text = txn.get_text(ESSAY_CONTENT)?;
            text.get_string(&txn)
        };
        Some(essay_title_from_markdown(&markdown))
    }

    fn set_title(&self, txn: &mut TransactionMut<'_>, title: &str) {
        let text = txn.get_or_insert_text(ESSAY_CONTENT);
        let markdown = text.get_string(&*txn);

        // Replace the first heading line in place, or prepend one.
        // yrs offsets default to UTF-8 bytes, matching str offsets.
        let mut offset = 0usize;
        for line in markdown.split_inclusive('\n') {
            if line.starts_with("# ") {
                let heading_len = line.trim_end_matches('\n').len();
                text.remove_range(txn, offset as u32, heading_len as u32);
                text.insert(txn, offset as u32, &format!("# {}", title));
                return;
            }
            offset += line.len();
        }
        text.insert(txn, 0, &format!("# {}\n\n", title));
    }

    fn tools(&self) -> &[ToolDescriptor] {
        ESSAY_TOOLS
    }
}

// ---------------------------------------------------------------------------
// TLDraw: canvas pages, titled by the page record's name
// ---------------------------------------------------------------------------

const TLDRAW_PAGE: &str = "page";
const TLDRAW_TOOLS: &[ToolDescriptor] = &[ToolDescriptor {
    id: "tldraw",
    name: "Drawing",
}];

pub struct TldrawType {
    tag: DocTypeTag,
}

impl TldrawType {
    pub fn new() -> Self {
        Self {
            tag: DocTypeTag::legacy(),
        }
    }
}

impl Default for TldrawType {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocType for TldrawType {
    fn tag(&self) -> &DocTypeTag {
        &self.tag
    }

    fn initial_title(&self) -> &str {
        "Untitled drawing"
    }

    fn init(&self, txn: &mut TransactionMut<'_>) {
        write_map_string(txn, TLDRAW_PAGE, "name", self.initial_title());
    }

    async fn title(&self, doc: &Doc) -> Option<String> {
        read_map_string(doc, TLDRAW_PAGE, "name")
    }

    fn set_title(&self, txn: &mut TransactionMut<'_>, title: &str) {
        write_map_string(txn, TLDRAW_PAGE, "name", title);
    }

    fn tools(&self) -> &[ToolDescriptor] {
        TLDRAW_TOOLS
    }
}

// ---------------------------------------------------------------------------
// Datagrid: spreadsheet with a title in its metadata map
// ---------------------------------------------------------------------------

const DATAGRID_META: &str = "meta";
const DATAGRID_TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        id: "datagrid",
        name: "Spreadsheet",
    },
    ToolDescriptor {
        id: "datagrid-chart",
        name: "Chart",
    },
];

pub struct DatagridType {
    tag: DocTypeTag,
}

impl DatagridType {
    pub fn new() -> Self {
        Self {
            tag: DocTypeTag("datagrid".to_string()),
        }
    }
}

impl Default for DatagridType {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocType for DatagridType {
    fn tag(&self) -> &DocTypeTag {
        &self.tag
    }

    fn initial_title(&self) -> &str {
        "Untitled spreadsheet"
    }

    fn init(&self, txn: &mut TransactionMut<'_>) {
        write_map_string(txn, DATAGRID_META, "title", self.initial_title());
        txn.get_or_insert_array("rows");
    }

    async fn title(&self, doc: &Doc) -> Option<String> {
        read_map_string(doc, DATAGRID_META, "title")
    }

    fn set_title(&self, txn: &mut TransactionMut<'_>, title: &str) {
        write_map_string(txn, DATAGRID_META, "title", title);
    }

    fn tools(&self) -> &[ToolDescriptor] {
        DATAGRID_TOOLS
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn init_doc(doc_type: &dyn DocType) -> Doc {
        let doc = Doc::new();
        {
            let mut txn = doc.transact_mut();
            doc_type.init(&mut txn);
        }
        doc
    }

    fn retitle(doc: &Doc, doc_type: &dyn DocType, title: &str) {
        let mut txn = doc.transact_mut();
        doc_type.set_title(&mut txn, title);
    }

    fn essay_contents(doc: &Doc) -> String {
        let txn = doc.transact();
        txn.get_text(ESSAY_CONTENT)
            .map(|t| t.get_string(&txn))
            .unwrap_or_default()
    }

    // === tag tests ===

    #[test]
    fn tag_accepts_lowercase_names() {
        assert!(DocTypeTag::new("essay").is_ok());
        assert!(DocTypeTag::new("data-grid2").is_ok());
    }

    #[test]
    fn tag_rejects_uppercase_and_empty() {
        assert!(DocTypeTag::new("Essay").is_err());
        assert!(DocTypeTag::new("").is_err());
    }

    // === registry tests ===

    #[test]
    fn builtin_registry_has_three_types() {
        let registry = DocTypeRegistry::with_builtin();
        let tags: Vec<&str> = registry.tags().collect();
        assert_eq!(tags, vec!["datagrid", "essay", "tldraw"]);
    }

    #[test]
    fn legacy_type_is_registered() {
        let registry = DocTypeRegistry::with_builtin();
        assert!(registry.contains(LEGACY_DOC_TYPE));
    }

    #[test]
    fn tools_for_unknown_tag_is_empty() {
        let registry = DocTypeRegistry::with_builtin();
        assert!(registry.tools_for("kanban").is_empty());
        assert_eq!(registry.tools_for("datagrid")[0].id, "datagrid");
    }

    // === essay tests ===

    #[test]
    fn essay_title_uses_first_heading() {
        let md = "intro\n# Photosynthesis\n\n# Second";
        assert_eq!(essay_title_from_markdown(md), "Photosynthesis");
    }

    #[test]
    fn essay_title_ignores_subheadings() {
        assert_eq!(essay_title_from_markdown("## Not this\nbody"), "Untitled");
    }

    #[test]
    fn essay_title_skips_blank_heading() {
        assert_eq!(essay_title_from_markdown("#  \n# Real"), "Real");
        assert_eq!(essay_title_from_markdown("# \nbody"), "Untitled");
    }

    #[tokio::test]
    async fn essay_init_produces_initial_title() {
        let essay = EssayType::new();
        let doc = init_doc(&essay);
        assert_eq!(essay.title(&doc).await.as_deref(), Some(essay.initial_title()));
    }

    #[tokio::test]
    async fn essay_without_content_has_no_title() {
        let essay = EssayType::new();
        assert_eq!(essay.title(&Doc::new()).await, None);
    }

    #[tokio::test]
    async fn essay_set_title_replaces_heading_and_keeps_body() {
        let essay = EssayType::new();
        let doc = init_doc(&essay);
        {
            let mut txn = doc.transact_mut();
            let text = txn.get_or_insert_text(ESSAY_CONTENT);
            let len = text.len(&txn);
            text.insert(&mut txn, len, "Body text");
        }
        retitle(&doc, &essay, "Café notes");
        assert_eq!(essay_contents(&doc), "# Café notes\n\nBody text");
        assert_eq!(essay.title(&doc).await.as_deref(), Some("Café notes"));
    }

    #[tokio::test]
    async fn essay_set_title_prepends_when_no_heading() {
        let essay = EssayType::new();
        let doc = Doc::new();
        {
            let mut txn = doc.transact_mut();
            let text = txn.get_or_insert_text(ESSAY_CONTENT);
            text.insert(&mut txn, 0, "just prose");
        }
        retitle(&doc, &essay, "Found title");
        assert_eq!(essay_contents(&doc), "# Found title\n\njust prose");
    }

    // === map-titled types ===

    #[tokio::test]
    async fn tldraw_title_round_trips_through_page_name() {
        let tldraw = TldrawType::new();
        let doc = init_doc(&tldraw);
        assert_eq!(tldraw.title(&doc).await.as_deref(), Some("Untitled drawing"));
        retitle(&doc, &tldraw, "Floor plan");
        assert_eq!(tldraw.title(&doc).await.as_deref(), Some("Floor plan"));
    }

    #[tokio::test]
    async fn datagrid_title_lives_in_meta() {
        let grid = DatagridType::new();
        let doc = init_doc(&grid);
        assert_eq!(
            read_map_string(&doc, DATAGRID_META, "title").as_deref(),
            Some("Untitled spreadsheet")
        );
        assert_eq!(grid.tools().len(), 2);
    }
}
