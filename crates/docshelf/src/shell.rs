use crate::config::Settings;
use crate::keys::{self, KeyChord, ShortcutAction};
use anyhow::bail;
use colored::Colorize;
use docshelf_core::doc_type::ToolDescriptor;
use docshelf_core::notify::Notifier;
use docshelf_core::{
    DocStore, DocTypeRegistry, DocTypeTag, DocumentReference, FolderCollection, SelectionController,
    SelectionError, TitleSync,
};
use std::sync::Arc;

/// Prints alerts inline with command output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!("{}", message);
        println!("{} {}", "alert:".yellow().bold(), message);
    }
}

/// The tool shown for the selected document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTool {
    pub doc_type: DocTypeTag,
    pub tool: ToolDescriptor,
}

/// Presentation state around the selection core: sidebar, active tool and
/// the loading gate while the root folder is not yet available.
pub struct Shell {
    registry: Arc<DocTypeRegistry>,
    store: Arc<DocStore>,
    controller: SelectionController,
    default_doc_type: String,
    folder_name: String,
    sidebar_visible: bool,
    active_tool: Option<ActiveTool>,
}

impl Shell {
    pub fn new(settings: &Settings, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let registry = Arc::new(DocTypeRegistry::with_builtin());
        if !registry.contains(&settings.default_doc_type) {
            bail!(
                "Default document type {:?} is not registered (known: {})",
                settings.default_doc_type,
                registry.tags().collect::<Vec<_>>().join(", ")
            );
        }
        let store = Arc::new(DocStore::new());
        let controller = SelectionController::new(
            registry.clone(),
            store.clone(),
            notifier,
            settings.initial_hash.as_str(),
        );
        Ok(Self {
            registry,
            store,
            controller,
            default_doc_type: settings.default_doc_type.clone(),
            folder_name: settings.folder_name.clone(),
            sidebar_visible: settings.sidebar_visible,
            active_tool: None,
        })
    }

    pub fn registry(&self) -> &Arc<DocTypeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<DocStore> {
        &self.store
    }

    pub fn controller(&self) -> &SelectionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SelectionController {
        &mut self.controller
    }

    pub fn is_loading(&self) -> bool {
        self.controller.folder().is_none()
    }

    pub fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    pub fn active_tool(&self) -> Option<&ActiveTool> {
        self.active_tool.as_ref()
    }

    pub fn default_doc_type(&self) -> &str {
        &self.default_doc_type
    }

    /// Create the root folder and open the loading gate.
    pub fn load_root_folder(&mut self) -> FolderCollection {
        let folder = FolderCollection::create(&self.store, &self.folder_name);
        self.controller.attach_folder(folder.clone());
        self.refresh_tool();
        folder
    }

    /// A title sync worker bound to this shell's selection and folder.
    pub fn title_sync(&self) -> TitleSync {
        TitleSync::new(
            self.registry.clone(),
            self.store.clone(),
            self.controller.subscribe(),
            self.controller.subscribe_folder(),
        )
    }

    /// Process pending navigation and bring the tool in line with the selection.
    pub fn pump(&mut self) {
        self.controller.pump();
        self.refresh_tool();
    }

    pub fn navigate(&mut self, fragment: &str) {
        self.controller.navigate(fragment);
        self.pump();
    }

    pub fn add_new_document(&mut self, tag: &str) -> Result<DocumentReference, SelectionError> {
        let doc_ref = self.controller.add_new_document(tag)?;
        self.pump();
        Ok(doc_ref)
    }

    /// Run the shortcut bound to `chord`. Shortcuts are inert while loading.
    pub fn handle_key(&mut self, chord: &KeyChord) -> Result<Option<ShortcutAction>, SelectionError> {
        if self.is_loading() {
            tracing::debug!("Ignoring {} while the root folder loads", chord);
            return Ok(None);
        }
        let has_selection = !self.controller.selection().is_empty();
        let Some(action) = keys::action_for(chord, has_selection) else {
            return Ok(None);
        };
        match action {
            ShortcutAction::ToggleSidebar => self.sidebar_visible = !self.sidebar_visible,
            ShortcutAction::NewDocument => {
                let tag = self.default_doc_type.clone();
                self.add_new_document(&tag)?;
            }
        }
        Ok(Some(action))
    }

    /// The active tool follows the selected entry's type. A type change picks
    /// that type's first tool; the same type keeps whatever tool was active.
    fn refresh_tool(&mut self) {
        let Some(entry) = self.controller.selected_entry() else {
            self.active_tool = None;
            return;
        };
        if let Some(active) = &self.active_tool {
            if active.doc_type == entry.doc_type {
                return;
            }
        }
        self.active_tool = self
            .registry
            .tools_for(entry.doc_type.as_str())
            .first()
            .map(|tool| ActiveTool {
                doc_type: entry.doc_type.clone(),
                tool: *tool,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_core::notify::RecordingNotifier;
    use docshelf_core::Selection;

    fn shell_with(settings: Settings) -> Shell {
        let mut shell = Shell::new(&settings, Arc::new(RecordingNotifier::new())).unwrap();
        shell.pump();
        shell
    }

    fn loaded_shell() -> Shell {
        let mut shell = shell_with(Settings::default());
        shell.load_root_folder();
        shell
    }

    fn chord(s: &str) -> KeyChord {
        s.parse().unwrap()
    }

    #[test]
    fn unregistered_default_type_is_rejected() {
        let settings = Settings {
            default_doc_type: "kanban".to_string(),
            ..Settings::default()
        };
        assert!(Shell::new(&settings, Arc::new(RecordingNotifier::new())).is_err());
    }

    #[test]
    fn shortcuts_wait_for_root_folder() {
        let mut shell = shell_with(Settings::default());
        assert!(shell.is_loading());
        assert_eq!(shell.handle_key(&chord("enter")).unwrap(), None);
        assert_eq!(shell.store().len(), 0);

        shell.load_root_folder();
        assert!(!shell.is_loading());
        assert_eq!(
            shell.handle_key(&chord("enter")).unwrap(),
            Some(ShortcutAction::NewDocument)
        );
    }

    #[test]
    fn enter_creates_default_type_and_selects_it() {
        let mut shell = loaded_shell();
        shell.handle_key(&chord("enter")).unwrap();

        let entry = shell.controller().selected_entry().expect("new doc selected");
        assert_eq!(entry.doc_type.as_str(), "essay");
        assert_eq!(entry.name, "Untitled");

        // With a selection, Enter belongs to the editor.
        assert_eq!(shell.handle_key(&chord("enter")).unwrap(), None);
        assert_eq!(shell.controller().folder().unwrap().len(), 1);
    }

    #[test]
    fn cmd_backslash_toggles_sidebar() {
        let mut shell = loaded_shell();
        assert!(shell.sidebar_visible());
        shell.handle_key(&chord("cmd+\\")).unwrap();
        assert!(!shell.sidebar_visible());
        shell.handle_key(&chord("ctrl+\\")).unwrap();
        assert!(shell.sidebar_visible());
    }

    #[test]
    fn tool_follows_selected_type() {
        let mut shell = loaded_shell();
        assert_eq!(shell.active_tool(), None);

        let grid = shell.add_new_document("datagrid").unwrap();
        let tool = shell.active_tool().expect("datagrid tool");
        assert_eq!(tool.tool.id, "datagrid");

        shell.add_new_document("tldraw").unwrap();
        assert_eq!(shell.active_tool().unwrap().doc_type.as_str(), "tldraw");

        shell.controller_mut().select_doc(Some(&grid.url)).unwrap();
        shell.pump();
        assert_eq!(shell.active_tool().unwrap().tool.id, "datagrid");

        shell.navigate("");
        assert_eq!(shell.controller().selection(), Selection::Empty);
        assert_eq!(shell.active_tool(), None);
    }

    #[test]
    fn linked_document_is_listed_once_folder_loads() {
        let settings = Settings {
            initial_hash: "#docUrl=shared-doc&docType=essay".to_string(),
            ..Settings::default()
        };
        let mut shell = shell_with(settings);
        assert!(shell.active_tool().is_none());

        let folder = shell.load_root_folder();
        assert_eq!(folder.entries()[0].name, "Unknown document");
        assert_eq!(shell.active_tool().unwrap().doc_type.as_str(), "essay");
    }
}
