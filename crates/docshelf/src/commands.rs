use crate::keys::{KeyChord, ShortcutAction};
use crate::shell::Shell;
use docshelf_core::{DocUrl, DocumentReference};

pub const HELP: &str = "\
commands:
  hash <fragment>      navigate to a location fragment (empty clears)
  select <id>|none     select a listed document
  new [type]           create a document (default type if omitted)
  delete <id>          remove a document from the folder
  key <chord>          press a shortcut, e.g. cmd+\\ or enter
  title <id> <text>    edit the title inside a document
  list                 show the folder
  export               print the folder as JSON
  types                show document types and their tools
  state                show selection, fragment and shell state
  help                 show this message
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hash(String),
    Select(Option<DocUrl>),
    New(Option<String>),
    Delete(DocUrl),
    Key(KeyChord),
    Title { url: DocUrl, text: String },
    List,
    Export,
    Types,
    State,
    Help,
    Quit,
}

fn parse_url(value: &str) -> Result<DocUrl, String> {
    DocUrl::new(value).map_err(|e| format!("Invalid document id {:?}: {}", value, e))
}

fn required<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str, String> {
    arg.filter(|a| !a.is_empty())
        .ok_or_else(|| format!("Missing argument. Usage: {}", usage))
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim())),
        None => (line, None),
    };

    let command = match name {
        "hash" => Command::Hash(rest.unwrap_or_default().to_string()),
        "select" => match required(rest, "select <id>|none")? {
            "none" => Command::Select(None),
            id => Command::Select(Some(parse_url(id)?)),
        },
        "new" => Command::New(rest.filter(|r| !r.is_empty()).map(str::to_string)),
        "delete" => Command::Delete(parse_url(required(rest, "delete <id>")?)?),
        "key" => {
            let chord = required(rest, "key <chord>")?;
            Command::Key(chord.parse::<KeyChord>().map_err(|e| e.to_string())?)
        }
        "title" => {
            let args = required(rest, "title <id> <text>")?;
            let (id, text) = args
                .split_once(char::is_whitespace)
                .ok_or_else(|| "Usage: title <id> <text>".to_string())?;
            Command::Title {
                url: parse_url(id)?,
                text: text.trim().to_string(),
            }
        }
        "list" | "ls" => Command::List,
        "export" => Command::Export,
        "types" => Command::Types,
        "state" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command: {}. Try 'help'.", other)),
    };
    Ok(Some(command))
}

/// Execute a command against the shell. Returns text to show the user.
pub fn execute(shell: &mut Shell, command: &Command) -> Result<String, String> {
    match command {
        Command::Hash(fragment) => {
            shell.navigate(fragment);
            Ok(describe_state(shell))
        }
        Command::Select(url) => {
            shell
                .controller_mut()
                .select_doc(url.as_ref())
                .map_err(|e| e.to_string())?;
            shell.pump();
            Ok(describe_state(shell))
        }
        Command::New(tag) => {
            let tag = tag.clone().unwrap_or_else(|| shell.default_doc_type().to_string());
            let doc_ref = shell.add_new_document(&tag).map_err(|e| e.to_string())?;
            Ok(format!("Created {} {}", doc_ref.doc_type, doc_ref.url))
        }
        Command::Delete(url) => {
            let neighbor = shell
                .controller_mut()
                .delete_from_root_folder(url)
                .map_err(|e| e.to_string())?;
            shell.pump();
            Ok(match neighbor {
                Some(next) => format!("Deleted {}, selected {}", url, next),
                None => format!("Deleted {}", url),
            })
        }
        Command::Key(chord) => {
            let action = shell.handle_key(chord).map_err(|e| e.to_string())?;
            Ok(match action {
                Some(ShortcutAction::ToggleSidebar) => format!(
                    "Sidebar {}",
                    if shell.sidebar_visible() { "shown" } else { "hidden" }
                ),
                Some(ShortcutAction::NewDocument) => describe_state(shell),
                None => format!("No shortcut for {}", chord),
            })
        }
        Command::Title { url, text } => set_title(shell, url, text),
        Command::List => list(shell),
        Command::Export => export(shell),
        Command::Types => Ok(list_types(shell)),
        Command::State => Ok(describe_state(shell)),
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok("Bye".to_string()),
    }
}

/// Write a title into the document itself. The folder entry catches up
/// through title sync.
fn set_title(shell: &mut Shell, url: &DocUrl, text: &str) -> Result<String, String> {
    let folder = shell
        .controller()
        .folder()
        .ok_or_else(|| "Root folder is still loading".to_string())?;
    let entry = folder
        .find(url)
        .ok_or_else(|| format!("Document not found in folder: {}", url))?;
    let doc_type = shell
        .registry()
        .get(entry.doc_type.as_str())
        .cloned()
        .ok_or_else(|| format!("No descriptor for type {}", entry.doc_type))?;
    shell
        .store()
        .change(url, |txn| doc_type.set_title(txn, text))
        .map_err(|e| e.to_string())?;
    Ok(format!("Title of {} set to {:?}", url, text))
}

fn folder_entries(shell: &Shell) -> Result<Vec<DocumentReference>, String> {
    shell
        .controller()
        .folder()
        .map(|folder| folder.entries())
        .ok_or_else(|| "Root folder is still loading".to_string())
}

fn list(shell: &Shell) -> Result<String, String> {
    let entries = folder_entries(shell)?;
    if entries.is_empty() {
        return Ok("Folder is empty".to_string());
    }
    let selection = shell.controller().selection();
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            let marker = if selection.url() == Some(&entry.url) { "*" } else { " " };
            format!("{} {:<22} {:<9} {}", marker, entry.url, entry.doc_type, entry.name)
        })
        .collect();
    Ok(lines.join("\n"))
}

fn export(shell: &Shell) -> Result<String, String> {
    let entries = folder_entries(shell)?;
    serde_json::to_string_pretty(&entries).map_err(|e| format!("Failed to serialize folder: {}", e))
}

fn list_types(shell: &Shell) -> String {
    let registry = shell.registry();
    registry
        .tags()
        .map(|tag| {
            let tools: Vec<&str> = registry.tools_for(tag).iter().map(|t| t.name).collect();
            format!("{:<9} {}", tag, tools.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_state(shell: &Shell) -> String {
    let controller = shell.controller();
    let selection = match controller.selection().url() {
        Some(url) => match controller.selected_entry() {
            Some(entry) => format!("{} ({}, {:?})", url, entry.doc_type, entry.name),
            None => url.to_string(),
        },
        None => "none".to_string(),
    };
    let tool = shell
        .active_tool()
        .map(|active| active.tool.name)
        .unwrap_or("none");
    format!(
        "selected: {}\nfragment: {:?}\ntool: {}\nsidebar: {}{}",
        selection,
        controller.location().fragment(),
        tool,
        if shell.sidebar_visible() { "shown" } else { "hidden" },
        if shell.is_loading() { "\nloading root folder" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use docshelf_core::notify::RecordingNotifier;
    use std::sync::Arc;

    fn shell() -> Shell {
        let mut shell = Shell::new(&Settings::default(), Arc::new(RecordingNotifier::new())).unwrap();
        shell.pump();
        shell.load_root_folder();
        shell
    }

    fn run(shell: &mut Shell, line: &str) -> Result<String, String> {
        let command = parse(line)?.expect("non-blank line");
        execute(shell, &command)
    }

    // === parse ===

    #[test]
    fn parse_blank_line_is_none() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn parse_commands_with_arguments() {
        assert_eq!(parse("select none"), Ok(Some(Command::Select(None))));
        assert_eq!(parse("new"), Ok(Some(Command::New(None))));
        assert_eq!(
            parse("new  tldraw "),
            Ok(Some(Command::New(Some("tldraw".to_string()))))
        );
        assert_eq!(parse("hash"), Ok(Some(Command::Hash(String::new()))));
        assert_eq!(
            parse("title abc My  title"),
            Ok(Some(Command::Title {
                url: DocUrl::new("abc").unwrap(),
                text: "My  title".to_string()
            }))
        );
    }

    #[test]
    fn parse_errors_are_messages() {
        assert!(parse("frobnicate").unwrap_err().contains("Unknown command"));
        assert!(parse("delete").unwrap_err().contains("Usage: delete"));
        assert!(parse("select bad/id").unwrap_err().contains("Invalid document id"));
        assert!(parse("title abc").unwrap_err().contains("Usage: title"));
        assert!(parse("key hyper+x").is_err());
    }

    // === execute ===

    #[test]
    fn new_then_list_marks_selection() {
        let mut shell = shell();
        let created = run(&mut shell, "new datagrid").unwrap();
        assert!(created.starts_with("Created datagrid "));

        let listing = run(&mut shell, "list").unwrap();
        assert!(listing.starts_with("* "));
        assert!(listing.contains("Untitled spreadsheet"));
    }

    #[test]
    fn new_with_unknown_type_is_error() {
        let mut shell = shell();
        let err = run(&mut shell, "new kanban").unwrap_err();
        assert!(err.contains("kanban"));
        assert_eq!(run(&mut shell, "list").unwrap(), "Folder is empty");
    }

    #[test]
    fn hash_with_legacy_id_rehydrates() {
        let mut shell = shell();
        let state = run(&mut shell, "hash #abc123xyz").unwrap();
        assert!(state.contains("selected: abc123xyz (tldraw, \"Unknown document\")"));
    }

    #[test]
    fn select_unknown_document_is_error() {
        let mut shell = shell();
        let err = run(&mut shell, "select missing-doc").unwrap_err();
        assert!(err.contains("missing-doc"));
    }

    #[test]
    fn delete_reports_neighbor() {
        let mut shell = shell();
        run(&mut shell, "new essay").unwrap();
        run(&mut shell, "new essay").unwrap();
        let entries = folder_entries(&shell).unwrap();
        let first = entries[0].url.clone();
        let second = entries[1].url.clone();

        let out = run(&mut shell, &format!("delete {}", first)).unwrap();
        assert_eq!(out, format!("Deleted {}, selected {}", first, second));
    }

    #[test]
    fn title_edits_document_content() {
        let mut shell = shell();
        run(&mut shell, "new tldraw").unwrap();
        let url = folder_entries(&shell).unwrap()[0].url.clone();

        run(&mut shell, &format!("title {} Floor plan", url)).unwrap();
        let handle = shell.store().get(&url).unwrap();
        let doc_type = shell.registry().get("tldraw").unwrap().clone();
        let title = block_on(doc_type.title(handle.doc()));
        assert_eq!(title.as_deref(), Some("Floor plan"));
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn export_is_json_array() {
        let mut shell = shell();
        run(&mut shell, "new essay").unwrap();
        let json: serde_json::Value = serde_json::from_str(&run(&mut shell, "export").unwrap()).unwrap();
        assert_eq!(json[0]["type"], "essay");
        assert_eq!(json[0]["name"], "Untitled");
    }

    #[test]
    fn key_toggles_sidebar() {
        let mut shell = shell();
        assert_eq!(run(&mut shell, "key cmd+\\").unwrap(), "Sidebar hidden");
        assert_eq!(run(&mut shell, "key x").unwrap(), "No shortcut for x");
    }
}
