use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_DOC_TYPE: &str = "essay";
pub const DEFAULT_LOG_FILTER: &str = "docshelf=info,docshelf_core=info";
pub const DEFAULT_FOLDER_NAME: &str = "Home";

/// Contents of the optional TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub default_doc_type: Option<String>,
    pub log_filter: Option<String>,
    pub sidebar_visible: Option<bool>,
    pub initial_hash: Option<String>,
    pub folder_name: Option<String>,
}

impl FileConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config at {:?}", path))
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub default_doc_type: Option<String>,
    pub log_filter: Option<String>,
    pub initial_hash: Option<String>,
    pub hide_sidebar: bool,
}

/// Effective settings: command line over config file over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub default_doc_type: String,
    pub log_filter: String,
    pub sidebar_visible: bool,
    pub initial_hash: String,
    pub folder_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(FileConfig::default(), Overrides::default())
    }
}

impl Settings {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Self {
        Self {
            default_doc_type: cli
                .default_doc_type
                .or(file.default_doc_type)
                .unwrap_or_else(|| DEFAULT_DOC_TYPE.to_string()),
            log_filter: cli
                .log_filter
                .or(file.log_filter)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            sidebar_visible: !cli.hide_sidebar && file.sidebar_visible.unwrap_or(true),
            initial_hash: cli.initial_hash.or(file.initial_hash).unwrap_or_default(),
            folder_name: file
                .folder_name
                .unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_config() {
        let settings = Settings::default();
        assert_eq!(settings.default_doc_type, "essay");
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert!(settings.sidebar_visible);
        assert_eq!(settings.initial_hash, "");
        assert_eq!(settings.folder_name, "Home");
    }

    #[test]
    fn file_values_override_defaults() {
        let file = FileConfig::from_toml_str(
            r#"
            default_doc_type = "tldraw"
            sidebar_visible = false
            folder_name = "Studio"
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Overrides::default());
        assert_eq!(settings.default_doc_type, "tldraw");
        assert!(!settings.sidebar_visible);
        assert_eq!(settings.folder_name, "Studio");
    }

    #[test]
    fn cli_values_override_file() {
        let file = FileConfig {
            default_doc_type: Some("tldraw".to_string()),
            initial_hash: Some("#from-file".to_string()),
            ..Default::default()
        };
        let cli = Overrides {
            default_doc_type: Some("datagrid".to_string()),
            initial_hash: Some("#docUrl=abc&docType=essay".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(file, cli);
        assert_eq!(settings.default_doc_type, "datagrid");
        assert_eq!(settings.initial_hash, "#docUrl=abc&docType=essay");
    }

    #[test]
    fn hide_sidebar_flag_wins() {
        let file = FileConfig {
            sidebar_visible: Some(true),
            ..Default::default()
        };
        let cli = Overrides {
            hide_sidebar: true,
            ..Default::default()
        };
        assert!(!Settings::resolve(file, cli).sidebar_visible);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml_str("default_type = \"essay\"").is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"debug\"").unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
