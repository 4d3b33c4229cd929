mod commands;
mod config;
mod keys;
mod shell;

use clap::Parser;
use colored::Colorize;
use commands::Command;
use config::{FileConfig, Overrides, Settings};
use shell::{ConsoleNotifier, Shell};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docshelf", version)]
#[command(about = "Multi-document shell: pick, create and link documents by location fragment")]
struct Cli {
    /// TOML config file
    #[arg(long, env = "DOCSHELF_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Location fragment to open on start, e.g. "#docUrl=abc&docType=essay"
    #[arg(long, env = "DOCSHELF_HASH", value_name = "FRAGMENT")]
    hash: Option<String>,

    /// Type created by the Enter shortcut and by `new` without a type
    #[arg(long, env = "DOCSHELF_DEFAULT_TYPE", value_name = "TYPE")]
    default_type: Option<String>,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, env = "DOCSHELF_LOG", value_name = "FILTER")]
    log: Option<String>,

    /// Start with the sidebar hidden
    #[arg(long)]
    no_sidebar: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            default_doc_type: self.default_type.clone(),
            log_filter: self.log.clone(),
            initial_hash: self.hash.clone(),
            hide_sidebar: self.no_sidebar,
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(file, cli.overrides());
    init_tracing(&settings.log_filter);
    tracing::debug!("Settings: {:?}", settings);

    let mut shell = Shell::new(&settings, Arc::new(ConsoleNotifier))?;

    // The initial fragment is handled before the folder exists; attaching
    // the folder afterwards lists a linked document.
    shell.pump();
    let folder = shell.load_root_folder();
    tracing::info!("Root folder {:?} ready", folder.title().unwrap_or_default());

    let title_sync = tokio::spawn(shell.title_sync().run());

    println!(
        "{} {}",
        "docshelf".green().bold(),
        "ready. Type 'help' for commands.".dimmed()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => match commands::execute(&mut shell, &command) {
                Ok(output) => println!("{}", output),
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            },
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        }
        // Let title sync observe the command's writes.
        tokio::task::yield_now().await;
    }

    // Dropping the shell closes the selection channel, which stops title sync.
    drop(shell);
    title_sync.await?;
    Ok(())
}
