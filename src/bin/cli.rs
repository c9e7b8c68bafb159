//! shorthand CLI - fetch Shorthand stories into public file storage
//!
//! # Examples
//!
//! ```bash
//! # Check the configured credentials
//! shorthand --config site.toml profile
//!
//! # List story ids
//! shorthand --config site.toml stories --ids
//!
//! # Download and unpack story "abc" for node 42
//! shorthand --config site.toml copy 42 abc
//!
//! # Look inside a bundle without extracting it
//! shorthand inspect /tmp/story.zip
//!
//! # Generate shell completions
//! shorthand --completions bash > ~/.bash_completion.d/shorthand
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use shorthand_sync::{CopyError, EntryKind, Error, Settings, ShorthandClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shorthand",
    about = "Fetch Shorthand stories and unpack them into public file storage",
    version,
    after_help = "EXAMPLES:
    shorthand --config site.toml profile
    shorthand --config site.toml stories --ids
    shorthand --config site.toml copy 42 abc
    shorthand inspect story.zip"
)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, env = "SHORTHAND_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Generate shell completions for the specified shell
    #[arg(long, value_enum)]
    completions: Option<Shell>,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - log each request
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the profile for the configured account
    Profile,
    /// List the stories of the configured account
    Stories {
        /// Print one story id per line instead of JSON
        #[arg(long)]
        ids: bool,
    },
    /// Download a story and unpack it under shorthand/<NODE_ID>/<STORY_ID>
    Copy { node_id: String, story_id: String },
    /// List the entries of a story bundle without extracting it
    Inspect { archive: PathBuf },
}

enum Failure {
    Lib(Error),
    Copy(CopyError),
    Message(String),
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Self::Lib(e)
    }
}

impl From<CopyError> for Failure {
    fn from(e: CopyError) -> Self {
        Self::Copy(e)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "shorthand", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("Error: {}", format_failure(&failure));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "shorthand_sync=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Failure> {
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return Err(Failure::Message("no command given".to_string()));
    };

    if let Command::Inspect { archive } = &command {
        return inspect(archive, cli.quiet);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let client = ShorthandClient::from_settings(settings)?;

    match command {
        Command::Profile => {
            let profile = client.profile_from_config()?;
            if profile.is_empty() {
                return Err(Failure::Message(
                    "no profile returned; check user_id and token".to_string(),
                ));
            }
            println!("{}", to_json(&profile)?);
        }
        Command::Stories { ids } => {
            let stories = client.stories();
            if ids {
                for id in stories.iter().filter_map(|s| s.id()) {
                    println!("{}", id);
                }
            } else {
                println!("{}", to_json(&stories)?);
            }
        }
        Command::Copy { node_id, story_id } => match client.copy_story(&node_id, &story_id)? {
            Some(copy) => {
                if !cli.quiet {
                    println!(
                        "Extracted {} files ({} bytes)",
                        copy.report.files_extracted, copy.report.bytes_written
                    );
                }
                println!("path: {}", copy.path.display());
                println!("url: {}", copy.url);
            }
            None => {
                return Err(Failure::Message(
                    "Shorthand credentials are not configured".to_string(),
                ));
            }
        },
        Command::Inspect { .. } => {}
    }
    Ok(())
}

fn inspect(archive: &Path, quiet: bool) -> Result<(), Failure> {
    let entries = shorthand_sync::list_entries(archive)?;

    if !quiet {
        println!("{} entries in {}:", entries.len(), archive.display());
        println!();
    }
    let mut total = 0u64;
    for entry in &entries {
        let suffix = match entry.kind {
            EntryKind::File => "",
            EntryKind::Directory => "/",
            EntryKind::Symlink => " -> [symlink]",
        };
        println!("{:>10}  {}{}", entry.size, entry.name.trim_end_matches('/'), suffix);
        total += entry.size;
    }
    if !quiet {
        println!();
        println!("Total: {} entries, {} bytes", entries.len(), total);
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, Failure> {
    serde_json::to_string_pretty(value).map_err(|e| Failure::Message(e.to_string()))
}

fn format_failure(failure: &Failure) -> String {
    match failure {
        Failure::Copy(CopyError::Download {
            error, response, ..
        }) => match response {
            Some(status) => format!("download failed (HTTP {}): {}", status, error),
            None => format!("download failed: {}", error),
        },
        Failure::Copy(e) => format!("{} failed: {}", e.stage(), e),
        Failure::Lib(Error::Transport { url, detail }) => {
            format!("could not reach {}: {}", url, detail)
        }
        Failure::Lib(e) => e.to_string(),
        Failure::Message(m) => m.clone(),
    }
}
