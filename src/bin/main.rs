use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tsugi::config::{self, HistorySettings};
use tsugi::recording::{Recording, RecordingReplayer};

/// Next-edit suggestion pipeline tools
#[derive(Parser)]
#[command(name = "tsugi")]
#[command(version)]
#[command(about = "Next-edit suggestion pipeline tools")]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/tsugi/tsugi.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON recording and print each document's edit history
    Replay {
        /// Path to the recording
        recording: PathBuf,

        /// Edits retained per document (overrides the settings file)
        #[arg(long)]
        max_history: Option<usize>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the default settings as TOML
    Init,
    /// Print where user settings are read from
    Path,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            recording,
            max_history,
        } => {
            let mut history = match config::load_settings(cli.config.as_deref()) {
                Ok(settings) => settings.history,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(max_history) = max_history {
                if max_history == 0 {
                    eprintln!("Error: --max-history must be at least 1");
                    std::process::exit(1);
                }
                history = HistorySettings {
                    max_history_size: max_history,
                    ..history
                };
            }
            if let Err(e) = replay(&recording, history) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Config {
            command: ConfigCommands::Init,
        } => {
            print!("{}", config::default_settings_toml());
        }
        Commands::Config {
            command: ConfigCommands::Path,
        } => match config::user_config_path() {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: Could not determine the user configuration directory.");
                std::process::exit(1);
            }
        },
    }
}

fn replay(path: &Path, settings: HistorySettings) -> tsugi::NesResult<()> {
    let recording = Recording::load(path)?;
    let mut replayer = RecordingReplayer::new(settings);
    replayer.replay(&recording)?;

    let history = replayer.history();
    for id in history.tracked_documents() {
        let entries = history.get_history(&id);
        println!("=== {} ({} edits)", id, entries.len());
        let rendered = history.render_history(&id);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
    }
    Ok(())
}
