use anyhow::{Context, Result};
use clap::Parser;
use hbnb::{logging, storage, Config, Console, StorageKind};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hbnb-console")]
#[command(version)]
#[command(about = "Line-oriented console for HBNB entities")]
#[command(long_about = r#"
Reads one command per line from stdin and runs it against the configured storage.

Examples:
  create State name="California"
  show State <id>
  all State
  update State <id> name "Nevada"
  State.count()
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Storage backend: file or db (overrides HBNB_TYPE_STORAGE)
    #[arg(short, long)]
    storage: Option<String>,

    /// JSON document for the file backend (overrides HBNB_FILE_PATH)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// SQLite database for the db backend (overrides HBNB_DB_NAME)
    #[arg(short, long)]
    database: Option<String>,

    /// Run these commands instead of reading stdin
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::from_env().context("Failed to read configuration")?;
    if let Some(kind) = &cli.storage {
        config.storage = kind.parse::<StorageKind>()?;
    }
    if let Some(path) = cli.file {
        config.file_path = path;
    }
    if let Some(name) = cli.database {
        config.db_name = name;
    }

    let store = storage::open(&config).context("Failed to open storage")?;
    let stdout = io::stdout();
    let mut console = Console::new(store, stdout.lock());

    if !cli.commands.is_empty() {
        for line in &cli.commands {
            if console.onecmd(line)? == hbnb::Flow::Exit {
                break;
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    console.run(stdin.lock(), interactive)?;

    Ok(())
}
