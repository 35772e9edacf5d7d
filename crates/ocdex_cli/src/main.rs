mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use ocdex_core::config;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ocdex")]
#[command(about = "Character registry bot for Pokémon role-play servers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory for daily rolling JSON log files, in addition to stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve slash commands
    Run,
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Look things up in the bundled catalog
    Catalog {
        #[command(subcommand)]
        cmd: CatalogCommands,
    },
    /// Parse a character sheet file and report what it resolves to
    Sheet {
        /// Plain text sheet, one `Key: value` per line
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Save current configuration to file
    Save {
        /// Path to save configuration
        #[arg(default_value = "ocdex.toml")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Entry {
    Species,
    Ability,
    Move,
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Fuzzy search one kind of entry
    Search {
        #[arg(value_enum)]
        kind: Entry,
        query: String,
        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .with_syntax_highlighting(miette::highlighters::SyntectHighlighter::default())
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = if cli.debug {
        EnvFilter::new("ocdex_core=debug,ocdex_discord=debug,ocdex_cli=debug,warn")
    } else {
        // Show info level for ocdex crates, warn for everything else
        EnvFilter::new("ocdex_core=info,ocdex_discord=info,ocdex_cli=info,warn")
    };

    let stderr = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .with_writer(std::io::stderr)
        .compact();

    // Keep the guard alive so buffered lines are flushed on exit
    let (file, _guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ocdex.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_timer(fmt::time::LocalTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        info!("Loading config from standard locations");
        config::load_config_from_standard_locations().await?
    }
    .with_env();

    tracing::debug!("Using database config: {:?}", config.database);

    match &cli.command {
        Commands::Run => {
            println!("{}", "Starting ocdex...".bright_green());
            ocdex_discord::run(config).await?;
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config).await?,
            ConfigCommands::Save { path } => commands::config::save(&config, path).await?,
        },
        Commands::Catalog { cmd } => match cmd {
            CatalogCommands::Search { kind, query, limit } => {
                commands::catalog::search(*kind, query, *limit)?
            }
        },
        Commands::Sheet { path } => commands::sheet::check(path).await?,
    }

    Ok(())
}
