use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artwork_provider::config::{AppConfig, CliConfig, FileConfig, LoggingLevel};
use artwork_provider::provider::{
    table_for, ArtworkProvider, ContentValues, Filter, ProviderOperation, QueryArgs,
    ResourceAddress, SortOrder,
};
use artwork_provider::ChangeEvent;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(name = "provider-cli", about = "Inspect and edit the artwork provider databases")]
struct CliArgs {
    /// Directory holding provider.db and preferences.db.
    #[clap(long, value_parser = parse_path, global = true)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long, value_parser = parse_path, global = true)]
    pub config: Option<PathBuf>,

    /// Capacity of the change notification channel.
    #[clap(long, global = true)]
    pub notification_capacity: Option<usize>,

    #[clap(long, default_value = "info", global = true)]
    pub logging_level: LoggingLevel,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rows at an address as JSON.
    Query {
        address: String,
        /// Comma separated list of columns to return.
        #[clap(long, value_delimiter = ',')]
        projection: Option<Vec<String>>,
        /// column=value equality predicate, may be repeated.
        #[clap(long = "where")]
        predicates: Vec<String>,
        /// Sort order, e.g. "is_selected DESC, id".
        #[clap(long)]
        sort: Option<String>,
    },
    /// Insert a row from column=value pairs.
    Insert { address: String, values: Vec<String> },
    /// Update rows from column=value pairs.
    Update {
        address: String,
        values: Vec<String>,
        #[clap(long = "where")]
        predicates: Vec<String>,
    },
    /// Delete rows.
    Delete {
        address: String,
        #[clap(long = "where")]
        predicates: Vec<String>,
    },
    /// Print the content kind of an address.
    Type { address: String },
    /// Apply a JSON list of operations atomically.
    Apply {
        #[clap(value_parser = parse_path)]
        operations_file: PathBuf,
    },
    /// Record the file holding the current artwork image.
    SaveLocation {
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },
    /// Copy the current artwork image to stdout.
    Cat,
}

fn address_table(address: &str) -> Result<&'static artwork_provider::sqlite_persistence::Table> {
    let address = ResourceAddress::parse(address)?;
    Ok(table_for(address.relation()))
}

fn parse_values(address: &str, assignments: &[String]) -> Result<ContentValues> {
    ContentValues::parse_assignments(address_table(address)?, assignments)
        .map_err(|e| anyhow::anyhow!("Invalid value: {}", e))
}

fn parse_filter(address: &str, predicates: &[String]) -> Result<Filter> {
    let values = ContentValues::parse_assignments(address_table(address)?, predicates)
        .map_err(|e| anyhow::anyhow!("Invalid --where: {}", e))?;
    Ok(values
        .iter()
        .fold(Filter::All, |filter, (column, value)| {
            filter.and(Filter::eq(column, value.clone()))
        }))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn report_events(rx: &mut broadcast::Receiver<ChangeEvent>) -> Result<()> {
    while let Ok(event) = rx.try_recv() {
        eprintln!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn run(provider: &ArtworkProvider, command: Command) -> Result<()> {
    match command {
        Command::Query {
            address,
            projection,
            predicates,
            sort,
        } => {
            let mut args = QueryArgs::new().filter(parse_filter(&address, &predicates)?);
            if let Some(projection) = projection {
                args = args.projection(projection);
            }
            if let Some(sort) = sort {
                args = args.sort(
                    SortOrder::parse(&sort).map_err(|e| anyhow::anyhow!("Invalid --sort: {}", e))?,
                );
            }
            let cursor = provider.query(&address, args)?;
            print_json(&serde_json::to_value(cursor.rows())?)?;
        }
        Command::Insert { address, values } => {
            let values = parse_values(&address, &values)?;
            let inserted = provider.insert(&address, &values)?;
            print_json(&json!({ "address": inserted }))?;
        }
        Command::Update {
            address,
            values,
            predicates,
        } => {
            let values = parse_values(&address, &values)?;
            let filter = parse_filter(&address, &predicates)?;
            let count = provider.update(&address, &values, &filter)?;
            print_json(&json!({ "count": count }))?;
        }
        Command::Delete {
            address,
            predicates,
        } => {
            let filter = parse_filter(&address, &predicates)?;
            let count = provider.delete(&address, &filter)?;
            print_json(&json!({ "count": count }))?;
        }
        Command::Type { address } => {
            println!("{}", provider.get_type(&address)?);
        }
        Command::Apply { operations_file } => {
            let content = std::fs::read_to_string(&operations_file)
                .with_context(|| format!("Failed to read {:?}", operations_file))?;
            let operations: Vec<ProviderOperation> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse operations in {:?}", operations_file))?;
            debug!("Applying {} operations", operations.len());
            let results = provider.apply_batch(&operations)?;
            print_json(&serde_json::to_value(results)?)?;
        }
        Command::SaveLocation { path } => {
            if !provider.record_current_artwork_payload_location(&path) {
                bail!("Could not record {:?} as the current artwork", path);
            }
        }
        Command::Cat => {
            let mut file = provider.open_current_artwork_payload("/artwork", "r")?;
            let mut stdout = std::io::stdout().lock();
            std::io::copy(&mut file, &mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        notification_capacity: cli_args.notification_capacity,
        logging_level: cli_args.logging_level,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let default_level: LevelFilter = config
        .logging_level
        .as_directive()
        .parse()
        .context("Invalid logging level")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    let provider = ArtworkProvider::open(&config)?;
    let mut events = provider.subscribe();
    let result = run(&provider, cli_args.command);
    report_events(&mut events)?;
    result
}
