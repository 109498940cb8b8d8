use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;
use serde::Serialize;

use sqlflow::query_ast::FlowError;
use sqlflow::{FlowConfig, init_logging};

#[derive(Parser, Debug)]
#[command(name = "sqlflow", version, about = "Split SQL scripts and trace SELECT execution order")]
struct Cli {
    /// Database to read rows from (overrides SQLFLOW_DATABASE_URL / DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Pool size for the database connection
    #[arg(long, global = true)]
    max_connections: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a script into statements and classify each one
    Split { input: String },
    /// Show the logical execution steps of a SELECT
    Steps { input: String },
    /// Parse a CREATE TABLE statement into its column definitions
    Schema { input: String },
    /// Print the canonical SELECT execution order
    Catalog,
    /// Replay a SELECT step by step against the database
    Visualize { input: String },
    /// Execute every statement of a script in order
    Run { input: String },
}

/// `-` reads stdin, an existing path reads the file, anything else is SQL text.
fn read_input(input: &str) -> Result<String, FlowError> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| FlowError::Config(format!("failed to read stdin: {e}")))?;
        return Ok(buf);
    }
    let path = Path::new(input);
    if path.is_file() {
        debug!("reading SQL from {}", path.display());
        return std::fs::read_to_string(path)
            .map_err(|e| FlowError::Config(format!("failed to read {}: {e}", path.display())));
    }
    Ok(input.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), FlowError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| FlowError::Config(format!("failed to encode output: {e}")))?;
    println!("{out}");
    Ok(())
}

async fn run(cli: Cli, mut config: FlowConfig) -> Result<(), FlowError> {
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(n) = cli.max_connections.filter(|n| *n > 0) {
        config.max_connections = n;
    }

    match cli.command {
        Command::Split { input } => print_json(&sqlflow::split_and_classify(&read_input(&input)?)),
        Command::Steps { input } => {
            print_json(&sqlflow::parse_execution_order(&read_input(&input)?)?)
        }
        Command::Schema { input } => print_json(&sqlflow::parse_create_table(&read_input(&input)?)?),
        Command::Catalog => print_json(&sqlflow::execution_catalog()),
        Command::Visualize { input } => {
            let sql = read_input(&input)?;
            let source =
                sqlflow::open_source(config.require_database_url()?, config.max_connections).await?;
            print_json(&sqlflow::visualize(&sql, source.as_ref()).await?)
        }
        Command::Run { input } => {
            let script = read_input(&input)?;
            let source =
                sqlflow::open_source(config.require_database_url()?, config.max_connections).await?;
            print_json(&sqlflow::run_script(&script, source.as_ref()).await?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = FlowConfig::from_env();
    init_logging(&config.log_level);
    let cli = Cli::parse();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match serde_json::to_string_pretty(&err) {
                Ok(body) => eprintln!("{body}"),
                Err(_) => eprintln!("{}: {}", err.code(), err),
            }
            ExitCode::FAILURE
        }
    }
}
