use std::error::Error;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use mysql_bounded_io::prelude::*;
use serde_json::Value as JsonValue;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "mysql-bounded-io", version, about = "Estimate, split, read and load MySQL data")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Maximum log level written to stderr.
    #[arg(long, default_value_t = Level::INFO, global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    #[arg(long, default_value = "localhost")]
    host: String,
    #[arg(long, default_value_t = mysql_bounded_io::config::DEFAULT_PORT)]
    port: u16,
    #[arg(long)]
    database: String,
    #[arg(long)]
    user: String,
    #[arg(long, env = "MYSQL_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,
}

impl ConnectionArgs {
    fn config(&self) -> MysqlConfig {
        MysqlConfig::new(&self.host, &self.database, &self.user, &self.password).with_port(self.port)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the planner's rough row count for a query.
    Estimate {
        #[arg(long)]
        query: String,
    },
    /// Print the bundles a query would be split into, one JSON object per line.
    Split {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 1)]
        desired_bundle_size: u64,
    },
    /// Read one offset range of a query as JSON lines.
    Read {
        #[arg(long)]
        query: String,
        #[arg(long)]
        start: Option<u64>,
        #[arg(long)]
        stop: Option<u64>,
        #[arg(long, value_enum, default_value_t = OffsetStrategy::SqlWindow)]
        offset_strategy: OffsetStrategy,
    },
    /// Load JSON object lines from stdin into a table.
    Load {
        #[arg(long)]
        table: String,
        #[arg(long, default_value_t = mysql_bounded_io::config::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        #[arg(long)]
        upsert: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(cli.log_level)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let client = MysqlClient::mysql(cli.connection.config());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Estimate { query } => {
            let total = client.rough_counts_estimator(&query)?;
            writeln!(out, "{total}")?;
        }
        Command::Split {
            query,
            desired_bundle_size,
        } => {
            let source = MysqlSource::new(client, ReadOptions::new(query))?;
            for bundle in source.split(desired_bundle_size, None, None)? {
                serde_json::to_writer(&mut out, &bundle)?;
                writeln!(out)?;
            }
        }
        Command::Read {
            query,
            start,
            stop,
            offset_strategy,
        } => {
            let options = ReadOptions::new(query).with_offset_strategy(offset_strategy);
            let source = MysqlSource::new(client, options)?;
            let tracker = Arc::new(source.get_range_tracker(start, stop));
            for row in source.read(tracker)? {
                serde_json::to_writer(&mut out, &row?)?;
                writeln!(out)?;
            }
        }
        Command::Load {
            table,
            batch_size,
            upsert,
        } => {
            let options = WriteOptions::new(table)
                .with_batch_size(batch_size)
                .with_upsert(upsert);
            let mut writer = BatchWriter::open(&client, options)?;
            for line in io::stdin().lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                writer.write(&json_row(&line)?)?;
            }
            let written = writer.finish()?;
            tracing::info!(rows = written, "load finished");
        }
    }
    Ok(())
}

/// Parse one JSON object line into a row, keeping the keys in input order.
fn json_row(line: &str) -> Result<Row, Box<dyn Error>> {
    match serde_json::from_str::<JsonValue>(line)? {
        JsonValue::Object(map) => Ok(Row::from_pairs(
            map.iter().map(|(k, v)| (k.clone(), RowValues::from_json(v))),
        )),
        other => Err(format!("expected a JSON object per line, got {other}").into()),
    }
}
