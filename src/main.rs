//! tablepipe - Transform a JSON table through a record pipeline

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tablepipe::input::{parse_literal, read_table, read_table_file};
use tablepipe::{
    AggregateFunc, Content, ExecutionContext, GroupBy, PipelineOptions, Record, SortKey, Value,
};

/// Filter, group, sort and limit a JSON array of objects
#[derive(Parser, Debug)]
#[command(name = "tablepipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file to read (stdin when omitted or "-")
    input: Option<PathBuf>,

    /// Column order of the input table (comma-separated); sorted by name when omitted
    #[arg(short, long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Keep records where COLUMN equals VALUE (repeatable)
    #[arg(short = 'w', long = "where", value_name = "COLUMN=VALUE", value_parser = parse_condition)]
    conditions: Vec<Condition>,

    /// Group by these columns (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    group_by: Vec<String>,

    /// Aggregate per group, e.g. total=sum:amount or n=count (repeatable)
    #[arg(short, long = "agg", value_name = "NAME=FUNC[:COLUMN]", value_parser = parse_aggregate)]
    aggregates: Vec<(String, AggregateFunc)>,

    /// Sort key, e.g. salary:desc (repeatable; later keys break ties)
    #[arg(short, long = "sort", value_name = "COLUMN[:asc|desc]")]
    sort: Vec<SortKey>,

    /// Keep only the first N records
    #[arg(short, long, allow_hyphen_values = true)]
    limit: Option<i64>,

    /// Abort when the pipeline runs longer than this (0 disables)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum number of pipeline operations (0 disables)
    #[arg(long)]
    max_operations: Option<usize>,

    /// Run operations exactly in the order given
    #[arg(long)]
    no_optimize: bool,

    /// Print execution statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Log each operation to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Column, parsed literal and the literal's raw text
type Condition = (String, Value, String);

fn parse_condition(s: &str) -> Result<Condition, String> {
    match s.split_once('=') {
        Some((column, value)) if !column.is_empty() => {
            Ok((column.to_string(), parse_literal(value), value.to_string()))
        }
        _ => Err(format!("Expected COLUMN=VALUE, got: {}", s)),
    }
}

fn parse_aggregate(s: &str) -> Result<(String, AggregateFunc), String> {
    match s.split_once('=') {
        Some((name, func)) if !name.is_empty() => Ok((name.to_string(), func.parse()?)),
        _ => Err(format!("Expected NAME=FUNC[:COLUMN], got: {}", s)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "tablepipe=debug" } else { "tablepipe=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let table = match cli.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => read_table_file(path, &cli.columns)
            .with_context(|| format!("Failed to read input: {}", path.display()))?,
        _ => read_table(io::stdin().lock(), &cli.columns).context("Failed to read stdin")?,
    };

    let mut options = PipelineOptions::default().with_optimize(!cli.no_optimize);
    if let Some(ms) = cli.timeout_ms {
        options = options.with_max_execution_time(Duration::from_millis(ms));
    }
    if let Some(max) = cli.max_operations {
        options = options.with_max_operations(max);
    }

    let mut pipeline = table.pipeline().with_options(options);
    for (column, expected, text) in cli.conditions {
        pipeline = pipeline.filter(move |r: &Record| {
            let value = r.value(&column);
            value == &expected || value.as_str() == Some(text.as_str())
        });
    }
    if !cli.group_by.is_empty() {
        let group_by = cli
            .aggregates
            .into_iter()
            .fold(GroupBy::new(&cli.group_by), |g, (name, func)| g.aggregate(name, func));
        pipeline = pipeline.group_by(group_by);
    } else if !cli.aggregates.is_empty() {
        bail!("--agg requires --group-by");
    }
    if !cli.sort.is_empty() {
        pipeline = pipeline.sort(cli.sort);
    }
    if let Some(n) = cli.limit {
        pipeline = pipeline.limit(n);
    }

    let (result, stats) = pipeline
        .execute_with_stats(&ExecutionContext::new())
        .context("Pipeline failed")?;

    println!("{}", result.encode_text()?);
    if cli.stats {
        eprintln!("{}", serde_json::to_string(&stats)?);
    }
    Ok(())
}
