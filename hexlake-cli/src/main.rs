//! hexlake CLI - load a Parquet or CSV dataset and query it interactively

use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, Color,
    ContentArrangement, Table,
};
use hexlake_core::types::rows_from_batches;
use hexlake_core::{Loader, LoaderConfig, Row, SourceFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod shell;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Parquet,
    Csv,
}

impl From<FormatArg> for SourceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Parquet => SourceFormat::Parquet,
            FormatArg::Csv => SourceFormat::Csv,
        }
    }
}

/// hexlake - in-process SQL over a single columnar dataset
#[derive(Parser, Debug)]
#[command(name = "hexlake")]
#[command(about = "Load a Parquet or CSV file into an in-memory engine and query it", long_about = None)]
struct Args {
    /// Dataset URL or local path
    source: Option<String>,

    /// Relation the dataset is materialized as (defaults to the configured one)
    #[arg(short, long)]
    relation: Option<String>,

    /// Source format; inferred from the extension when omitted
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// SQL query to execute (if provided, runs in non-interactive mode)
    #[arg(short, long)]
    query: Option<String>,

    /// Print the rows of one year instead of running a query
    #[arg(short, long, conflicts_with = "query")]
    year: Option<i64>,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = LoaderConfig::load().context("failed to load configuration")?;
    init_tracing(&config, args.debug);

    let relation = args
        .relation
        .clone()
        .unwrap_or_else(|| config.default_relation.clone());
    let loader = Loader::new(config).context("failed to create loader")?;

    if let Some(source) = &args.source {
        let format = args
            .format
            .map(SourceFormat::from)
            .unwrap_or_else(|| SourceFormat::infer(source));
        let start = Instant::now();
        let rows = loader
            .load_url_with_format(source, &relation, format)
            .await
            .with_context(|| format!("failed to load {source}"))?;
        eprintln!(
            "Loaded {rows} rows into \"{relation}\" in {:.3}s",
            start.elapsed().as_secs_f64()
        );
    } else {
        loader
            .initialize()
            .await
            .context("failed to initialize engine")?;
    }

    let outcome = if let Some(year) = args.year {
        let rows = loader
            .rows_for_year(year, &relation)
            .await
            .with_context(|| format!("failed to read rows for {year}"))?;
        print_rows(&rows, args.json)
    } else if let Some(query) = &args.query {
        execute_and_display(&loader, query, args.json).await
    } else {
        shell::run(&loader, relation, args.json, args.debug).await
    };

    loader.close().await.context("failed to close loader")?;
    info!("loader closed");
    outcome
}

fn init_tracing(config: &LoaderConfig, debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

pub(crate) async fn execute_and_display(loader: &Loader, query: &str, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = loader.query_batches(query).await?;
    let elapsed = start.elapsed();
    let rows = rows_from_batches(&result.batches)?;

    if json {
        return print_rows(&rows, true);
    }

    if rows.is_empty() {
        println!("(No rows returned)");
    } else {
        let columns: Vec<String> = result
            .schema
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        println!("{}", render_table(&columns, &rows));
    }

    println!(
        "{} row{} in {:.3}s",
        result.total_rows,
        if result.total_rows == 1 { "" } else { "s" },
        elapsed.as_secs_f64()
    );
    Ok(())
}

pub(crate) fn print_rows(rows: &[Row], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if let Some(first) = rows.first() {
        println!("{}", render_table(first.columns(), rows));
        println!("{} row{}", rows.len(), if rows.len() == 1 { "" } else { "s" });
    } else {
        println!("(No rows returned)");
    }
    Ok(())
}

fn render_table(columns: &[String], rows: &[Row]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(columns.iter().map(|name| {
        Cell::new(name)
            .fg(Color::Cyan)
            .set_alignment(CellAlignment::Center)
    }));

    for row in rows {
        table.add_row(row.values().iter().map(|value| Cell::new(value.to_string())));
    }
    table
}
