//! Apply command
//!
//! Reads a JSON-lines batch, matches every table it touches against the
//! store, and reports which columns survived.
//!
//! # Usage
//!
//! ```bash
//! tabula apply --input metrics.jsonl
//! cat metrics.jsonl | tabula apply --input - --rows
//! ```
//!
//! Each line is one metric:
//!
//! ```json
//! {"name":"cpu","tags":{"host":"a"},"fields":{"usage":0.5},"timestamp":"2024-01-01T00:00:00Z"}
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tabula_config::Config;
use tabula_schema::{
    MatchOutcome, Metric, SchemaOptions, TableManager, TableSource, derive_table_sources,
};
use tabula_store::{Store, TursoStore};
use tracing::{error, info, warn};

/// Base delay before retrying a temporary failure (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Apply command arguments
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// JSON-lines file of metrics ("-" reads stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Retries per table for temporary store failures
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Print the rows that would be written
    #[arg(long)]
    pub rows: bool,
}

/// Run the apply command
pub async fn run(args: ApplyArgs, config: &Config) -> Result<()> {
    let metrics = read_metrics(&args.input)?;
    info!(metrics = metrics.len(), input = %args.input.display(), "read batch");

    let options = SchemaOptions::from_config(&config.schema)
        .context("invalid [schema] configuration")?
        .with_statement_timeout(config.store.statement_timeout);
    let manager = TableManager::new(options);

    let store = TursoStore::open(&config.store.path)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.path))?;

    let mut sources = derive_table_sources(manager.options(), metrics);
    let total = sources.len();
    let mut failed = 0;

    for source in sources.values_mut() {
        match match_with_retry(&manager, &store, source, args.retries).await {
            Ok(outcome) => print_outcome(source, &outcome, args.rows),
            Err(e) => {
                error!(table = %source.name(), error = %e, "failed to match table");
                println!("{}: failed: {}", source.name(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} tables failed", failed, total);
    }
    Ok(())
}

/// Match one source, retrying temporary failures with exponential backoff
pub async fn match_with_retry(
    manager: &TableManager,
    store: &dyn Store,
    source: &mut TableSource,
    retries: u32,
) -> tabula_schema::Result<MatchOutcome> {
    let mut attempt = 0;
    loop {
        match manager.match_source(store, source).await {
            Err(e) if e.is_temporary() && attempt < retries => {
                let delay = RETRY_BASE_DELAY * (1 << attempt.min(6));
                warn!(
                    table = %source.name(),
                    attempt = attempt + 1,
                    max_retries = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "temporary failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Parse metrics from a JSON-lines file, or stdin for "-"
fn read_metrics(path: &Path) -> Result<Vec<Metric>> {
    let reader: Box<dyn Read> = if path == Path::new("-") {
        Box::new(std::io::stdin())
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Box::new(file)
    };

    parse_metrics(BufReader::new(reader))
}

fn parse_metrics(reader: impl BufRead) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let metric: Metric = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid metric", idx + 1))?;
        metrics.push(metric);
    }
    Ok(metrics)
}

fn print_outcome(source: &TableSource, outcome: &MatchOutcome, rows: bool) {
    println!(
        "{}: {} records, columns: {}",
        source.name(),
        source.record_count(),
        source.column_names().join(", ")
    );

    if source.options().tags_as_foreign_keys {
        let tag_table = source.tag_table();
        println!(
            "{}: {} tag sets, columns: {}",
            tag_table.name(),
            tag_table.rows().len(),
            tag_table.column_names().join(", ")
        );
    }

    for col in &outcome.tag_table_missing {
        println!("  missing tag column {} ({}), records dropped", col.name, col.data_type);
    }
    for col in &outcome.metric_table_missing {
        println!("  missing column {} ({}), omitted", col.name, col.data_type);
    }

    if rows {
        for row in source.rows() {
            println!("  {:?}", row);
        }
    }
}

#[cfg(test)]
#[path = "apply_test.rs"]
mod tests;
