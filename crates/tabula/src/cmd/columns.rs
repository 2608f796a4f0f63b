//! Columns command
//!
//! Prints the live structure of one table as the store reports it.
//!
//! # Usage
//!
//! ```bash
//! tabula columns cpu
//! ```

use anyhow::{Context, Result};
use clap::Args;
use tabula_config::Config;
use tabula_store::{Store, TursoStore};

/// Columns command arguments
#[derive(Args, Debug)]
pub struct ColumnsArgs {
    /// Table name (without namespace; [schema] namespace applies)
    pub table: String,
}

/// Run the columns command
pub async fn run(args: ColumnsArgs, config: &Config) -> Result<()> {
    let store = TursoStore::open(&config.store.path)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.path))?;

    let Some(columns) = store
        .columns(&config.schema.namespace, &args.table)
        .await
        .context("failed to read table structure")?
    else {
        println!("Table {} does not exist.", args.table);
        return Ok(());
    };

    println!("  {:<32} {:<32} {}", "Column", "Type", "Comment");
    println!("  {}", "-".repeat(72));
    for col in columns {
        println!(
            "  {:<32} {:<32} {}",
            col.name,
            col.data_type,
            col.comment.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
