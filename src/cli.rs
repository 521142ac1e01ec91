use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::warn;

use crate::config::CoreConfig;
use crate::csv_io::{stream_operations, write_statement};
use crate::engine::TransactionEngine;
use crate::session::{RowOutcome, Session};
use crate::storage::MemoryStore;

/// Replay a workload file against a fresh in-memory core and print the
/// final statement to stdout.
pub async fn run(input_path: PathBuf) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = TransactionEngine::new(store, CoreConfig::default());
    let mut session = Session::new(engine);

    let file = File::open(&input_path).await?;
    let reader = BufReader::new(file);
    let mut stream = stream_operations(reader);

    let mut rejected = 0usize;
    while let Some(result) = stream.next().await {
        match result {
            Ok(row) => {
                if let RowOutcome::Failed { op, code, detail } = session.apply_row(row).await {
                    warn!(op = %op, code, detail = %detail, "row rejected");
                    rejected += 1;
                }
            }
            Err(err) => {
                warn!(error = %err, "row parse error");
                rejected += 1;
            }
        }
    }

    let rows = session.statement().await?;
    write_statement(tokio::io::stdout(), rows).await?;

    // Stdout carries only the statement; the rejection count goes to stderr.
    if rejected > 0 {
        eprintln!("{rejected} rows rejected");
    }

    Ok(())
}
