use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::CoreConfig;
use crate::csv_io::stream_operations;
use crate::engine::TransactionEngine;
use crate::journal::JournaledStore;
use crate::session::{RowOutcome, Session};

/// Run the TCP session server on top of a journaled store, so committed
/// state survives restarts.
pub async fn run(bind: String, max_connections: usize, journal: PathBuf) -> Result<()> {
    let store = Arc::new(JournaledStore::open(journal).await?);
    let engine = TransactionEngine::new(store, CoreConfig::default());

    let listener = TcpListener::bind(&bind).await?;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    tracing::info!(%bind, max_connections, "listening");

    loop {
        let permit = semaphore.clone().acquire_owned().await?;
        let (socket, addr) = listener.accept().await?;
        tracing::info!(%addr, "accepted connection");

        let engine = engine.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, engine).await {
                tracing::error!(%addr, error = %e, "connection error");
            }
            drop(permit);
        });
    }
}

/// One session per connection: the client streams operation rows and
/// receives one response line per row. Labels are scoped to the
/// connection; account state is shared through the engine.
async fn handle_connection(socket: TcpStream, engine: TransactionEngine) -> Result<()> {
    let (reader, writer) = socket.into_split();
    let reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    let mut session = Session::new(engine);
    let mut stream = stream_operations(reader);

    while let Some(result) = stream.next().await {
        let line = match result {
            Ok(row) => response_line(session.apply_row(row).await),
            Err(err) => {
                tracing::warn!(error = %err, "row parse error");
                "err,parse,malformed-row\n".to_string()
            }
        };
        writer.write_all(line.as_bytes()).await?;
        // Flush per row so the client sees the outcome before sending more.
        writer.flush().await?;
    }

    Ok(())
}

fn response_line(outcome: RowOutcome) -> String {
    match outcome {
        RowOutcome::Opened { label, number } => format!("ok,open,{label},{number}\n"),
        RowOutcome::Applied { op, label, id } => format!("ok,{op},{label},{id}\n"),
        RowOutcome::Updated { label } => format!("ok,update,{label}\n"),
        RowOutcome::Failed { op, code, detail } => {
            tracing::debug!(op = %op, code, detail = %detail, "row rejected");
            format!("err,{op},{code}\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::OpKind;
    use crate::ids::{AccountNumber, TransactionId};

    #[test]
    fn response_lines_follow_the_wire_format() {
        let opened = RowOutcome::Opened {
            label: "acc-a".to_string(),
            number: AccountNumber::parse("01234567").unwrap(),
        };
        assert_eq!(response_line(opened), "ok,open,acc-a,01234567\n");

        let applied = RowOutcome::Applied {
            op: OpKind::Withdraw,
            label: "acc-a".to_string(),
            id: TransactionId::parse("tan-abcdef123456").unwrap(),
        };
        assert_eq!(
            response_line(applied),
            "ok,withdraw,acc-a,tan-abcdef123456\n"
        );

        let failed = RowOutcome::Failed {
            op: OpKind::Deposit,
            code: "insufficient-funds",
            detail: String::new(),
        };
        assert_eq!(response_line(failed), "err,deposit,insufficient-funds\n");
    }
}
