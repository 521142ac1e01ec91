use csv_async::AsyncReaderBuilder;
use futures::stream::Stream;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::models::Account;

/// One row of a workload file.
///
/// `label` is the file's alias for an account; the driver resolves it to
/// a generated account number. Optional columns are empty for operations
/// that do not use them.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRow {
    pub op: OpKind,
    pub label: String,
    pub caller: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Open,
    Deposit,
    Withdraw,
    Update,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Open => "open",
            OpKind::Deposit => "deposit",
            OpKind::Withdraw => "withdraw",
            OpKind::Update => "update",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream operation rows from an async reader
pub fn stream_operations<R: AsyncRead + Unpin + Send + 'static>(
    reader: R,
) -> impl Stream<Item = Result<OperationRow, csv_async::Error>> {
    let compat_reader = reader.compat();
    let csv_reader = AsyncReaderBuilder::new()
        .trim(csv_async::Trim::All)
        .flexible(true)
        .create_deserializer(compat_reader);

    csv_reader.into_deserialize::<OperationRow>()
}

/// Write the final statement for a replay run, one line per opened
/// account in workload order.
pub async fn write_statement<W: AsyncWrite + Unpin>(
    mut writer: W,
    rows: Vec<(String, Account)>,
) -> Result<(), anyhow::Error> {
    writer
        .write_all(b"label,account,owner,name,type,balance,currency\n")
        .await?;

    for (label, account) in rows {
        let line = format!(
            "{},{},{},{},{},{:.2},{}\n",
            label,
            account.number,
            account.owner,
            account.name,
            account.kind,
            account.balance,
            account.currency
        );
        writer.write_all(line.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}
