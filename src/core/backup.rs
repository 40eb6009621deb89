//! Backup and restore of the transaction set as JSON.
//!
//! A backup is a JSON array of records carrying exactly `id, title, amount, category,
//! date, isExpense`, with `date` in epoch milliseconds. Older backups wrote `date` as a
//! floating-point number; those decode too, truncated to whole milliseconds.
//!
//! Restore is a merge keyed by `id`. The whole payload is decoded and validated before
//! anything is written, and the write itself is one database transaction, so a bad
//! payload leaves the store exactly as it was.

use crate::{
    entities::transaction,
    errors::{Error, Result},
    store::{RecordStore, transactions::validate_transaction},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, instrument};

/// One transaction as it appears in a backup file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Transaction id
    pub id: String,
    /// Free-text label
    pub title: String,
    /// Non-negative magnitude
    pub amount: f64,
    /// Category name
    pub category: String,
    /// Epoch milliseconds
    #[serde(deserialize_with = "deserialize_epoch_ms")]
    pub date: i64,
    /// Outflow when `true`
    pub is_expense: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochMs {
    Integer(i64),
    Float(f64),
}

fn deserialize_epoch_ms<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match EpochMs::deserialize(deserializer)? {
        EpochMs::Integer(ms) => Ok(ms),
        EpochMs::Float(ms) if ms.is_finite() => {
            #[allow(clippy::cast_possible_truncation)]
            let truncated = ms.trunc() as i64;
            Ok(truncated)
        }
        EpochMs::Float(ms) => Err(serde::de::Error::custom(format!(
            "date must be a finite number, got {ms}"
        ))),
    }
}

impl From<transaction::Model> for BackupRecord {
    fn from(t: transaction::Model) -> Self {
        Self {
            id: t.id,
            title: t.title,
            amount: t.amount,
            category: t.category,
            date: t.date,
            is_expense: t.is_expense,
        }
    }
}

impl From<BackupRecord> for transaction::Model {
    fn from(r: BackupRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            amount: r.amount,
            category: r.category,
            date: r.date,
            is_expense: r.is_expense,
        }
    }
}

/// Serializes transactions to a pretty-printed JSON payload.
pub fn encode(transactions: Vec<transaction::Model>) -> Result<Vec<u8>> {
    let records: Vec<BackupRecord> = transactions.into_iter().map(BackupRecord::from).collect();
    Ok(serde_json::to_vec_pretty(&records)?)
}

/// Decodes and validates a payload. Any bad record fails the whole payload.
pub fn decode(payload: &[u8]) -> Result<Vec<transaction::Model>> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::validation("Backup payload is empty"));
    }
    let records: Vec<BackupRecord> = serde_json::from_slice(payload)?;
    let transactions: Vec<transaction::Model> =
        records.into_iter().map(transaction::Model::from).collect();
    for transaction in &transactions {
        validate_transaction(transaction)?;
    }
    Ok(transactions)
}

/// Writes every stored transaction to `sink` as one payload. Returns the record count.
#[instrument(skip(store, sink))]
pub async fn export_to_writer<W>(store: &RecordStore, sink: &mut W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let transactions = store.all_transactions().await?;
    let count = transactions.len();
    let payload = encode(transactions)?;
    sink.write_all(&payload).await?;
    sink.flush().await?;
    info!("Exported {} transactions", count);
    Ok(count)
}

/// Reads one payload from `source` and merges it into the store. Returns the number of
/// distinct records applied.
#[instrument(skip(store, source))]
pub async fn import_from_reader<R>(store: &RecordStore, source: &mut R) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut payload = Vec::new();
    source.read_to_end(&mut payload).await?;
    let transactions = decode(&payload)?;
    let applied = store.put_transactions(transactions).await?;
    info!("Imported {} transactions", applied);
    Ok(applied)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Exports to `path`. The payload goes to a sibling temp file first and is renamed into
/// place, so `path` never holds a partial backup. The temp file is removed on failure.
pub async fn export_to_path(store: &RecordStore, path: &Path) -> Result<usize> {
    let temp = temp_path_for(path);
    let result = write_and_rename(store, &temp, path).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    result
}

async fn write_and_rename(store: &RecordStore, temp: &Path, path: &Path) -> Result<usize> {
    let mut file = tokio::fs::File::create(temp).await?;
    let exported = export_to_writer(store, &mut file).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp, path).await?;
    Ok(exported)
}

/// Imports from the file at `path`.
pub async fn import_from_path(store: &RecordStore, path: &Path) -> Result<usize> {
    let mut file = tokio::fs::File::open(path).await?;
    import_from_reader(store, &mut file).await
}

fn log_failure(operation: &str, path: &Path, e: &Error) {
    if e.is_io() {
        error!("{} failed, cannot access {}: {}", operation, path.display(), e);
    } else if e.is_validation() {
        error!("{} failed, invalid backup data in {}: {}", operation, path.display(), e);
    } else {
        error!("{} failed for {}: {}", operation, path.display(), e);
    }
}

/// Backs up every transaction to `path`. Reports only success or failure.
pub async fn backup_to_file(store: &RecordStore, path: &Path) -> bool {
    match export_to_path(store, path).await {
        Ok(_) => true,
        Err(e) => {
            log_failure("Backup", path, &e);
            false
        }
    }
}

/// Restores transactions from `path`, merging by id. Reports only success or failure.
pub async fn restore_from_file(store: &RecordStore, path: &Path) -> bool {
    match import_from_path(store, path).await {
        Ok(_) => true,
        Err(e) => {
            log_failure("Restore", path, &e);
            false
        }
    }
}
