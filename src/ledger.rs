//! Append-only record of completed purchases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::ProductId;
use crate::errors::Result;

/// One row per (payment, line item).
///
/// A charge that cannot be matched to any line item is still recorded as a
/// single row carrying the charged amount, with the unknown parts left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub charge_id: String,
    pub buyer_id: i64,
    pub product_id: Option<ProductId>,
    pub buyer_name: String,
    pub delivery_location: String,
    pub product_title: String,
    pub quantity: Option<u32>,
    /// Major units, two decimal places
    pub amount: Decimal,
    pub ordered_at: DateTime<Utc>,
}

/// Result of recording the rows of one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Every row was written
    Appended(usize),
    /// Rows for this charge id were already recorded; nothing was written
    DuplicateCharge,
}

/// Durable system of record for completed sales.
///
/// `append_payment` writes all rows of one payment; all rows must share a
/// charge id. Implementations check for that charge id and write under the
/// same exclusive section, so a redelivered confirmation is recorded once.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn append_payment(&self, records: &[OrderRecord]) -> Result<AppendOutcome>;

    async fn records(&self) -> Result<Vec<OrderRecord>>;
}

/// JSON-lines ledger file guarded by a single writer lock
#[derive(Debug)]
pub struct FileOrderLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileOrderLedger {
    /// Open the ledger, creating an empty file when it does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if fs::try_exists(&path).await? {
            info!(path = %path.display(), "Order ledger file already exists");
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, b"").await?;
            info!(path = %path.display(), "Created order ledger file");
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<OrderRecord>> {
        let contents = fs::read_to_string(&self.path).await?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl OrderLedger for FileOrderLedger {
    async fn append_payment(&self, records: &[OrderRecord]) -> Result<AppendOutcome> {
        let Some(first) = records.first() else {
            return Ok(AppendOutcome::Appended(0));
        };

        let _guard = self.write_lock.lock().await;

        let existing = self.read_records().await?;
        if existing.iter().any(|r| r.charge_id == first.charge_id) {
            return Ok(AppendOutcome::DuplicateCharge);
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(&buffer).await?;
        file.sync_data().await?;

        debug!(
            charge_id = %first.charge_id,
            rows = records.len(),
            "Appended order rows to ledger file"
        );
        Ok(AppendOutcome::Appended(records.len()))
    }

    async fn records(&self) -> Result<Vec<OrderRecord>> {
        let _guard = self.write_lock.lock().await;
        self.read_records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(charge_id: &str, product_id: i64) -> OrderRecord {
        OrderRecord {
            charge_id: charge_id.to_string(),
            buyer_id: 100,
            product_id: Some(ProductId(product_id)),
            buyer_name: "@buyer".to_string(),
            delivery_location: "Lenina 1".to_string(),
            product_title: format!("Product {product_id}"),
            quantity: Some(1),
            amount: Decimal::new(1999, 2),
            ordered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_missing_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("ledger").join("orders.jsonl");

        let ledger = FileOrderLedger::open(&path).await?;

        assert!(path.exists());
        assert!(ledger.records().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rows_are_appended_in_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = FileOrderLedger::open(dir.path().join("orders.jsonl")).await?;

        let outcome = ledger
            .append_payment(&[record("ch_1", 1), record("ch_1", 2)])
            .await?;
        assert_eq!(outcome, AppendOutcome::Appended(2));
        ledger.append_payment(&[record("ch_2", 3)]).await?;

        let rows = ledger.records().await?;
        let ids: Vec<Option<ProductId>> = rows.iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![Some(ProductId(1)), Some(ProductId(2)), Some(ProductId(3))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_charge_is_not_written_twice() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = FileOrderLedger::open(dir.path().join("orders.jsonl")).await?;

        ledger.append_payment(&[record("ch_1", 1)]).await?;
        let outcome = ledger.append_payment(&[record("ch_1", 1)]).await?;

        assert_eq!(outcome, AppendOutcome::DuplicateCharge);
        assert_eq!(ledger.records().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_payments_do_not_corrupt_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Arc::new(FileOrderLedger::open(dir.path().join("orders.jsonl")).await?);

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .append_payment(&[record(&format!("ch_{i}"), i), record(&format!("ch_{i}"), i + 100)])
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let reopened = FileOrderLedger::open(ledger.path()).await?;
        assert_eq!(reopened.records().await?.len(), 40);
        Ok(())
    }
}
