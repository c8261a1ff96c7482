//! In-process [`RecordStore`] with call accounting and failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use amendwatch_shared::{AmendWatchError, AmendmentRecord, BillEntry, Partition, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{RecordStore, check_batch_size};

/// Hash-map backed store. Amendments keep insertion order per partition.
#[derive(Default)]
pub struct MemoryStore {
    senate: Mutex<Vec<AmendmentRecord>>,
    house: Mutex<Vec<AmendmentRecord>>,
    bills: Mutex<BTreeMap<String, BillEntry>>,
    /// Sizes of every batch write attempted, in call order.
    batch_sizes: Mutex<Vec<usize>>,
    /// 1-based batch write calls that should fail.
    failing_batches: Mutex<HashSet<usize>>,
    scan_calls: AtomicUsize,
    bill_gets: AtomicUsize,
    bill_puts: AtomicUsize,
    fail_scan: AtomicBool,
    fail_bill_reads: AtomicBool,
    fail_bill_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a partition without counting a batch write.
    pub async fn seed(
        &self,
        partition: Partition,
        records: impl IntoIterator<Item = AmendmentRecord>,
    ) {
        let mut table = self.table(partition).lock().await;
        for record in records {
            upsert(&mut table, record);
        }
    }

    /// Pre-populate the bill table without counting a put.
    pub async fn seed_bill(&self, entry: BillEntry) {
        self.bills
            .lock()
            .await
            .insert(entry.bill_number.clone(), entry);
    }

    /// Make every subsequent scan fail.
    pub fn fail_scans(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    /// Make the `n`th batch write call (1-based) fail.
    pub async fn fail_batch(&self, n: usize) {
        self.failing_batches.lock().await.insert(n);
    }

    /// Make bill lookups fail.
    pub fn fail_bill_reads(&self, fail: bool) {
        self.fail_bill_reads.store(fail, Ordering::SeqCst);
    }

    /// Make bill writes fail.
    pub fn fail_bill_writes(&self, fail: bool) {
        self.fail_bill_writes.store(fail, Ordering::SeqCst);
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn bill_gets(&self) -> usize {
        self.bill_gets.load(Ordering::SeqCst)
    }

    pub fn bill_puts(&self) -> usize {
        self.bill_puts.load(Ordering::SeqCst)
    }

    /// Sizes of every batch write attempted, failed ones included.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }

    /// Current contents of a partition.
    pub async fn amendments(&self, partition: Partition) -> Vec<AmendmentRecord> {
        self.table(partition).lock().await.clone()
    }

    fn table(&self, partition: Partition) -> &Mutex<Vec<AmendmentRecord>> {
        match partition {
            Partition::Senate => &self.senate,
            Partition::House => &self.house,
        }
    }
}

fn upsert(table: &mut Vec<AmendmentRecord>, record: AmendmentRecord) {
    match table.iter_mut().find(|r| r.lco_number == record.lco_number) {
        Some(existing) => *existing = record,
        None => table.push(record),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn scan_amendments(&self, partition: Partition) -> Result<Vec<AmendmentRecord>> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(AmendWatchError::StoreRead(format!(
                "injected scan failure on {partition}"
            )));
        }
        Ok(self.table(partition).lock().await.clone())
    }

    async fn get_amendment(
        &self,
        partition: Partition,
        lco_number: &str,
    ) -> Result<Option<AmendmentRecord>> {
        Ok(self
            .table(partition)
            .lock()
            .await
            .iter()
            .find(|r| r.lco_number == lco_number)
            .cloned())
    }

    async fn batch_write_amendments(
        &self,
        partition: Partition,
        records: &[AmendmentRecord],
    ) -> Result<()> {
        let call = {
            let mut sizes = self.batch_sizes.lock().await;
            sizes.push(records.len());
            sizes.len()
        };
        check_batch_size(records)?;
        if self.failing_batches.lock().await.contains(&call) {
            return Err(AmendWatchError::StoreWrite(format!(
                "injected failure on batch {call}"
            )));
        }

        let mut table = self.table(partition).lock().await;
        for record in records {
            upsert(&mut table, record.clone());
        }
        Ok(())
    }

    async fn get_bill(&self, bill_number: &str) -> Result<Option<BillEntry>> {
        self.bill_gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_bill_reads.load(Ordering::SeqCst) {
            return Err(AmendWatchError::StoreRead(format!(
                "injected lookup failure for {bill_number}"
            )));
        }
        Ok(self.bills.lock().await.get(bill_number).cloned())
    }

    async fn put_bill(&self, entry: &BillEntry) -> Result<()> {
        self.bill_puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_bill_writes.load(Ordering::SeqCst) {
            return Err(AmendWatchError::StoreWrite(format!(
                "injected write failure for {}",
                entry.bill_number
            )));
        }
        self.bills
            .lock()
            .await
            .insert(entry.bill_number.clone(), entry.clone());
        Ok(())
    }

    async fn list_bills(&self) -> Result<Vec<BillEntry>> {
        Ok(self.bills.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lco: &str) -> AmendmentRecord {
        AmendmentRecord {
            lco_number: lco.into(),
            ..AmendmentRecord::default()
        }
    }

    #[tokio::test]
    async fn injected_batch_failure_leaves_table_untouched() {
        let store = MemoryStore::new();
        store.fail_batch(2).await;

        store
            .batch_write_amendments(Partition::Senate, &[record("A")])
            .await
            .expect("first batch");
        let second = store
            .batch_write_amendments(Partition::Senate, &[record("B")])
            .await;
        assert!(second.is_err());

        assert_eq!(store.amendments(Partition::Senate).await, vec![record("A")]);
        assert_eq!(store.batch_sizes().await, vec![1, 1]);
    }

    #[tokio::test]
    async fn seeded_records_are_scanned() {
        let store = MemoryStore::new();
        store.seed(Partition::House, [record("A"), record("A")]).await;

        let scanned = store.scan_amendments(Partition::House).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(store.scan_calls(), 1);
        assert!(store.batch_sizes().await.is_empty());
    }
}
