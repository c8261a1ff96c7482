//! Reconciliation of freshly scraped amendments against the stored set.
//!
//! One full scan per partition, a set difference on `lco_number`, then
//! sequential batch writes of at most [`MAX_BATCH_WRITE`] records. Nothing
//! here returns an error: read failures follow the configured
//! [`ReadFailurePolicy`] and write failures are logged per chunk.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use amendwatch_shared::{AmendmentRecord, Partition, ReadFailurePolicy};
use amendwatch_storage::{MAX_BATCH_WRITE, RecordStore};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Accounting for one reconcile call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records already stored (0 when the scan failed).
    pub known: usize,
    /// Records identified as new.
    pub new: usize,
    /// Batch writes that succeeded.
    pub chunks_written: usize,
    /// Batch writes that failed; their records are reported new but not stored.
    pub chunks_failed: usize,
    /// The known-set scan failed.
    pub read_failed: bool,
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Candidates whose `lco_number` is not in `known`, in candidate order.
/// A key repeated among the candidates is kept once (first occurrence).
pub(crate) fn new_records(
    candidates: Vec<AmendmentRecord>,
    known: &[AmendmentRecord],
) -> Vec<AmendmentRecord> {
    let mut seen: HashSet<String> = known.iter().map(|r| r.lco_number.clone()).collect();
    candidates
        .into_iter()
        .filter(|r| seen.insert(r.lco_number.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owns write access to the amendment tables.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    on_read_failure: ReadFailurePolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, on_read_failure: ReadFailurePolicy) -> Self {
        Self {
            store,
            on_read_failure,
        }
    }

    /// Persist the candidates not yet stored for `partition` and return them.
    ///
    /// The result means "logically new": records from a failed chunk are
    /// still returned. Re-running with the same candidates against a
    /// readable store returns an empty set.
    pub async fn reconcile(
        &self,
        candidates: Vec<AmendmentRecord>,
        partition: Partition,
    ) -> Vec<AmendmentRecord> {
        self.reconcile_with_report(candidates, partition).await.0
    }

    /// [`Reconciler::reconcile`] plus write accounting.
    #[instrument(skip_all, fields(%partition, candidates = candidates.len()))]
    pub async fn reconcile_with_report(
        &self,
        candidates: Vec<AmendmentRecord>,
        partition: Partition,
    ) -> (Vec<AmendmentRecord>, ReconcileReport) {
        let mut report = ReconcileReport::default();

        let known = match self.store.scan_amendments(partition).await {
            Ok(known) => known,
            Err(e) => {
                report.read_failed = true;
                match self.on_read_failure {
                    ReadFailurePolicy::AssumeEmpty => {
                        warn!(
                            error = %e,
                            "known-record scan failed, treating every candidate as new"
                        );
                        Vec::new()
                    }
                    ReadFailurePolicy::Abort => {
                        warn!(
                            error = %e,
                            "known-record scan failed, skipping reconciliation"
                        );
                        return (Vec::new(), report);
                    }
                }
            }
        };
        report.known = known.len();

        let fresh = new_records(candidates, &known);
        report.new = fresh.len();

        if fresh.is_empty() {
            debug!(known = report.known, "no new amendments");
            return (fresh, report);
        }

        for (idx, chunk) in fresh.chunks(MAX_BATCH_WRITE).enumerate() {
            match self.store.batch_write_amendments(partition, chunk).await {
                Ok(()) => {
                    report.chunks_written += 1;
                    debug!(chunk = idx, size = chunk.len(), "batch written");
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    let first = chunk.first().map(|r| r.lco_number.as_str()).unwrap_or("");
                    warn!(
                        chunk = idx,
                        size = chunk.len(),
                        first_lco = first,
                        error = %e,
                        "batch write failed, records will be retried next run"
                    );
                }
            }
        }

        info!(
            known = report.known,
            new = report.new,
            chunks_written = report.chunks_written,
            chunks_failed = report.chunks_failed,
            "reconciled amendments"
        );

        (fresh, report)
    }
}
