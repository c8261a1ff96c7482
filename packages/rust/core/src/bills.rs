//! Bill document resolution.
//!
//! For each new amendment, make sure its bill has an entry listing the PDFs
//! from the bill's status table. Failures stay inside the bill that caused
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use amendwatch_listing::{BillPageSource, extract_document_links};
use amendwatch_shared::{AmendmentRecord, BillEntry, Result};
use amendwatch_storage::RecordStore;

/// What happened to one bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillOutcome {
    /// An entry already existed; nothing fetched.
    AlreadyKnown,
    /// A new entry was written with this many documents.
    Stored { documents: usize },
    /// The page had no PDF links; left for a future run.
    NoDocuments,
    /// Lookup, fetch or write failed (logged).
    Failed,
}

/// Outcome counts for a batch of resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub already_known: usize,
    pub stored: usize,
    pub no_documents: usize,
    pub failed: usize,
}

impl ResolveSummary {
    fn record(&mut self, outcome: BillOutcome) {
        match outcome {
            BillOutcome::AlreadyKnown => self.already_known += 1,
            BillOutcome::Stored { .. } => self.stored += 1,
            BillOutcome::NoDocuments => self.no_documents += 1,
            BillOutcome::Failed => self.failed += 1,
        }
    }

    /// Total resolutions attempted.
    pub fn total(&self) -> usize {
        self.already_known + self.stored + self.no_documents + self.failed
    }
}

/// Owns write access to the bill table.
#[derive(Clone)]
pub struct BillResolver {
    store: Arc<dyn RecordStore>,
    pages: Arc<dyn BillPageSource>,
    origin: String,
    concurrency: usize,
}

impl BillResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        pages: Arc<dyn BillPageSource>,
        origin: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            pages,
            origin: origin.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve one bill. Never fails; errors are logged and reported as
    /// [`BillOutcome::Failed`].
    #[instrument(skip_all, fields(bill_number = %bill_number))]
    pub async fn resolve_bill(&self, bill_number: &str, bill_link: &str) -> BillOutcome {
        match self.try_resolve(bill_number, bill_link).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%bill_link, error = %e, "bill resolution failed");
                BillOutcome::Failed
            }
        }
    }

    async fn try_resolve(&self, bill_number: &str, bill_link: &str) -> Result<BillOutcome> {
        if self.store.get_bill(bill_number).await?.is_some() {
            debug!("bill already resolved");
            return Ok(BillOutcome::AlreadyKnown);
        }

        let page = self.pages.fetch_bill_page(bill_link).await?;
        let document_links = extract_document_links(&page, &self.origin);

        if document_links.is_empty() {
            info!("no documents found, leaving bill unresolved");
            return Ok(BillOutcome::NoDocuments);
        }

        let documents = document_links.len();
        self.store
            .put_bill(&BillEntry {
                bill_number: bill_number.to_string(),
                bill_link: bill_link.to_string(),
                document_links,
            })
            .await?;

        info!(documents, "stored new bill");
        Ok(BillOutcome::Stored { documents })
    }

    /// Resolve the bill of every record, at most `concurrency` bills at once.
    ///
    /// Each record gets its own resolution. Records sharing a bill number run
    /// one after another in the same task, so a bill is never resolved twice
    /// concurrently.
    pub async fn resolve_all(&self, records: &[AmendmentRecord]) -> ResolveSummary {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for record in records {
            let slot = *index.entry(record.bill_number.as_str()).or_insert_with(|| {
                groups.push((record.bill_number.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(record.bill_document_link.clone());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (bill_number, links) in groups {
            let resolver = self.clone();
            let sem = semaphore.clone();
            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let mut outcomes = Vec::with_capacity(links.len());
                for link in links {
                    outcomes.push(resolver.resolve_bill(&bill_number, &link).await);
                }
                outcomes
            });
        }

        let mut summary = ResolveSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => outcomes.into_iter().for_each(|o| summary.record(o)),
                Err(e) => warn!(error = %e, "bill resolution task aborted"),
            }
        }
        // Records of an aborted task produced no outcome.
        summary.failed += records.len().saturating_sub(summary.total());

        info!(
            stored = summary.stored,
            already_known = summary.already_known,
            no_documents = summary.no_documents,
            failed = summary.failed,
            "bill resolution finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use amendwatch_shared::AmendWatchError;
    use amendwatch_storage::MemoryStore;
    use async_trait::async_trait;

    const ORIGIN: &str = "https://cga.ct.gov";

    const BILL_PAGE: &str = r#"<html><body>
        <table summary="Status of bills">
          <tr><td><a href="/2024/TOB/S/PDF/2024SB-05678-R00-SB.PDF">Text</a></td></tr>
          <tr><td><a href="/2024/FC/PDF/2024SB-05678-R000123-FC.PDF">Fiscal</a></td></tr>
        </table>
    </body></html>"#;

    /// Serves a fixed page and records every requested URL.
    struct FakePages {
        body: String,
        fail: bool,
        requested: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakePages {
        fn serving(body: &str) -> Self {
            Self {
                body: body.to_string(),
                fail: false,
                requested: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::serving("")
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BillPageSource for FakePages {
        async fn fetch_bill_page(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(AmendWatchError::Transport(format!("{url}: connection reset")));
            }
            Ok(self.body.clone())
        }
    }

    fn record(lco: &str, bill: &str) -> AmendmentRecord {
        AmendmentRecord {
            lco_number: lco.into(),
            bill_number: bill.into(),
            bill_document_link: format!("{ORIGIN}/{bill}"),
            ..AmendmentRecord::default()
        }
    }

    #[tokio::test]
    async fn stores_new_bill_with_documents() {
        let store = Arc::new(MemoryStore::new());
        let pages = Arc::new(FakePages::serving(BILL_PAGE));
        let resolver = BillResolver::new(store.clone(), pages.clone(), ORIGIN, 2);

        let outcome = resolver.resolve_bill("SB-5678", "https://cga.ct.gov/bill2").await;

        assert_eq!(outcome, BillOutcome::Stored { documents: 2 });
        assert_eq!(pages.requested(), vec!["https://cga.ct.gov/bill2"]);
        let entry = store.get_bill("SB-5678").await.unwrap().expect("stored");
        assert_eq!(entry.bill_link, "https://cga.ct.gov/bill2");
        assert!(
            entry
                .document_links
                .contains("https://cga.ct.gov/2024/TOB/S/PDF/2024SB-05678-R00-SB.PDF")
        );
    }

    #[tokio::test]
    async fn known_bill_is_not_fetched() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_bill(BillEntry {
                bill_number: "HB-1234".into(),
                bill_link: "https://cga.ct.gov/bill1".into(),
                document_links: ["https://cga.ct.gov/a.PDF".to_string()].into(),
            })
            .await;
        let pages = Arc::new(FakePages::serving(BILL_PAGE));
        let resolver = BillResolver::new(store.clone(), pages.clone(), ORIGIN, 2);

        let outcome = resolver.resolve_bill("HB-1234", "https://cga.ct.gov/bill1").await;

        assert_eq!(outcome, BillOutcome::AlreadyKnown);
        assert!(pages.requested().is_empty());
        assert_eq!(store.bill_puts(), 0);
    }

    #[tokio::test]
    async fn page_without_documents_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let pages = Arc::new(FakePages::serving("<html><body>No status yet</body></html>"));
        let resolver = BillResolver::new(store.clone(), pages, ORIGIN, 2);

        let outcome = resolver.resolve_bill("HB-1", "https://cga.ct.gov/HB-1").await;

        assert_eq!(outcome, BillOutcome::NoDocuments);
        assert_eq!(store.bill_puts(), 0);
        assert!(store.get_bill("HB-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn errors_are_contained_per_bill() {
        let store = Arc::new(MemoryStore::new());
        let resolver = BillResolver::new(store.clone(), Arc::new(FakePages::failing()), ORIGIN, 2);
        assert_eq!(
            resolver.resolve_bill("HB-1", "https://cga.ct.gov/HB-1").await,
            BillOutcome::Failed
        );

        store.fail_bill_reads(true);
        let pages = Arc::new(FakePages::serving(BILL_PAGE));
        let resolver = BillResolver::new(store.clone(), pages.clone(), ORIGIN, 2);
        assert_eq!(
            resolver.resolve_bill("HB-2", "https://cga.ct.gov/HB-2").await,
            BillOutcome::Failed
        );
        assert!(pages.requested().is_empty());

        store.fail_bill_reads(false);
        store.fail_bill_writes(true);
        assert_eq!(
            resolver.resolve_bill("HB-3", "https://cga.ct.gov/HB-3").await,
            BillOutcome::Failed
        );
    }

    #[tokio::test]
    async fn resolve_all_invokes_once_per_record_with_bounded_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let pages = Arc::new(FakePages::serving(BILL_PAGE));
        let resolver = BillResolver::new(store.clone(), pages.clone(), ORIGIN, 3);

        let records: Vec<_> = (0..30)
            .map(|i| record(&format!("LCO-{i}"), &format!("HB-{}", 1000 + i)))
            .collect();
        let summary = resolver.resolve_all(&records).await;

        assert_eq!(summary.total(), 30);
        assert_eq!(summary.stored, 30);
        assert_eq!(store.bill_gets(), 30);
        assert_eq!(pages.requested().len(), 30);
        assert!(pages.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn shared_bill_is_resolved_sequentially() {
        let store = Arc::new(MemoryStore::new());
        let pages = Arc::new(FakePages::serving(BILL_PAGE));
        let resolver = BillResolver::new(store.clone(), pages.clone(), ORIGIN, 4);

        let records = vec![
            record("LCO-1", "SB-5678"),
            record("LCO-2", "SB-5678"),
            record("LCO-3", "HB-1234"),
        ];
        let summary = resolver.resolve_all(&records).await;

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.already_known, 1);
        assert_eq!(store.bill_gets(), 3);
        assert_eq!(store.bill_puts(), 2);
    }

    #[tokio::test]
    async fn one_failing_bill_does_not_stop_siblings() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_bill(BillEntry {
                bill_number: "HB-1".into(),
                bill_link: format!("{ORIGIN}/HB-1"),
                document_links: ["https://cga.ct.gov/a.PDF".to_string()].into(),
            })
            .await;
        let resolver = BillResolver::new(store.clone(), Arc::new(FakePages::failing()), ORIGIN, 2);

        let summary = resolver
            .resolve_all(&[record("LCO-1", "HB-1"), record("LCO-2", "HB-2")])
            .await;

        assert_eq!(summary.already_known, 1);
        assert_eq!(summary.failed, 1);
    }

    struct PanickingPages;

    #[async_trait]
    impl BillPageSource for PanickingPages {
        async fn fetch_bill_page(&self, url: &str) -> Result<String> {
            panic!("page source crashed on {url}");
        }
    }

    #[tokio::test]
    async fn aborted_group_counts_every_record_as_failed() {
        let store = Arc::new(MemoryStore::new());
        let resolver = BillResolver::new(store.clone(), Arc::new(PanickingPages), ORIGIN, 2);

        let summary = resolver
            .resolve_all(&[
                record("LCO-1", "HB-7"),
                record("LCO-2", "HB-7"),
                record("LCO-3", "HB-7"),
            ])
            .await;

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.total(), 3);
        assert_eq!(store.bill_puts(), 0);
    }
}
