//! End-to-end run: listing → extract/filter → reconcile → resolve bills → digest.
//!
//! Partitions are independent and run as separate tasks. Nothing in a run
//! returns an error to the caller; every failure shows up as a log line and
//! in the [`PartitionReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use amendwatch_listing::{HttpSource, ListingSource, parse_amendments};
use amendwatch_shared::{AmendmentRecord, AppConfig, Partition, Result};
use amendwatch_storage::RecordStore;

use crate::bills::{BillResolver, ResolveSummary};
use crate::digest;
use crate::notify::{DigestSink, OutboxSink};
use crate::reconcile::{ReconcileReport, Reconciler};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of one partition's run.
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub partition: Partition,
    /// Data rows scraped, or `None` when the listing could not be fetched.
    pub fetched: Option<usize>,
    /// Records reported new by reconciliation.
    pub new_records: Vec<AmendmentRecord>,
    pub reconcile: ReconcileReport,
    pub bills: ResolveSummary,
    /// A digest was handed to the sink successfully.
    pub notified: bool,
}

impl PartitionReport {
    fn empty(partition: Partition) -> Self {
        Self {
            partition,
            fetched: None,
            new_records: Vec::new(),
            reconcile: ReconcileReport::default(),
            bills: ResolveSummary::default(),
            notified: false,
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per distinct requested partition, in request order.
    pub reports: Vec<PartitionReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// New records across all partitions.
    pub fn total_new(&self) -> usize {
        self.reports.iter().map(|r| r.new_records.len()).sum()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a partition enters a new phase.
    fn phase(&self, partition: Partition, name: &str);
    /// Called when a partition finishes.
    fn partition_done(&self, report: &PartitionReport);
    /// Called when the whole run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _partition: Partition, _name: &str) {}
    fn partition_done(&self, _report: &PartitionReport) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Wires the listing source, reconciler, bill resolver and digest sink.
#[derive(Clone)]
pub struct Pipeline {
    listing: Arc<dyn ListingSource>,
    origin: String,
    reconciler: Reconciler,
    resolver: Option<BillResolver>,
    sink: Option<Arc<dyn DigestSink>>,
}

impl Pipeline {
    /// A pipeline that reconciles only; add a resolver and sink as needed.
    pub fn new(
        listing: Arc<dyn ListingSource>,
        origin: impl Into<String>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            listing,
            origin: origin.into(),
            reconciler,
            resolver: None,
            sink: None,
        }
    }

    pub fn with_resolver(mut self, resolver: BillResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DigestSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the production pipeline: HTTP sources, the given store, and an
    /// outbox sink when `[notify]` has a sender and recipients.
    pub fn from_config(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let http = Arc::new(HttpSource::new(config.source.clone())?);
        let origin = config.source.origin.clone();

        let reconciler = Reconciler::new(store.clone(), config.reconcile.on_read_failure);
        let mut pipeline = Self::new(http.clone(), origin.clone(), reconciler);

        if config.resolver.enabled {
            pipeline = pipeline.with_resolver(BillResolver::new(
                store,
                http,
                origin,
                config.resolver.concurrency,
            ));
        }
        if let Some(sink) = OutboxSink::from_config(&config.notify) {
            pipeline = pipeline.with_sink(Arc::new(sink));
        }
        Ok(pipeline)
    }

    /// Skip bill resolution.
    pub fn without_resolver(mut self) -> Self {
        self.resolver = None;
        self
    }

    /// Skip digest delivery.
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Fetch a partition's listing and return its data rows.
    /// `None` means the fetch failed.
    pub async fn fetch_and_parse(&self, partition: Partition) -> Option<Vec<AmendmentRecord>> {
        match self.listing.fetch_listing(partition).await {
            Ok(markup) => {
                let records = parse_amendments(&markup, &self.origin);
                info!(%partition, rows = records.len(), "listing parsed");
                Some(records)
            }
            Err(e) => {
                warn!(%partition, error = %e, "listing fetch failed");
                None
            }
        }
    }

    /// Run one partition end to end.
    #[instrument(skip_all, fields(%partition))]
    pub async fn run_partition(
        &self,
        partition: Partition,
        progress: &dyn ProgressReporter,
    ) -> PartitionReport {
        let mut report = PartitionReport::empty(partition);

        progress.phase(partition, "Fetching listing");
        let Some(candidates) = self.fetch_and_parse(partition).await else {
            return report;
        };
        report.fetched = Some(candidates.len());

        progress.phase(partition, "Reconciling");
        let (new_records, reconcile) = self
            .reconciler
            .reconcile_with_report(candidates, partition)
            .await;
        report.reconcile = reconcile;

        if new_records.is_empty() {
            info!("no new amendments");
            return report;
        }

        if let Some(resolver) = &self.resolver {
            progress.phase(partition, "Resolving bills");
            report.bills = resolver.resolve_all(&new_records).await;
        }

        if let Some(sink) = &self.sink {
            progress.phase(partition, "Sending digest");
            let body = digest::render(&new_records, partition);
            match sink.send(&body, partition).await {
                Ok(()) => report.notified = true,
                Err(e) => warn!(error = %e, "digest delivery failed"),
            }
        }

        report.new_records = new_records;
        report
    }

    /// Run the given partitions concurrently. A partition listed more than
    /// once runs once, at its first position.
    pub async fn run(
        &self,
        partitions: &[Partition],
        progress: Arc<dyn ProgressReporter>,
    ) -> RunSummary {
        let start = Instant::now();

        let mut unique: Vec<Partition> = Vec::with_capacity(partitions.len());
        for &partition in partitions {
            if !unique.contains(&partition) {
                unique.push(partition);
            }
        }

        let mut handles = Vec::with_capacity(unique.len());
        for partition in unique {
            let pipeline = self.clone();
            let progress = progress.clone();
            handles.push((
                partition,
                tokio::spawn(async move {
                    let report = pipeline.run_partition(partition, progress.as_ref()).await;
                    progress.partition_done(&report);
                    report
                }),
            ));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (partition, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(%partition, error = %e, "partition task aborted");
                    reports.push(PartitionReport::empty(partition));
                }
            }
        }

        let summary = RunSummary {
            reports,
            elapsed: start.elapsed(),
        };
        info!(
            new = summary.total_new(),
            elapsed_ms = summary.elapsed.as_millis(),
            "run completed"
        );
        progress.done(&summary);
        summary
    }
}
