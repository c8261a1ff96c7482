//! Core domain logic for AmendWatch.
//!
//! Ties the listing scraper and the record store together: reconciliation
//! of scraped amendments, bill document resolution, digest rendering and
//! delivery, and the per-partition pipeline that runs them in order.

pub mod bills;
pub mod digest;
pub mod notify;
pub mod pipeline;
pub mod reconcile;

pub use bills::{BillOutcome, BillResolver, ResolveSummary};
pub use notify::{DigestSink, OutboxMessage, OutboxSink};
pub use pipeline::{PartitionReport, Pipeline, ProgressReporter, RunSummary, SilentProgress};
pub use reconcile::{ReconcileReport, Reconciler};
