//! Listing extraction, record filtering, bill page scraping and HTTP transport.
//!
//! This crate provides:
//! - [`extract`]: amendment table rows to [`AmendmentRecord`]s
//! - [`filter`]: drops header rows and rows without an LCO number
//! - [`bill_page`]: PDF links from a bill's status table
//! - [`fetch`]: [`ListingSource`] / [`BillPageSource`] and the reqwest-backed [`HttpSource`]

pub mod bill_page;
pub mod extract;
pub mod fetch;
pub mod filter;

use amendwatch_shared::AmendmentRecord;

pub use bill_page::extract_document_links;
pub use extract::{ListingTable, parse_listing};
pub use fetch::{BillPageSource, HttpSource, ListingSource};
pub use filter::{LISTING_HEADER_TOKEN, filter_records, is_listing_row};

/// Extract then filter: the data rows of a listing page, in order.
pub fn parse_amendments(markup: &str, origin: &str) -> Vec<AmendmentRecord> {
    filter_records(ListingTable::parse(markup, origin).records())
}
