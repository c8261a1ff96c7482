//! Amendment table extraction.
//!
//! The listing is a plain HTML table. Each data row has five cells: an unused
//! leading cell, calendar number, LCO number (linked), bill number (linked)
//! and date. Extraction never fails: short rows yield empty fields and rows
//! without an anchor yield an origin-only link.

use std::sync::LazyLock;

use amendwatch_shared::AmendmentRecord;
use scraper::{ElementRef, Html, Selector};

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").expect("static selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("static selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static selector"));

/// A parsed listing page. Parsing happens once; [`ListingTable::records`]
/// can be called any number of times and walks the rows lazily.
pub struct ListingTable {
    doc: Html,
    origin: String,
}

impl ListingTable {
    /// Parse listing markup. `origin` is prefixed to every relative href.
    pub fn parse(markup: &str, origin: &str) -> Self {
        Self {
            doc: Html::parse_document(markup),
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// One record per table row, in document order, header rows included.
    pub fn records(&self) -> impl Iterator<Item = AmendmentRecord> + '_ {
        self.doc
            .select(&ROW)
            .map(move |row| row_to_record(row, &self.origin))
    }
}

/// Parse listing markup straight into records.
pub fn parse_listing(markup: &str, origin: &str) -> Vec<AmendmentRecord> {
    ListingTable::parse(markup, origin).records().collect()
}

fn row_to_record(row: ElementRef<'_>, origin: &str) -> AmendmentRecord {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    let text = |idx: usize| {
        cells
            .get(idx)
            .map(|cell| cell.text().collect::<String>())
            .unwrap_or_default()
    };
    let link = |idx: usize| {
        let href = cells
            .get(idx)
            .and_then(|cell| cell.select(&ANCHOR).next())
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("");
        format!("{origin}{href}")
    };

    AmendmentRecord {
        calendar_number: text(1),
        lco_number: text(2),
        lco_document_link: link(2),
        bill_number: text(3),
        bill_document_link: link(3),
        date: text(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://cga.ct.gov";

    const LISTING: &str = r#"
        <html>
          <table>
            <tr>
              <td>Header</td>
              <td>Cal #</td>
              <td>LCO #</td>
              <td>Bill #</td>
              <td>Date</td>
            </tr>
            <tr>
              <td></td>
              <td>123</td>
              <td><a href="/lco1">LCO-456</a></td>
              <td><a href="/bill1">HB-1234</a></td>
              <td>01/15/2024</td>
            </tr>
            <tr>
              <td></td>
              <td>789</td>
              <td><a href="/lco2">LCO-999</a></td>
              <td><a href="/bill2">SB-5678</a></td>
              <td>01/16/2024</td>
            </tr>
          </table>
        </html>
    "#;

    #[test]
    fn parses_rows_in_document_order() {
        let records = parse_listing(LISTING, ORIGIN);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].lco_number, "LCO #");
        assert_eq!(
            records[1],
            AmendmentRecord {
                calendar_number: "123".into(),
                lco_number: "LCO-456".into(),
                lco_document_link: "https://cga.ct.gov/lco1".into(),
                bill_number: "HB-1234".into(),
                bill_document_link: "https://cga.ct.gov/bill1".into(),
                date: "01/15/2024".into(),
            }
        );
        assert_eq!(records[2].bill_document_link, "https://cga.ct.gov/bill2");
    }

    #[test]
    fn records_are_restartable() {
        let table = ListingTable::parse(LISTING, ORIGIN);
        let first: Vec<_> = table.records().collect();
        let second: Vec<_> = table.records().collect();
        assert_eq!(first, second);
        assert_eq!(table.records().take(1).count(), 1);
    }

    #[test]
    fn empty_markup_yields_nothing() {
        assert!(parse_listing("<html></html>", ORIGIN).is_empty());
        assert!(parse_listing("<html><table></table></html>", ORIGIN).is_empty());
        assert!(parse_listing("", ORIGIN).is_empty());
    }

    #[test]
    fn short_row_yields_empty_fields() {
        let html = "<table><tr><td>x</td><td>42</td></tr></table>";
        let records = parse_listing(html, ORIGIN);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].calendar_number, "42");
        assert_eq!(records[0].lco_number, "");
        assert_eq!(records[0].date, "");
        assert_eq!(records[0].lco_document_link, ORIGIN);
    }

    #[test]
    fn missing_anchor_yields_origin_only_link() {
        let html = r#"<table><tr>
            <td></td><td>1</td><td>LCO-1</td><td><a>HB-1</a></td><td>01/01/2024</td>
        </tr></table>"#;
        let records = parse_listing(html, "https://cga.ct.gov/");
        assert_eq!(records[0].lco_number, "LCO-1");
        assert_eq!(records[0].lco_document_link, "https://cga.ct.gov");
        assert_eq!(records[0].bill_document_link, "https://cga.ct.gov");
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        let html = "<table><tr><td>a<td>1<td><a href='/x'>LCO-5</td></tr><tr></table><div>";
        let records = parse_listing(html, ORIGIN);
        let found = records
            .iter()
            .find(|r| r.lco_number == "LCO-5")
            .expect("unclosed cells still parse");
        assert_eq!(found.lco_document_link, "https://cga.ct.gov/x");
    }
}
