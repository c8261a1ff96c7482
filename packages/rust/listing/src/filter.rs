//! Drops header rows and rows without an identity key.

use amendwatch_shared::AmendmentRecord;

/// Caption of the LCO column in the listing's header row.
pub const LISTING_HEADER_TOKEN: &str = "LCO #";

/// True for data rows: a non-empty LCO number that is not the header caption.
pub fn is_listing_row(record: &AmendmentRecord) -> bool {
    !record.lco_number.is_empty() && record.lco_number != LISTING_HEADER_TOKEN
}

/// Keep only data rows, preserving order.
pub fn filter_records(records: impl IntoIterator<Item = AmendmentRecord>) -> Vec<AmendmentRecord> {
    records.into_iter().filter(is_listing_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_listing;

    fn lco(n: &str) -> AmendmentRecord {
        AmendmentRecord {
            lco_number: n.into(),
            ..AmendmentRecord::default()
        }
    }

    #[test]
    fn drops_header_and_empty_keys() {
        let kept = filter_records([lco("LCO #"), lco(""), lco("LCO-1"), lco("LCO-2")]);
        let keys: Vec<_> = kept.iter().map(|r| r.lco_number.as_str()).collect();
        assert_eq!(keys, ["LCO-1", "LCO-2"]);
    }

    #[test]
    fn header_match_is_exact() {
        assert!(is_listing_row(&lco("lco #")));
        assert!(is_listing_row(&lco("LCO # ")));
        assert!(!is_listing_row(&lco("LCO #")));
    }

    #[test]
    fn extract_then_filter() {
        let html = r#"<table>
            <tr><th>Header</th><th>Cal #</th><th>LCO #</th><th>Bill #</th><th>Date</th></tr>
            <tr><td></td><td>Cal #</td><td>LCO #</td><td>Bill #</td><td>Date</td></tr>
            <tr><td></td><td>123</td><td><a href="/lco1">LCO-456</a></td><td><a href="/bill1">HB-1234</a></td><td>01/15/2024</td></tr>
            <tr><td></td><td></td><td></td><td></td><td></td></tr>
            <tr><td></td><td>789</td><td><a href="/lco2">LCO-999</a></td><td><a href="/bill2">SB-5678</a></td><td>01/16/2024</td></tr>
        </table>"#;

        let records = filter_records(parse_listing(html, "https://cga.ct.gov"));
        let keys: Vec<_> = records.iter().map(|r| r.lco_number.as_str()).collect();
        assert_eq!(keys, ["LCO-456", "LCO-999"]);
        assert_eq!(records[1].bill_number, "SB-5678");
    }
}
