//! Core domain types for AmendWatch.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AmendWatchError;

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// A legislative chamber. Each partition has its own listing endpoint and
/// its own amendment table; records never move between partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Senate,
    House,
}

impl Partition {
    /// Every partition, in processing order.
    pub const ALL: [Partition; 2] = [Partition::Senate, Partition::House];

    /// Lowercase name used in table names, file names and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Senate => "senate",
            Partition::House => "house",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = AmendWatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "senate" => Ok(Partition::Senate),
            "house" => Ok(Partition::House),
            other => Err(AmendWatchError::validation(format!(
                "unknown partition '{other}' (expected 'senate' or 'house')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// AmendmentRecord
// ---------------------------------------------------------------------------

/// One row of the public amendment listing.
///
/// `lco_number` is the identity key within a partition. All other fields are
/// carried verbatim from the listing and are never compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentRecord {
    /// Calendar number (frequently empty).
    #[serde(rename = "calNumber")]
    pub calendar_number: String,
    /// LCO number, the identity key.
    #[serde(rename = "lcoNumber")]
    pub lco_number: String,
    /// Absolute link to the amendment document.
    #[serde(rename = "lcoLink")]
    pub lco_document_link: String,
    /// Bill the amendment belongs to.
    #[serde(rename = "billNumber")]
    pub bill_number: String,
    /// Absolute link to the bill's detail page.
    #[serde(rename = "billLink")]
    pub bill_document_link: String,
    /// Date as published, not parsed.
    pub date: String,
}

// ---------------------------------------------------------------------------
// BillEntry
// ---------------------------------------------------------------------------

/// A resolved bill and the documents linked from its status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillEntry {
    #[serde(rename = "billNumber")]
    pub bill_number: String,
    #[serde(rename = "billLink")]
    pub bill_link: String,
    /// Absolute PDF links. Never empty once persisted.
    #[serde(rename = "pdfLinks")]
    pub document_links: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// DigestBody
// ---------------------------------------------------------------------------

/// A rendered digest ready to hand to a notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestBody {
    pub subject: String,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_roundtrip() {
        for p in Partition::ALL {
            let parsed: Partition = p.to_string().parse().expect("parse partition");
            assert_eq!(parsed, p);
        }
        assert!("Senate".parse::<Partition>().is_err());
    }

    #[test]
    fn partition_serializes_lowercase() {
        let json = serde_json::to_string(&Partition::House).expect("serialize");
        assert_eq!(json, "\"house\"");
    }

    #[test]
    fn amendment_record_wire_names() {
        let record = AmendmentRecord {
            calendar_number: "123".into(),
            lco_number: "LCO-456".into(),
            lco_document_link: "https://cga.ct.gov/lco1".into(),
            bill_number: "HB-1234".into(),
            bill_document_link: "https://cga.ct.gov/bill1".into(),
            date: "01/15/2024".into(),
        };

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["lcoNumber"], "LCO-456");
        assert_eq!(value["calNumber"], "123");
        assert_eq!(value["billLink"], "https://cga.ct.gov/bill1");

        let parsed: AmendmentRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, record);
    }
}
