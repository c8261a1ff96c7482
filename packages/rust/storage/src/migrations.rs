//! SQL migration definitions for the AmendWatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: senate_amendments, house_amendments, bills",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One amendment table per partition; lco_number is unique within a partition only
CREATE TABLE IF NOT EXISTS senate_amendments (
    lco_number        TEXT PRIMARY KEY,
    calendar_number   TEXT NOT NULL,
    lco_document_link TEXT NOT NULL,
    bill_number       TEXT NOT NULL,
    bill_link         TEXT NOT NULL,
    date              TEXT NOT NULL,
    first_seen_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS house_amendments (
    lco_number        TEXT PRIMARY KEY,
    calendar_number   TEXT NOT NULL,
    lco_document_link TEXT NOT NULL,
    bill_number       TEXT NOT NULL,
    bill_link         TEXT NOT NULL,
    date              TEXT NOT NULL,
    first_seen_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_senate_amendments_bill ON senate_amendments(bill_number);
CREATE INDEX IF NOT EXISTS idx_house_amendments_bill ON house_amendments(bill_number);

-- Bills shared by both partitions
CREATE TABLE IF NOT EXISTS bills (
    bill_number         TEXT PRIMARY KEY,
    bill_link           TEXT NOT NULL,
    document_links_json TEXT NOT NULL,
    resolved_at         TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
