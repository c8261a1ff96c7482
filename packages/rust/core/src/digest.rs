//! HTML digest of newly discovered amendments.

use std::fmt::Write;

use amendwatch_shared::{AmendmentRecord, DigestBody, Partition};

/// Render the digest for one partition. Pure and deterministic.
pub fn render(new_records: &[AmendmentRecord], partition: Partition) -> DigestBody {
    let subject = format!("New {partition} amendments");

    if new_records.is_empty() {
        return DigestBody {
            subject,
            html: format!("<body><h1>No new {partition} amendments</h1></body>"),
        };
    }

    let mut html = String::new();
    html.push_str("<body>\n");
    let _ = writeln!(html, "  <h1>New {partition} amendments</h1>");
    html.push_str("  <table>\n");
    html.push_str("    <thead>\n");
    html.push_str("      <tr><th>Cal #</th><th>LCO #</th><th>Bill #</th><th>Date</th></tr>\n");
    html.push_str("    </thead>\n");
    html.push_str("    <tbody>\n");
    for record in new_records {
        let _ = writeln!(
            html,
            "      <tr style=\"border: 1px solid black\"><td>{}</td><td><a href=\"{}\">{}</a></td><td><a href=\"{}\">{}</a></td><td>{}</td></tr>",
            escape(&record.calendar_number),
            escape(&record.lco_document_link),
            escape(&record.lco_number),
            escape(&record.bill_document_link),
            escape(&record.bill_number),
            escape(&record.date),
        );
    }
    html.push_str("    </tbody>\n");
    html.push_str("  </table>\n");
    html.push_str("</body>");

    DigestBody { subject, html }
}

/// Escape text for element content and double-quoted attributes.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
