//! Document link extraction from a bill's detail page.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

/// Links inside the bill status table.
static STATUS_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"table[summary="Status of bills"] tbody tr a[href]"#)
        .expect("static selector")
});

/// Collect every PDF link from the "Status of bills" table.
///
/// Hrefs starting with `/` are resolved against `origin`; anything else is
/// kept as written. Duplicates collapse.
pub fn extract_document_links(markup: &str, origin: &str) -> BTreeSet<String> {
    let doc = Html::parse_document(markup);
    let origin = origin.trim_end_matches('/');

    doc.select(&STATUS_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| is_pdf(href))
        .map(|href| {
            if href.starts_with('/') {
                format!("{origin}{href}")
            } else {
                href.to_string()
            }
        })
        .collect()
}

fn is_pdf(href: &str) -> bool {
    href.to_ascii_lowercase().ends_with(".pdf")
}
