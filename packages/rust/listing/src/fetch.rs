//! HTTP transport for listing and bill detail pages.

use std::time::Duration;

use amendwatch_shared::{AmendWatchError, Partition, Result, SourceConfig};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("AmendWatch/", env!("CARGO_PKG_VERSION"));

/// Sort order the listing endpoints expect: by date, ascending.
const LISTING_FORM: [(&str, &str); 2] = [("optSortby", "D"), ("optSortOrder", "Asc")];

/// Source of raw amendment listing markup.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self, partition: Partition) -> Result<String>;
}

/// Source of raw bill detail page markup.
#[async_trait]
pub trait BillPageSource: Send + Sync {
    async fn fetch_bill_page(&self, url: &str) -> Result<String>;
}

/// reqwest-backed implementation of both sources.
pub struct HttpSource {
    client: Client,
    config: SourceConfig,
}

impl HttpSource {
    /// Build the HTTP client from `[source]` settings.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| AmendWatchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Origin used to resolve relative links.
    pub fn origin(&self) -> &str {
        &self.config.origin
    }

    async fn read_body(response: reqwest::Response, url: &str) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(AmendWatchError::Transport(format!("{url}: HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| AmendWatchError::Transport(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl ListingSource for HttpSource {
    #[instrument(skip_all, fields(%partition))]
    async fn fetch_listing(&self, partition: Partition) -> Result<String> {
        let url = self.config.listing_url(partition);
        debug!(%url, "fetching listing");

        let response = self
            .client
            .post(&url)
            .form(&LISTING_FORM)
            .send()
            .await
            .map_err(|e| AmendWatchError::Transport(format!("{url}: {e}")))?;

        Self::read_body(response, &url).await
    }
}

#[async_trait]
impl BillPageSource for HttpSource {
    #[instrument(skip_all, fields(%url))]
    async fn fetch_bill_page(&self, url: &str) -> Result<String> {
        debug!("fetching bill page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AmendWatchError::Transport(format!("{url}: {e}")))?;

        Self::read_body(response, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpSource {
        HttpSource::new(SourceConfig {
            origin: server.uri(),
            timeout_secs: 5,
            ..SourceConfig::default()
        })
        .expect("build client")
    }

    #[tokio::test]
    async fn listing_posts_sort_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/asp/CGAAmendProc/CGAHouseAmendRptDisp.asp"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("optSortby=D"))
            .and(body_string_contains("optSortOrder=Asc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .expect(1)
            .mount(&server)
            .await;

        let source = source_for(&server);
        let body = source
            .fetch_listing(Partition::House)
            .await
            .expect("fetch house listing");
        assert_eq!(body, "<table></table>");
    }

    #[tokio::test]
    async fn listing_error_status_is_transport_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/asp/CGAAmendProc/CGASenateAmendRptDisp.asp"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.fetch_listing(Partition::Senate).await.unwrap_err();
        assert!(matches!(err, AmendWatchError::Transport(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn bill_page_is_fetched_with_get() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bill2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>bill</html>"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let body = source
            .fetch_bill_page(&format!("{}/bill2", server.uri()))
            .await
            .expect("fetch bill page");
        assert!(body.contains("bill"));
    }
}
