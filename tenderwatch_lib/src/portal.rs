//! Client for the e-procurement portal's paginated search protocol.
//!
//! A search is two-phase: a form POST carrying the filters returns a summary
//! page with the total result count, then one GET per `pageIndex` walks the
//! result pages. The portal ties pagination state to the session cookie set
//! by the POST, so each chunk search builds a fresh cookie-holding client
//! and hands it to the [`SearchSession`] for its page requests.

use std::time::Duration;

use reqwest::StatusCode;

use crate::calendar::to_roc;
use crate::chunk::DateChunk;
use crate::extract::HtmlListing;

/// Production search endpoint, query string included.
pub const SEARCH_BASE_URL: &str =
    "http://web.pcc.gov.tw/tps/pss/tender.do?searchMode=common&searchType=basic";

/// Results per page, fixed by the portal.
pub const PAGE_SIZE: i64 = 100;

#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    /// Transport-level failure: the portal could not be reached or the
    /// response body never arrived.
    #[error("portal unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    /// The portal answered with a non-success status.
    #[error("unexpected status {status}")]
    HttpStatus { status: StatusCode },
    /// The response arrived but did not have the expected shape.
    #[error("unexpected portal response: {0}")]
    Format(String),
}

pub struct PortalClient {
    base_url: String,
    timeout: Duration,
}

impl Default for PortalClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalClient {
    /// Client against the production portal.
    pub fn new() -> Self {
        Self::with_base_url(SEARCH_BASE_URL)
    }

    /// Client against a custom search endpoint (full URL including the
    /// `searchMode`/`searchType` query string). Used for testing with
    /// wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// The search endpoint, which listing links also resolve against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues the summary search for one chunk and returns the session to
    /// page through its results.
    pub async fn search(
        &self,
        chunk: &DateChunk,
        org_filter: &str,
        subject_filter: &str,
    ) -> Result<SearchSession, PortalError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()?;

        let roc_start = to_roc(chunk.start, "/");
        let roc_end = to_roc(chunk.end, "/");
        let payload: &[(&str, &str)] = &[
            ("method", "search"),
            ("searchMethod", "true"),
            ("tenderUpdate", ""),
            ("searchTarget", ""),
            ("orgName", org_filter),
            ("orgId", ""),
            ("hid_1", "1"),
            ("tenderName", subject_filter),
            ("tenderId", ""),
            ("tenderType", "tenderDeclaration"),
            ("tenderWay", "1,2,3,4,5,6,7,10,12"),
            ("tenderDateRadio", "on"),
            ("tenderStartDateStr", &roc_start),
            ("tenderEndDateStr", &roc_end),
            ("tenderStartDate", &roc_start),
            ("tenderEndDate", &roc_end),
            ("isSpdt", "N"),
            ("proctrgCate", ""),
            ("btnQuery", "查詢"),
            ("hadUpdated", ""),
        ];

        let resp = http.post(&self.base_url).form(payload).send().await?;
        if !resp.status().is_success() {
            return Err(PortalError::HttpStatus {
                status: resp.status(),
            });
        }
        let html = resp.text().await?;

        let record_count = HtmlListing::parse(&html)
            .result_count()
            .ok_or_else(|| PortalError::Format("result count element not found".into()))?;
        tracing::debug!(record_count, "search established");

        Ok(SearchSession {
            http,
            base_url: self.base_url.clone(),
            record_count,
        })
    }
}

/// An established search: the cookie session from the summary POST plus the
/// result count it reported.
pub struct SearchSession {
    http: reqwest::Client,
    base_url: String,
    record_count: i64,
}

impl SearchSession {
    pub fn record_count(&self) -> i64 {
        self.record_count
    }

    /// Number of result pages at the portal's fixed page size.
    pub fn page_count(&self) -> i64 {
        (self.record_count + PAGE_SIZE - 1) / PAGE_SIZE
    }

    /// URL of one result page; also what the page-error log records.
    pub fn page_url(&self, page_index: i64) -> String {
        format!(
            "{}&method=search&isSpdt=&pageIndex={}",
            self.base_url, page_index
        )
    }

    /// Fetches one result page (1-indexed) within this session.
    pub async fn fetch_page(&self, page_index: i64) -> Result<String, PortalError> {
        let resp = self.http.get(self.page_url(page_index)).send().await?;
        if !resp.status().is_success() {
            return Err(PortalError::HttpStatus {
                status: resp.status(),
            });
        }
        Ok(resp.text().await?)
    }
}
