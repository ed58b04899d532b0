//! Listing-page parsing.
//!
//! A result page is a plain HTML table inside a `print_area` container. The
//! [`ListingDocument`] trait is the seam between the DOM library and the
//! field extraction: anything that can produce result rows (cells plus the
//! first link target) will do, which is how the extractor tests run without
//! HTML at all. [`HtmlListing`] is the `scraper`-backed implementation.

use scraper::{Html, Selector};
use url::Url;

use crate::calendar::{self, RocInstant};

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// A result row did not match the expected shape. Skips that row only.
    #[error("malformed row: {0}")]
    MalformedRow(String),
    /// The listing container is missing entirely. Skips the whole page.
    #[error("listing table not found in page")]
    MissingTable,
}

/// One declaration as normalized from a listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Case number, first token of the subject cell. Natural key.
    pub id: String,
    pub org_name: String,
    pub subject: String,
    pub method: String,
    pub category: String,
    pub declare_date: Option<RocInstant>,
    pub deadline: Option<RocInstant>,
    /// Absent when the budget cell is blank.
    pub budget: Option<i64>,
    /// Absolute link to the declaration, resolved against the search base.
    pub url: String,
}

/// A result row: the cell texts in column order and the first link target.
#[derive(Debug, Clone, Default)]
pub struct ListingRow {
    pub cells: Vec<String>,
    pub href: Option<String>,
}

/// Structured access to a listing page.
pub trait ListingDocument {
    /// Text of the first element with the given tag and attribute value.
    fn find_text(&self, tag: &str, attr: &str, value: &str) -> Option<String>;

    /// Result rows of the listing container, header and footer rows already
    /// excluded. `None` when the container itself is missing.
    fn listing_rows(&self) -> Option<Vec<ListingRow>>;
}

/// `scraper`-backed [`ListingDocument`] over a parsed HTML page.
pub struct HtmlListing {
    doc: Html,
}

impl HtmlListing {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }

    /// The total-result-count element of a search response.
    pub fn result_count(&self) -> Option<i64> {
        self.find_text("span", "class", "T11b")?.trim().parse().ok()
    }
}

impl ListingDocument for HtmlListing {
    fn find_text(&self, tag: &str, attr: &str, value: &str) -> Option<String> {
        let selector = Selector::parse(&format!("{}[{}=\"{}\"]", tag, attr, value)).ok()?;
        let element = self.doc.select(&selector).next()?;
        Some(element.text().collect())
    }

    fn listing_rows(&self) -> Option<Vec<ListingRow>> {
        let container_sel = Selector::parse("div#print_area").ok()?;
        let tr_sel = Selector::parse("tr").ok()?;
        let td_sel = Selector::parse("td").ok()?;
        let link_sel = Selector::parse("a[href]").ok()?;

        let container = self.doc.select(&container_sel).next()?;
        let all_rows: Vec<_> = container.select(&tr_sel).collect();
        // First row is the column header, last row is the pagination footer.
        if all_rows.len() < 2 {
            return Some(Vec::new());
        }
        let rows = all_rows[1..all_rows.len() - 1]
            .iter()
            .map(|tr| ListingRow {
                cells: tr
                    .select(&td_sel)
                    .map(|td| td.text().collect::<String>())
                    .collect(),
                href: tr
                    .select(&link_sel)
                    .find_map(|a| a.value().attr("href"))
                    .map(str::to_string),
            })
            .collect();
        Some(rows)
    }
}

/// Extracts every declaration from a page. A malformed row is reported and
/// skipped without touching the rows around it; only a missing listing table
/// fails the page as a whole.
pub fn extract_declarations(
    doc: &impl ListingDocument,
    base_url: &str,
) -> Result<(Vec<Declaration>, Vec<ExtractError>), ExtractError> {
    let rows = doc.listing_rows().ok_or(ExtractError::MissingTable)?;
    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    for row in &rows {
        match extract_row(row, base_url) {
            Ok(record) => records.push(record),
            Err(err) => row_errors.push(err),
        }
    }
    Ok((records, row_errors))
}

/// Builds one [`Declaration`] from a row, all-or-nothing.
///
/// Column positions are fixed by the portal: 1 organization, 2 subject
/// (leading case number), 4 method, 5 category, 6 declare date, 7 deadline,
/// 8 budget.
pub fn extract_row(row: &ListingRow, base_url: &str) -> Result<Declaration, ExtractError> {
    let href = row
        .href
        .as_deref()
        .ok_or_else(|| ExtractError::MalformedRow("no link in row".into()))?;
    let url = Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map_err(|e| ExtractError::MalformedRow(format!("unresolvable link {}: {}", href, e)))?
        .to_string();

    let subject = collapse_spaces(cell(row, 2)?);
    let id = subject
        .split_whitespace()
        .next()
        .ok_or_else(|| ExtractError::MalformedRow("empty subject cell".into()))?
        .to_string();

    let budget_text = strip_whitespace(cell(row, 8)?);
    let budget = if budget_text.is_empty() {
        None
    } else {
        Some(budget_text.parse().map_err(|_| {
            ExtractError::MalformedRow(format!("unparseable budget {:?}", budget_text))
        })?)
    };

    Ok(Declaration {
        id,
        org_name: strip_whitespace(cell(row, 1)?),
        subject,
        method: strip_whitespace(cell(row, 4)?),
        category: strip_whitespace(cell(row, 5)?),
        declare_date: calendar::from_roc(&collapse_spaces(cell(row, 6)?)),
        deadline: calendar::from_roc(&collapse_spaces(cell(row, 7)?)),
        budget,
        url,
    })
}

fn cell(row: &ListingRow, index: usize) -> Result<&str, ExtractError> {
    row.cells
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ExtractError::MalformedRow(format!("missing cell {}", index)))
}

/// Removes all whitespace, for name-like fields the portal pads freely.
fn strip_whitespace(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Collapses runs of whitespace to single spaces, for free-text fields.
fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
