//! Circuit reference table
//!
//! Scrapes the table captioned "Formula One circuits" from a reference page.
//! A successful scrape refreshes a local delimited copy; when the page cannot
//! be fetched or parsed, that copy is read instead.

use std::path::Path;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ReferenceConfig;
use crate::error::{Error, Result};
use crate::fetch::FetchClient;
use crate::flatten::Record;
use crate::table::Table;

/// Caption identifying the circuits table
pub const CIRCUITS_CAPTION: &str = "Formula One circuits";

/// Column holding map thumbnails, which carries no text
const MAP_COLUMN: &str = "Map";

/// Fetch the circuits table, falling back to the local copy
///
/// # Errors
/// The local-file error when both the page and the local copy are unusable
pub async fn fetch_wiki_circuits(
    client: &FetchClient,
    reference: &ReferenceConfig,
    sep: char,
) -> Result<Table> {
    let scraped = match client.fetch_text(&reference.url).await {
        Ok(html) => parse_circuits_html(&html),
        Err(e) => Err(e),
    };

    match scraped {
        Ok(table) => {
            info!(url = %reference.url, rows = table.len(), "Scraped circuit reference table");
            if let Err(e) = table.write_delimited(&reference.local_file, sep) {
                warn!(path = %reference.local_file.display(), error = %e, "Could not refresh local copy");
            }
            Ok(table)
        }
        Err(e) => {
            warn!(url = %reference.url, error = %e, "Reference page unusable, reading local copy");
            read_local(&reference.local_file, sep)
        }
    }
}

fn read_local(path: &Path, sep: char) -> Result<Table> {
    let table = Table::read_delimited(path, sep)?.remove_unnamed_columns();
    info!(path = %path.display(), rows = table.len(), "Loaded circuit reference table from local copy");
    Ok(table)
}

/// Extract the circuits table from a reference page
///
/// The first row with header cells names the columns; every later row with
/// cells becomes a record. The `Map` column is dropped.
///
/// # Errors
/// [`Error::Parse`] when no table carries the circuits caption
pub fn parse_circuits_html(html: &str) -> Result<Table> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let caption_selector = selector("caption")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("th, td")?;

    let table = document
        .select(&table_selector)
        .find(|table| {
            table
                .select(&caption_selector)
                .any(|caption| text_of(caption).contains(CIRCUITS_CAPTION))
        })
        .ok_or_else(|| Error::Parse(format!("no table captioned '{CIRCUITS_CAPTION}'")))?;

    let mut rows = table.select(&row_selector);
    let headers: Vec<String> = rows
        .by_ref()
        .map(|row| row.select(&header_selector).map(text_of).collect::<Vec<_>>())
        .find(|headers| !headers.is_empty())
        .ok_or_else(|| Error::Parse("circuits table has no header row".into()))?;

    let records: Vec<Record> = rows
        .map(|row| row.select(&cell_selector).map(text_of).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .map(|cells| {
            let mut cells = cells.into_iter();
            headers
                .iter()
                .filter_map(|header| {
                    let cell = cells.next().unwrap_or_default();
                    (header != MAP_COLUMN).then(|| (header.clone(), Value::String(cell)))
                })
                .collect()
        })
        .collect();

    Ok(Table::from_records(records))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("selector '{css}': {e}")))
}

/// Element text with whitespace collapsed
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
