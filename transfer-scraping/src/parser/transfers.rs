use indexmap::IndexMap;
use scraper::{ElementRef, Html};
use thiserror::Error;
use transfer_scraping_utils::selector;

use crate::{api::RawPage, schema::Movement};

/// Label under which the player id (taken from the profile href, not from any
/// column of its own) is stored in a [`RawRow`].
pub const PLAYER_ID_LABEL: &str = "Player ID";

/// The dealing-country flag cell has no `<th>` of its own; it sits between
/// the dealing club and the fee, so this label is spliced in before the last
/// header.
pub const COUNTRY_LABEL: &str = "Country";

/// One transfer table row, keyed by the page's own column labels.
///
/// Cell values are untyped strings exactly as rendered; a missing cell is an
/// empty string, not an absent key.  Label text and ordering vary across
/// historical page layouts, which is why this is a mapping rather than a
/// positional structure.
#[derive(Clone, PartialEq, Debug)]
pub struct RawRow {
    pub movement: Movement,
    pub cells: IndexMap<String, String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ExtractionError {
    /// The page contains no recognizable transfer table at all.  This means
    /// the layout has changed; the page should be quarantined for manual
    /// review rather than silently producing empty output.
    #[error("No transfer table recognized on the page")]
    NoTransferTables,
}

/// Parses every transfer table on a fetched club page into raw rows.
///
/// Non-transfer tables, header rows, and "no transfers" placeholder rows are
/// filtered, not errors.
pub fn extract(page: &RawPage) -> Result<Vec<RawRow>, ExtractionError> {
    let html = Html::parse_document(&page.body);
    let mut rows = Vec::new();
    let mut tables_recognized = 0;

    for table in html.select(selector!("div.responsive-table table")) {
        let headers: Vec<String> = table
            .select(selector!("th"))
            .map(|th| th.text().collect::<String>().trim().to_owned())
            .collect();
        // The first column label names the movement; any other table
        // (standings, ads) is skipped.
        let movement = match headers.first().map(String::as_str) {
            Some("In") => Movement::In,
            Some("Out") => Movement::Out,
            _ => continue,
        };
        tables_recognized += 1;

        let mut labels = headers;
        labels.insert(labels.len() - 1, COUNTRY_LABEL.to_owned());

        for tr in table.select(selector!("tbody > tr")) {
            let tds: Vec<ElementRef> = tr.select(selector!("td")).collect();
            // A window with no transfers renders a single-cell placeholder row.
            if tds.len() <= 1 {
                continue;
            }
            let mut cells = IndexMap::new();
            for (i, label) in labels.iter().enumerate() {
                let value = match tds.get(i) {
                    Some(td) => parse_cell(*td, &mut cells),
                    None => String::new(),
                };
                cells.insert(label.clone(), value);
            }
            rows.push(RawRow { movement, cells });
        }
    }

    if tables_recognized == 0 {
        return Err(ExtractionError::NoTransferTables);
    }
    Ok(rows)
}

/// Cell contents are nested differently depending on what the cell holds:
/// player cells hide the profile link in a span, flag cells carry their value
/// in the image title, everything else is plain text.
fn parse_cell(td: ElementRef, cells: &mut IndexMap<String, String>) -> String {
    if let Some(profile_link) = td.select(selector!("span.hide-for-small a")).next() {
        if let Some(id) = profile_link
            .value()
            .attr("href")
            .and_then(|href| href.rsplit('/').next())
        {
            cells.insert(PLAYER_ID_LABEL.to_owned(), id.to_owned());
        }
        return profile_link.text().collect::<String>().trim().to_owned();
    }
    if let Some(flag) = td.select(selector!("img.flaggenrahmen")).next() {
        return flag.value().attr("title").unwrap_or_default().trim().to_owned();
    }
    td.text().collect::<String>().trim().to_owned()
}
