use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::MOST_BET_VIEW;
use crate::error::{AppError, Result};
use crate::types::{DateRange, RawRow, SportTarget};

/// Rows extracted from one props page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropsPage {
    pub rows: Vec<RawRow>,
    /// Rows dropped for having fewer than 5 cells.
    pub skipped_rows: usize,
    /// False when the page had no props table, or one with no body rows. Not an error.
    pub table_found: bool,
}

/// Something that can produce the props rows for one (sport, date range) target.
#[async_trait]
pub trait PropSource: Send + Sync {
    async fn extract(&self, target: &SportTarget, range: DateRange) -> Result<PropsPage>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches the "most bet" player props page for a target and parses its table.
pub struct HttpPropSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPropSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }
}

#[async_trait]
impl PropSource for HttpPropSource {
    async fn extract(&self, target: &SportTarget, range: DateRange) -> Result<PropsPage> {
        let url = props_url(&self.base_url, target, range);
        debug!(sport = target.name, date_range = %range, url = %url, "Fetching props page");

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await?;

        Ok(parse_props_page(&body))
    }
}

/// `{base}?tb_eg={source_id}&tb_edate={range}&tb_view=2`
pub fn props_url(base_url: &str, target: &SportTarget, range: DateRange) -> String {
    format!(
        "{}?tb_eg={}&tb_edate={}&tb_view={}",
        base_url,
        target.source_id,
        range.as_str(),
        MOST_BET_VIEW
    )
}

// ---------------------------------------------------------------------------
// Table parsing
// ---------------------------------------------------------------------------

struct TableSelectors {
    table: Selector,
    tbody: Selector,
    tr: Selector,
    td: Selector,
    link: Selector,
}

impl TableSelectors {
    fn new() -> Self {
        Self {
            table: Selector::parse("table.tb_pp_table").expect("valid table selector"),
            tbody: Selector::parse("tbody").expect("valid tbody selector"),
            tr: Selector::parse("tr").expect("valid tr selector"),
            td: Selector::parse("td").expect("valid td selector"),
            link: Selector::parse("a").expect("valid link selector"),
        }
    }
}

/// Parse a full props page. A page without the props table yields no rows.
///
/// html5ever wraps `<tr>` rows written directly under `<table>` in a
/// synthesised `<tbody>`, so such tables parse like ones with an explicit
/// body. Only a table with no body rows at all (empty, or `<thead>` only)
/// takes the no-tbody branch.
pub fn parse_props_page(html: &str) -> PropsPage {
    let sel = TableSelectors::new();
    let document = Html::parse_document(html);

    let Some(table) = document.select(&sel.table).next() else {
        debug!("No props table on page");
        return PropsPage::default();
    };
    let Some(tbody) = table.select(&sel.tbody).next() else {
        debug!("Props table has no body rows");
        return PropsPage::default();
    };

    let mut page = PropsPage { table_found: true, ..PropsPage::default() };
    for row in tbody.select(&sel.tr) {
        match parse_row(row, &sel) {
            Ok(raw) => page.rows.push(raw),
            Err(e) => {
                debug!("Skipping props row: {e}");
                page.skipped_rows += 1;
            }
        }
    }
    page
}

fn parse_row(row: ElementRef<'_>, sel: &TableSelectors) -> Result<RawRow> {
    let cells: Vec<ElementRef<'_>> = row.select(&sel.td).collect();
    if cells.len() < 5 {
        return Err(AppError::RowShape { cells: cells.len() });
    }

    let odds_cell = cells[4];
    let (odds, source_url) = match odds_cell.select(&sel.link).next() {
        Some(link) => (
            element_text(link),
            link.value().attr("href").unwrap_or("").to_string(),
        ),
        None => (element_text(odds_cell), String::new()),
    };

    Ok(RawRow {
        event: element_text(cells[0]),
        event_date: element_text(cells[1]),
        market: element_text(cells[2]),
        betslip_line: element_text(cells[3]),
        odds,
        source_url,
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="tb_pp_table">
          <thead><tr><th>Event</th><th>Date</th><th>Market</th><th>Line</th><th>Odds</th></tr></thead>
          <tbody>
            <tr>
              <td> Yankees @ Red Sox </td><td>Today 7:05PM</td><td>Hits</td><td>1+</td>
              <td><a href="https://sportsbook.example/bet?id=1"> -150 </a></td>
            </tr>
            <tr><td>only</td><td>three</td><td>cells</td></tr>
            <tr>
              <td>Mets @ Braves</td><td>Today 7:20PM</td><td>Strikeouts</td><td>Over 5.5</td>
              <td>+110</td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn parses_rows_and_skips_short_ones() {
        let page = parse_props_page(PAGE);
        assert!(page.table_found);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.skipped_rows, 1);

        let first = &page.rows[0];
        assert_eq!(first.event, "Yankees @ Red Sox");
        assert_eq!(first.event_date, "Today 7:05PM");
        assert_eq!(first.market, "Hits");
        assert_eq!(first.betslip_line, "1+");
        assert_eq!(first.odds, "-150");
        assert_eq!(first.source_url, "https://sportsbook.example/bet?id=1");
    }

    #[test]
    fn odds_cell_without_link_falls_back_to_text() {
        let page = parse_props_page(PAGE);
        let second = &page.rows[1];
        assert_eq!(second.odds, "+110");
        assert_eq!(second.source_url, "");
    }

    #[test]
    fn link_without_href_gives_empty_url() {
        let html = r#"<table class="tb_pp_table"><tbody>
            <tr><td>a</td><td>b</td><td>c</td><td>2+</td><td><a>+200</a></td></tr>
        </tbody></table>"#;
        let page = parse_props_page(html);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].odds, "+200");
        assert_eq!(page.rows[0].source_url, "");
    }

    #[test]
    fn missing_table_is_empty_not_error() {
        let page = parse_props_page("<html><body><p>No props today</p></body></html>");
        assert_eq!(page, PropsPage::default());
        assert!(!page.table_found);
    }

    #[test]
    fn bare_rows_get_an_implied_tbody() {
        let html = r#"<table class="tb_pp_table">
            <tr><td>A @ B</td><td>Today</td><td>Points</td><td>2+</td><td>-120</td></tr>
        </table>"#;
        let page = parse_props_page(html);
        assert!(page.table_found);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].betslip_line, "2+");
    }

    #[test]
    fn header_only_table_counts_as_missing() {
        let html = r#"<table class="tb_pp_table"><thead>
            <th>Event</th><th>Date</th><th>Market</th><th>Line</th><th>Odds</th>
        </thead></table>"#;
        let page = parse_props_page(html);
        assert!(!page.table_found);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn other_tables_are_ignored() {
        let html = r#"<table class="standings"><tbody>
            <tr><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td></tr>
        </tbody></table>"#;
        assert!(parse_props_page(html).rows.is_empty());
    }

    #[test]
    fn url_encodes_target_range_and_view() {
        let target = SportTarget {
            key: "nba",
            source_id: 42648,
            name: "NBA",
            date_ranges: &[DateRange::Today, DateRange::Tomorrow],
        };
        assert_eq!(
            props_url("https://props.example/", &target, DateRange::Tomorrow),
            "https://props.example/?tb_eg=42648&tb_edate=tomorrow&tb_view=2"
        );
    }
}
