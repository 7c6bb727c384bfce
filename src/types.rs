use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Scrape targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    Tomorrow,
}

impl DateRange {
    /// Value of the `tb_edate` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Tomorrow => "tomorrow",
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static configuration for one sport on the props site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SportTarget {
    pub key: &'static str,
    /// `tb_eg` identifier on the source site.
    pub source_id: u32,
    /// Canonical display name, stamped onto every record.
    pub name: &'static str,
    /// Supported ranges, `Today` before `Tomorrow`.
    pub date_ranges: &'static [DateRange],
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The five positional cells of one props-table row, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub event: String,
    pub event_date: String,
    pub market: String,
    pub betslip_line: String,
    pub odds: String,
    /// Link target of the odds cell; empty when the cell has no link.
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropRecord {
    pub event: String,
    pub event_date: String,
    pub market: String,
    pub betslip_line: String,
    pub converted_betslip_line: String,
    pub odds: String,
    pub source_url: String,
    pub sport: String,
    pub scraped_date_range: DateRange,
    pub scraped_at: DateTime<Utc>,
}

impl PropRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            event: self.event.clone(),
            event_date: self.event_date.clone(),
            market: self.market.clone(),
            betslip_line: self.betslip_line.clone(),
            date_range: self.scraped_date_range,
        }
    }

    /// True when the line normalizer rewrote `betslip_line`.
    pub fn is_converted(&self) -> bool {
        self.converted_betslip_line != self.betslip_line
    }
}

/// Identity of a record within one collection. `sport` is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub event: String,
    pub event_date: String,
    pub market: String,
    pub betslip_line: String,
    pub date_range: DateRange,
}
