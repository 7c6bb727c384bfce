//! Read-only views over a snapshot's records. Nothing here mutates or re-sorts
//! the collection; "top" always means "first seen during aggregation".

use serde::Serialize;

use crate::config::SUMMARY_MARKET_SAMPLE;
use crate::types::{DateRange, PropRecord};

/// Case-insensitive exact match on `sport`.
pub fn filter_by_sport<'a>(records: &'a [PropRecord], sport: &str) -> Vec<&'a PropRecord> {
    let wanted = sport.to_lowercase();
    records
        .iter()
        .filter(|r| r.sport.to_lowercase() == wanted)
        .collect()
}

#[derive(Debug, Serialize)]
pub struct SportGroup<'a> {
    pub sport: &'a str,
    pub records: Vec<&'a PropRecord>,
}

/// Group by sport in first-seen order and keep the first `limit` of each group.
pub fn top_per_sport(records: &[PropRecord], limit: usize) -> Vec<SportGroup<'_>> {
    let mut groups: Vec<SportGroup<'_>> = Vec::new();
    for record in records {
        let idx = match groups.iter().position(|g| g.sport == record.sport) {
            Some(idx) => idx,
            None => {
                groups.push(SportGroup { sport: &record.sport, records: Vec::new() });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];
        if group.records.len() < limit {
            group.records.push(record);
        }
    }
    groups
}

#[derive(Debug, Serialize)]
pub struct SportSummary<'a> {
    pub sport: &'a str,
    pub count: usize,
    /// Up to 10 distinct markets.
    pub sample_markets: Vec<&'a str>,
    pub date_ranges: Vec<DateRange>,
}

#[derive(Debug, Serialize)]
pub struct PropsSummary<'a> {
    pub total_props: usize,
    pub sports_count: usize,
    pub sports: Vec<SportSummary<'a>>,
}

pub fn summary(records: &[PropRecord]) -> PropsSummary<'_> {
    let mut sports: Vec<SportSummary<'_>> = Vec::new();
    for record in records {
        let idx = match sports.iter().position(|s| s.sport == record.sport) {
            Some(idx) => idx,
            None => {
                sports.push(SportSummary {
                    sport: &record.sport,
                    count: 0,
                    sample_markets: Vec::new(),
                    date_ranges: Vec::new(),
                });
                sports.len() - 1
            }
        };
        let entry = &mut sports[idx];
        entry.count += 1;
        if entry.sample_markets.len() < SUMMARY_MARKET_SAMPLE
            && !entry.sample_markets.contains(&record.market.as_str())
        {
            entry.sample_markets.push(&record.market);
        }
        if !entry.date_ranges.contains(&record.scraped_date_range) {
            entry.date_ranges.push(record.scraped_date_range);
            entry.date_ranges.sort();
        }
    }

    PropsSummary {
        total_props: records.len(),
        sports_count: sports.len(),
        sports,
    }
}

#[derive(Debug, Serialize)]
pub struct ConvertedLines<'a> {
    pub records: Vec<&'a PropRecord>,
    pub total: usize,
    /// converted / total, 0.0 for an empty collection.
    pub rate: f64,
}

impl ConvertedLines<'_> {
    /// `"37.5%"`, or `"0%"` when there is nothing to divide by.
    pub fn rate_label(&self) -> String {
        if self.total == 0 {
            "0%".to_string()
        } else {
            format!("{:.1}%", self.rate * 100.0)
        }
    }
}

/// Records whose line was rewritten by the normalizer.
pub fn converted_only(records: &[PropRecord]) -> ConvertedLines<'_> {
    let converted: Vec<&PropRecord> = records.iter().filter(|r| r.is_converted()).collect();
    let total = records.len();
    let rate = if total == 0 {
        0.0
    } else {
        converted.len() as f64 / total as f64
    };
    ConvertedLines { records: converted, total, rate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_line;
    use chrono::Utc;

    fn rec(sport: &str, event: &str, market: &str, line: &str, range: DateRange) -> PropRecord {
        PropRecord {
            event: event.to_string(),
            event_date: "Today".to_string(),
            market: market.to_string(),
            betslip_line: line.to_string(),
            converted_betslip_line: normalize_line(line),
            odds: "+100".to_string(),
            source_url: String::new(),
            sport: sport.to_string(),
            scraped_date_range: range,
            scraped_at: Utc::now(),
        }
    }

    fn sample() -> Vec<PropRecord> {
        vec![
            rec("NBA", "e1", "Points", "1+", DateRange::Today),
            rec("MLB", "e2", "Hits", "Over 0.5", DateRange::Today),
            rec("NBA", "e3", "Rebounds", "Over 7.5", DateRange::Tomorrow),
            rec("NBA", "e4", "Points", "3+", DateRange::Today),
            rec("MLB", "e5", "Home Runs", "1+", DateRange::Tomorrow),
        ]
    }

    #[test]
    fn filter_is_case_insensitive_exact() {
        let records = sample();
        let nba = filter_by_sport(&records, "nba");
        assert_eq!(nba.len(), 3);
        assert!(filter_by_sport(&records, "NB").is_empty());

        let mut ncaa = sample();
        ncaa.push(rec("NCAA Football", "e6", "Yards", "Over 50.5", DateRange::Today));
        assert_eq!(filter_by_sport(&ncaa, "ncaa football").len(), 1);
    }

    #[test]
    fn top_per_sport_keeps_prefix_in_first_seen_order() {
        let records = sample();
        let groups = top_per_sport(&records, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sport, "NBA");
        assert_eq!(groups[1].sport, "MLB");

        let nba: Vec<&str> = groups[0].records.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(nba, vec!["e1", "e3"]);
        assert!(groups.iter().all(|g| g.records.len() <= 2));
    }

    #[test]
    fn top_per_sport_zero_limit_keeps_groups_empty() {
        let records = sample();
        let groups = top_per_sport(&records, 0);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.records.is_empty()));
    }

    #[test]
    fn summary_counts_markets_and_ranges() {
        let records = sample();
        let s = summary(&records);
        assert_eq!(s.total_props, 5);
        assert_eq!(s.sports_count, 2);

        let nba = &s.sports[0];
        assert_eq!(nba.count, 3);
        assert_eq!(nba.sample_markets.len(), 2);
        assert!(nba.sample_markets.contains(&"Points"));
        assert_eq!(nba.date_ranges, vec![DateRange::Today, DateRange::Tomorrow]);
    }

    #[test]
    fn summary_caps_market_sample() {
        let records: Vec<PropRecord> = (0..15)
            .map(|i| rec("NHL", "e", &format!("Market {i}"), "1+", DateRange::Today))
            .collect();
        let s = summary(&records);
        assert_eq!(s.sports[0].count, 15);
        assert_eq!(s.sports[0].sample_markets.len(), SUMMARY_MARKET_SAMPLE);
    }

    #[test]
    fn converted_only_reports_rate() {
        let records = sample();
        let converted = converted_only(&records);
        assert_eq!(converted.records.len(), 3);
        assert_eq!(converted.total, 5);
        assert_eq!(converted.rate_label(), "60.0%");
    }

    #[test]
    fn converted_only_on_empty_collection_is_zero_percent() {
        let converted = converted_only(&[]);
        assert!(converted.records.is_empty());
        assert_eq!(converted.rate, 0.0);
        assert_eq!(converted.rate_label(), "0%");
    }
}
