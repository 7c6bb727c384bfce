use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::latency::LatencyStats;
use crate::error::{AppError, Result};
use crate::extractor::{PropSource, PropsPage};
use crate::normalizer::normalize_line;
use crate::types::{DateRange, DedupKey, PropRecord, RawRow, SportTarget};

/// Counters for one aggregator run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AggregateStats {
    pub targets_total: usize,
    /// Fetch/HTTP/timeout failures; these contribute zero rows.
    pub targets_failed: usize,
    /// Pages fetched fine but without a props table.
    pub targets_without_table: usize,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub duplicates: usize,
    /// (sport, records kept), in target order.
    pub per_sport: Vec<(String, usize)>,
}

/// Walks every sport × date range target and builds one deduplicated collection.
pub struct Aggregator {
    source: Arc<dyn PropSource>,
    targets: &'static [SportTarget],
    fetch_timeout: Duration,
    concurrency: usize,
    latency: Arc<LatencyStats>,
}

impl Aggregator {
    pub fn new(
        source: Arc<dyn PropSource>,
        targets: &'static [SportTarget],
        fetch_timeout: Duration,
        concurrency: usize,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self {
            source,
            targets,
            fetch_timeout,
            concurrency: concurrency.max(1),
            latency,
        }
    }

    pub async fn run(&self) -> Vec<PropRecord> {
        self.run_with_stats().await.0
    }

    /// Fetch all targets (bounded concurrency, results kept in target order),
    /// then normalize and deduplicate sequentially.
    pub async fn run_with_stats(&self) -> (Vec<PropRecord>, AggregateStats) {
        let jobs = scrape_plan(self.targets);
        let mut stats = AggregateStats {
            targets_total: jobs.len(),
            ..AggregateStats::default()
        };

        let pages: Vec<(SportTarget, DateRange, Result<PropsPage>, DateTime<Utc>)> =
            stream::iter(jobs)
                .map(|(target, range)| async move {
                    let result = self.fetch_target(&target, range).await;
                    (target, range, result, Utc::now())
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut records: Vec<PropRecord> = Vec::new();
        let mut seen: HashSet<DedupKey> = HashSet::new();

        for (target, range, result, scraped_at) in pages {
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    warn!(sport = target.name, date_range = %range, "Error scraping target: {e}");
                    stats.targets_failed += 1;
                    continue;
                }
            };

            if !page.table_found {
                info!(sport = target.name, date_range = %range, "No props table found");
                stats.targets_without_table += 1;
            }
            stats.rows_seen += page.rows.len() + page.skipped_rows;
            stats.rows_skipped += page.skipped_rows;

            let mut kept = 0usize;
            for raw in page.rows {
                let record = build_record(raw, &target, range, scraped_at);
                if seen.insert(record.dedup_key()) {
                    records.push(record);
                    kept += 1;
                } else {
                    debug!(
                        sport = target.name,
                        "Skipping duplicate: {} - {}",
                        record.market,
                        record.betslip_line,
                    );
                    stats.duplicates += 1;
                }
            }

            match stats.per_sport.last_mut() {
                Some((sport, count)) if sport.as_str() == target.name => *count += kept,
                _ => stats.per_sport.push((target.name.to_string(), kept)),
            }
        }

        for (sport, count) in &stats.per_sport {
            info!(sport = %sport, props = count, "Total props found for {sport}: {count}");
        }
        info!(
            total = records.len(),
            targets = stats.targets_total,
            failed = stats.targets_failed,
            no_table = stats.targets_without_table,
            skipped_rows = stats.rows_skipped,
            duplicates = stats.duplicates,
            "Total unique props scraped: {}",
            records.len(),
        );

        (records, stats)
    }

    async fn fetch_target(&self, target: &SportTarget, range: DateRange) -> Result<PropsPage> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.fetch_timeout, self.source.extract(target, range))
            .await
            .unwrap_or(Err(AppError::Timeout(self.fetch_timeout)));
        self.latency.record(started.elapsed());
        result
    }
}

/// Ordered (target, range) pairs: table order, `Today` before `Tomorrow`.
pub fn scrape_plan(targets: &[SportTarget]) -> Vec<(SportTarget, DateRange)> {
    targets
        .iter()
        .flat_map(|target| {
            let mut ranges = target.date_ranges.to_vec();
            ranges.sort();
            ranges.dedup();
            ranges.into_iter().map(move |range| (*target, range))
        })
        .collect()
}

fn build_record(
    raw: RawRow,
    target: &SportTarget,
    range: DateRange,
    scraped_at: DateTime<Utc>,
) -> PropRecord {
    let converted_betslip_line = normalize_line(&raw.betslip_line);
    PropRecord {
        event: raw.event,
        event_date: raw.event_date,
        market: raw.market,
        betslip_line: raw.betslip_line,
        converted_betslip_line,
        odds: raw.odds,
        source_url: raw.source_url,
        sport: target.name.to_string(),
        scraped_date_range: range,
        scraped_at,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const TEST_TARGETS: &[SportTarget] = &[
        SportTarget {
            key: "nba",
            source_id: 1,
            name: "NBA",
            date_ranges: &[DateRange::Tomorrow, DateRange::Today],
        },
        SportTarget {
            key: "mls",
            source_id: 2,
            name: "MLS",
            date_ranges: &[DateRange::Today],
        },
    ];

    pub(crate) enum Canned {
        Page(PropsPage),
        Fail,
        Hang,
    }

    /// In-memory source keyed by (sport key, range); missing keys yield an empty page.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pages: HashMap<(&'static str, DateRange), Canned>,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn with(mut self, key: &'static str, range: DateRange, canned: Canned) -> Self {
            self.pages.insert((key, range), canned);
            self
        }
    }

    #[async_trait]
    impl PropSource for FakeSource {
        async fn extract(&self, target: &SportTarget, range: DateRange) -> Result<PropsPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.pages.get(&(target.key, range)) {
                Some(Canned::Page(page)) => Ok(page.clone()),
                Some(Canned::Fail) => Err(AppError::Status(503)),
                Some(Canned::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(PropsPage::default())
                }
                None => Ok(PropsPage::default()),
            }
        }
    }

    pub(crate) fn row(event: &str, market: &str, line: &str) -> RawRow {
        RawRow {
            event: event.to_string(),
            event_date: "Today 7:00PM".to_string(),
            market: market.to_string(),
            betslip_line: line.to_string(),
            odds: "-110".to_string(),
            source_url: String::new(),
        }
    }

    pub(crate) fn page(rows: Vec<RawRow>) -> Canned {
        Canned::Page(PropsPage { rows, skipped_rows: 0, table_found: true })
    }

    fn aggregator(source: FakeSource, concurrency: usize) -> Aggregator {
        Aggregator::new(
            Arc::new(source),
            TEST_TARGETS,
            Duration::from_millis(200),
            concurrency,
            Arc::new(LatencyStats::new()),
        )
    }

    #[test]
    fn plan_orders_today_before_tomorrow() {
        let plan: Vec<_> = scrape_plan(TEST_TARGETS)
            .into_iter()
            .map(|(t, r)| (t.key, r))
            .collect();
        assert_eq!(
            plan,
            vec![
                ("nba", DateRange::Today),
                ("nba", DateRange::Tomorrow),
                ("mls", DateRange::Today),
            ]
        );
    }

    #[tokio::test]
    async fn normalizes_and_stamps_records() {
        let source = FakeSource::default()
            .with("nba", DateRange::Today, page(vec![row("A @ B", "Points", "2+")]));
        let (records, stats) = aggregator(source, 1).run_with_stats().await;

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.betslip_line, "2+");
        assert_eq!(r.converted_betslip_line, "Over 1.5");
        assert_eq!(r.sport, "NBA");
        assert_eq!(r.scraped_date_range, DateRange::Today);
        assert_eq!(stats.targets_total, 3);
        assert_eq!(stats.per_sport, vec![("NBA".to_string(), 1), ("MLS".to_string(), 0)]);
    }

    #[tokio::test]
    async fn duplicates_dropped_across_targets_but_not_across_ranges() {
        let dup = row("A @ B", "Points", "10+");
        let source = FakeSource::default()
            .with("nba", DateRange::Today, page(vec![dup.clone(), dup.clone()]))
            .with("nba", DateRange::Tomorrow, page(vec![dup.clone()]))
            // same key as the NBA/today row, different sport label: still a duplicate
            .with("mls", DateRange::Today, page(vec![dup.clone()]));
        let (records, stats) = aggregator(source, 2).run_with_stats().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].scraped_date_range, DateRange::Today);
        assert_eq!(records[1].scraped_date_range, DateRange::Tomorrow);
        assert!(records.iter().all(|r| r.sport == "NBA"));
        assert_eq!(stats.duplicates, 2);
    }

    #[tokio::test]
    async fn failing_and_hanging_targets_contribute_nothing() {
        let source = FakeSource::default()
            .with("nba", DateRange::Today, Canned::Fail)
            .with("nba", DateRange::Tomorrow, Canned::Hang)
            .with("mls", DateRange::Today, page(vec![row("X v Y", "Shots", "1+")]));
        let (records, stats) = aggregator(source, 3).run_with_stats().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sport, "MLS");
        assert_eq!(stats.targets_failed, 2);
    }

    #[tokio::test]
    async fn missing_table_only_affects_its_own_target() {
        let source = FakeSource::default()
            .with("nba", DateRange::Today, page(vec![row("A @ B", "Points", "1+")]))
            .with("nba", DateRange::Tomorrow, Canned::Page(PropsPage::default()));
        let (records, stats) = aggregator(source, 1).run_with_stats().await;

        assert_eq!(records.len(), 1);
        assert_eq!(stats.targets_without_table, 2);
        assert_eq!(stats.targets_failed, 0);
    }

    #[tokio::test]
    async fn concurrent_run_matches_sequential_order() {
        let build = || {
            FakeSource::default()
                .with(
                    "nba",
                    DateRange::Today,
                    page(vec![row("A", "Points", "1+"), row("B", "Rebounds", "Over 4.5")]),
                )
                .with("nba", DateRange::Tomorrow, page(vec![row("C", "Assists", "3+")]))
                .with("mls", DateRange::Today, page(vec![row("D", "Goals", "1+"), row("A", "Points", "1+")]))
        };
        let strip = |records: Vec<PropRecord>| -> Vec<(String, String, DateRange)> {
            records
                .into_iter()
                .map(|r| (r.event, r.sport, r.scraped_date_range))
                .collect()
        };

        let sequential = strip(aggregator(build(), 1).run().await);
        let concurrent = strip(aggregator(build(), 8).run().await);
        assert_eq!(sequential, concurrent);
        assert_eq!(sequential.len(), 4);

        // Running twice yields the same collection apart from timestamps.
        let again = strip(aggregator(build(), 1).run().await);
        assert_eq!(sequential, again);
    }
}
