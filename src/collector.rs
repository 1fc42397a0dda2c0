use crate::config::WatchlistEntry;
use crate::data_structures::{
    round2, DailyBar, MetricRecord, MoveStatus, SkipReason, SymbolOutcome, Thresholds,
};
use crate::provider::PriceHistoryProvider;
use tracing::{debug, info, instrument, warn};

// Two closes are all a day-over-day change needs
pub const HISTORY_DAYS: u32 = 2;

/// Derives a record from the two most recent bars. Status is classified on the
/// unrounded change; only the stored values are rounded.
pub fn derive_metric(
    entry: &WatchlistEntry,
    bars: &[DailyBar],
    thresholds: &Thresholds,
) -> Result<MetricRecord, SkipReason> {
    let [.., previous, latest] = bars else {
        return Err(SkipReason::InsufficientHistory { bars: bars.len() });
    };

    if !previous.close.is_finite() || previous.close == 0.0 || !latest.close.is_finite() {
        return Err(SkipReason::ProviderError {
            message: format!("invalid closes: previous {}, latest {}", previous.close, latest.close),
        });
    }

    let change_pct = (latest.close - previous.close) / previous.close * 100.0;

    Ok(MetricRecord {
        symbol: entry.symbol.clone(),
        name: entry.name.clone(),
        price: round2(latest.close),
        change_pct: round2(change_pct),
        status: MoveStatus::classify(change_pct, thresholds),
    })
}

#[instrument(skip(provider, entry, thresholds), fields(symbol = %entry.symbol))]
async fn collect_symbol<P>(provider: &mut P, entry: &WatchlistEntry, thresholds: &Thresholds) -> SymbolOutcome
where
    P: PriceHistoryProvider + ?Sized,
{
    let skipped = |reason| SymbolOutcome::Skipped {
        symbol: entry.symbol.clone(),
        reason,
    };

    let bars = match provider.daily_history(&entry.symbol, HISTORY_DAYS).await {
        Ok(bars) => bars,
        Err(e) => {
            warn!(name = %entry.name, error = %e, "Failed to fetch price history, skipping symbol");
            return skipped(SkipReason::ProviderError { message: e.to_string() });
        }
    };

    match derive_metric(entry, &bars, thresholds) {
        Ok(record) => {
            debug!(
                price = record.price,
                change_pct = record.change_pct,
                status = ?record.status,
                "Derived metric"
            );
            SymbolOutcome::Collected(record)
        }
        Err(reason @ SkipReason::InsufficientHistory { .. }) => {
            info!(?reason, "Not enough history, skipping symbol");
            skipped(reason)
        }
        Err(reason) => {
            warn!(?reason, "Unusable price history, skipping symbol");
            skipped(reason)
        }
    }
}

/// Fetches every watchlist symbol in order, one request at a time. Never fails
/// as a whole; each symbol ends up collected or skipped.
#[instrument(skip_all, fields(symbols = watchlist.len()))]
pub async fn collect_outcomes<P>(
    provider: &mut P,
    watchlist: &[WatchlistEntry],
    thresholds: &Thresholds,
) -> Vec<SymbolOutcome>
where
    P: PriceHistoryProvider + ?Sized,
{
    let mut outcomes = Vec::with_capacity(watchlist.len());
    for entry in watchlist {
        outcomes.push(collect_symbol(provider, entry, thresholds).await);
    }

    let collected = outcomes
        .iter()
        .filter(|o| matches!(o, SymbolOutcome::Collected(_)))
        .count();
    let insufficient = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                SymbolOutcome::Skipped { reason: SkipReason::InsufficientHistory { .. }, .. }
            )
        })
        .count();
    info!(
        collected,
        insufficient_history = insufficient,
        failed = outcomes.len() - collected - insufficient,
        "Completed collection"
    );

    outcomes
}

pub async fn collect<P>(
    provider: &mut P,
    watchlist: &[WatchlistEntry],
    thresholds: &Thresholds,
) -> Vec<MetricRecord>
where
    P: PriceHistoryProvider + ?Sized,
{
    collect_outcomes(provider, watchlist, thresholds)
        .await
        .into_iter()
        .filter_map(SymbolOutcome::into_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn bars(closes: &[f64]) -> Vec<DailyBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                time: DateTime::<Utc>::from_timestamp(1_760_000_000 + i as i64 * 86_400, 0).unwrap(),
                close,
            })
            .collect()
    }

    #[test]
    fn test_derive_metric_rounds_but_classifies_precisely() {
        let entry = WatchlistEntry::new("X", "Example");
        let record = derive_metric(&entry, &bars(&[100.0, 103.456]), &Thresholds::default()).unwrap();

        assert_eq!(record.change_pct, 3.46);
        assert_eq!(record.price, 103.46);
        assert_eq!(record.status, MoveStatus::Surge);
    }

    #[test]
    fn test_derive_metric_classifies_on_unrounded_change() {
        // 3.004% rounds to 3.0 for display but is still above the surge threshold
        let entry = WatchlistEntry::new("X", "Example");
        let record = derive_metric(&entry, &bars(&[100.0, 103.004]), &Thresholds::default()).unwrap();

        assert_eq!(record.change_pct, 3.0);
        assert_eq!(record.status, MoveStatus::Surge);
    }

    #[test]
    fn test_derive_metric_uses_last_two_bars() {
        let entry = WatchlistEntry::new("AAPL", "Apple");
        let record = derive_metric(&entry, &bars(&[10.0, 150.0, 144.0]), &Thresholds::default()).unwrap();

        assert_eq!(record.change_pct, -4.0);
        assert_eq!(record.price, 144.0);
        assert_eq!(record.status, MoveStatus::Plunge);
    }

    #[test]
    fn test_derive_metric_needs_two_bars() {
        let entry = WatchlistEntry::new("NEW", "New listing");
        assert_eq!(
            derive_metric(&entry, &bars(&[42.0]), &Thresholds::default()),
            Err(SkipReason::InsufficientHistory { bars: 1 })
        );
        assert_eq!(
            derive_metric(&entry, &[], &Thresholds::default()),
            Err(SkipReason::InsufficientHistory { bars: 0 })
        );
    }

    #[test]
    fn test_derive_metric_rejects_zero_previous_close() {
        let entry = WatchlistEntry::new("ZERO", "Zero");
        assert!(matches!(
            derive_metric(&entry, &bars(&[0.0, 1.0]), &Thresholds::default()),
            Err(SkipReason::ProviderError { .. })
        ));
    }
}
