use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Price History ---

/// One daily bar as returned by the price history provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub time: DateTime<Utc>,
    pub close: f64,
}

// --- Derived Metrics ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub surge: f64,
    pub plunge: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            surge: 3.0,
            plunge: -3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStatus {
    Surge,
    Plunge,
    Calm,
}

impl MoveStatus {
    /// Both thresholds are strict: a change sitting exactly on one is `Calm`.
    pub fn classify(change_pct: f64, thresholds: &Thresholds) -> Self {
        if change_pct > thresholds.surge {
            MoveStatus::Surge
        } else if change_pct < thresholds.plunge {
            MoveStatus::Plunge
        } else {
            MoveStatus::Calm
        }
    }

    pub fn is_mover(&self) -> bool {
        *self != MoveStatus::Calm
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub status: MoveStatus,
}

// --- Per-Symbol Outcomes ---

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientHistory { bars: usize },
    ProviderError { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Collected(MetricRecord),
    Skipped { symbol: String, reason: SkipReason },
}

impl SymbolOutcome {
    pub fn into_record(self) -> Option<MetricRecord> {
        match self {
            SymbolOutcome::Collected(record) => Some(record),
            SymbolOutcome::Skipped { .. } => None,
        }
    }
}

/// Two-decimal rounding with exact halves going to the even neighbour.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
