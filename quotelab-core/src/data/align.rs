//! Multi-symbol time alignment.
//!
//! The engine requires every symbol to share one timeline and has no notion of
//! a missing bar, so alignment keeps only the timestamps present for every
//! symbol (the intersection). Callers decide whether the dropped rows matter;
//! the drop counts are returned alongside the data.

use super::series::{MarketData, SymbolSeries};
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Result of aligning raw per-symbol bars.
#[derive(Debug, Clone)]
pub struct Aligned {
    pub data: MarketData,
    /// Rows discarded per symbol because some other symbol lacked that timestamp.
    pub dropped: BTreeMap<String, usize>,
}

/// Align bars of several symbols on the timestamps they all share.
///
/// Input bars need not be sorted. Duplicate timestamps within a symbol keep
/// the last occurrence.
pub fn align_on_common_timestamps(symbol_bars: BTreeMap<String, Vec<Bar>>) -> Aligned {
    let by_ts: BTreeMap<String, BTreeMap<DateTime<Utc>, Bar>> = symbol_bars
        .into_iter()
        .map(|(symbol, bars)| {
            let rows = bars.into_iter().map(|b| (b.timestamp, b)).collect();
            (symbol, rows)
        })
        .collect();

    let mut common: Option<BTreeSet<DateTime<Utc>>> = None;
    for rows in by_ts.values() {
        let keys: BTreeSet<DateTime<Utc>> = rows.keys().copied().collect();
        common = Some(match common {
            None => keys,
            Some(acc) => acc.intersection(&keys).copied().collect(),
        });
    }
    let common = common.unwrap_or_default();

    let mut data = MarketData::new();
    let mut dropped = BTreeMap::new();
    for (symbol, rows) in by_ts {
        let total = rows.len();
        let bars: Vec<Bar> = rows
            .into_iter()
            .filter(|(ts, _)| common.contains(ts))
            .map(|(_, bar)| bar)
            .collect();
        dropped.insert(symbol.clone(), total - bars.len());
        data.insert(symbol, SymbolSeries::from_bars(&bars));
    }

    Aligned { data, dropped }
}
