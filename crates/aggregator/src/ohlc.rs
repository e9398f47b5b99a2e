//! Sorted-sequence OHLC folding.

use market_pulse_core::Tick;
use serde::Serialize;
use std::collections::BTreeMap;

/// Open/high/low/close and summed volume for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlc {
    fn start(tick: &Tick) -> Self {
        Self {
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume,
        }
    }

    fn push(mut self, tick: &Tick) -> Self {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.volume;
        self
    }

    #[must_use]
    pub fn price_change_pct(&self) -> f64 {
        price_change_pct(self.open, self.close)
    }
}

/// `(close - open) / open * 100`, or 0 when `open` is 0.
#[must_use]
pub fn price_change_pct(open: f64, close: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (close - open) / open * 100.0
}

/// Groups ticks by symbol and folds each group in timestamp order.
///
/// The sort is stable, so ticks sharing a timestamp keep their input order.
#[must_use]
pub fn compute_ohlc(ticks: &[Tick]) -> BTreeMap<String, Ohlc> {
    let mut by_symbol: BTreeMap<&str, Vec<&Tick>> = BTreeMap::new();
    for tick in ticks {
        by_symbol.entry(tick.symbol.as_str()).or_default().push(tick);
    }

    by_symbol
        .into_iter()
        .filter_map(|(symbol, mut group)| {
            group.sort_by_key(|t| t.timestamp);
            let (first, rest) = group.split_first()?;
            let ohlc = rest.iter().fold(Ohlc::start(first), |acc, t| acc.push(t));
            Some((symbol.to_string(), ohlc))
        })
        .collect()
}
