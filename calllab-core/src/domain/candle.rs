//! Candle — one OHLCV bar of the price path behind a call.

use serde::{Deserialize, Serialize};

/// OHLCV bar for a fixed interval, timestamped in epoch seconds.
///
/// Supplied per call by the candle provider as an ascending-by-time
/// sequence. An empty sequence means the call is un-tradeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts_secs: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Bar timestamp in epoch milliseconds (the replay time base).
    pub fn ts_ms(&self) -> i64 {
        self.ts_secs * 1000
    }

    /// Returns true if any OHLC field is non-finite.
    pub fn is_void(&self) -> bool {
        !self.open.is_finite()
            || !self.high.is_finite()
            || !self.low.is_finite()
            || !self.close.is_finite()
    }

    /// Basic OHLC sanity: finite fields, high >= low, positive close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}

/// Sort candles ascending by timestamp.
///
/// Providers must hand over ascending series; this normalizes the ones
/// that do not. Stable sort, so equal-timestamp bars keep source order.
pub fn sort_candles(candles: &mut [Candle]) {
    candles.sort_by_key(|c| c.ts_secs);
}

/// Full provider-output normalization: drop bars that fail OHLC sanity,
/// then sort ascending. The replay layer only ever sees bars that pass
/// `is_sane`, so a bad print can never fake a stop or a fill.
pub fn normalize_candles(candles: &mut Vec<Candle>) {
    candles.retain(Candle::is_sane);
    sort_candles(candles);
}
