//! Collaborator seams — call source, candle provider, explicit cache.
//!
//! Data acquisition (warehouse queries, HTTP fetches, retries) lives
//! behind these traits in external adapters. The engine only ever sees
//! fully materialized, immutable sequences.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{normalize_candles, sort_candles, CallId, CallRecord, Candle};

/// Filter criteria for listing calls. All fields optional; empty criteria
/// selects everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallCriteria {
    /// Restrict to a single caller.
    pub caller: Option<String>,
    /// Inclusive lower bound on alert time (epoch ms).
    pub since_ms: Option<i64>,
    /// Exclusive upper bound on alert time (epoch ms).
    pub until_ms: Option<i64>,
}

impl CallCriteria {
    pub fn matches(&self, call: &CallRecord) -> bool {
        if let Some(caller) = &self.caller {
            if &call.caller != caller {
                return false;
            }
        }
        let ts = call.created_at_ms();
        if let Some(since) = self.since_ms {
            if ts < since {
                return false;
            }
        }
        if let Some(until) = self.until_ms {
            if ts >= until {
                return false;
            }
        }
        true
    }
}

/// Yields immutable alert records. Ordering is not guaranteed; the
/// simulator re-sorts by alert time.
pub trait CallSource {
    fn list_calls(&self, criteria: &CallCriteria) -> Vec<CallRecord>;
}

/// Yields the candle series behind one call. May be empty (the call is
/// then un-tradeable); must be ascending by timestamp, or the consumer
/// normalizes it.
pub trait CandleProvider {
    fn candles(&self, call_id: &CallId) -> Vec<Candle>;
}

/// In-memory call source over a fixed slice of records.
#[derive(Debug, Clone, Default)]
pub struct StaticCallSource {
    calls: Vec<CallRecord>,
}

impl StaticCallSource {
    pub fn new(calls: Vec<CallRecord>) -> Self {
        Self { calls }
    }
}

impl CallSource for StaticCallSource {
    fn list_calls(&self, criteria: &CallCriteria) -> Vec<CallRecord> {
        self.calls
            .iter()
            .filter(|c| criteria.matches(c))
            .cloned()
            .collect()
    }
}

/// In-memory candle provider keyed by call id. Normalizes series to
/// ascending order on construction.
#[derive(Debug, Clone, Default)]
pub struct StaticCandleProvider {
    series: HashMap<CallId, Vec<Candle>>,
}

impl StaticCandleProvider {
    pub fn new(series: HashMap<CallId, Vec<Candle>>) -> Self {
        let mut series = series;
        for candles in series.values_mut() {
            sort_candles(candles);
        }
        Self { series }
    }

    pub fn insert(&mut self, call_id: CallId, mut candles: Vec<Candle>) {
        sort_candles(&mut candles);
        self.series.insert(call_id, candles);
    }
}

impl CandleProvider for StaticCandleProvider {
    fn candles(&self, call_id: &CallId) -> Vec<Candle> {
        self.series.get(call_id).cloned().unwrap_or_default()
    }
}

/// Explicit memoizing wrapper around a candle provider.
///
/// Constructed by the caller and passed into whatever needs it; there is
/// no ambient global cache. Single-threaded by design, like the
/// simulation run that owns it. Series are normalized on first fetch:
/// bars failing OHLC sanity are dropped and the rest sorted ascending.
pub struct CandleCache<'a, P: CandleProvider + ?Sized> {
    inner: &'a P,
    cached: RefCell<HashMap<CallId, Vec<Candle>>>,
}

impl<'a, P: CandleProvider + ?Sized> CandleCache<'a, P> {
    pub fn new(inner: &'a P) -> Self {
        Self { inner, cached: RefCell::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.cached.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.borrow().is_empty()
    }
}

impl<P: CandleProvider + ?Sized> CandleProvider for CandleCache<'_, P> {
    fn candles(&self, call_id: &CallId) -> Vec<Candle> {
        if let Some(candles) = self.cached.borrow().get(call_id) {
            return candles.clone();
        }
        let mut candles = self.inner.candles(call_id);
        normalize_candles(&mut candles);
        self.cached
            .borrow_mut()
            .insert(call_id.clone(), candles.clone());
        candles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn call(id: &str, caller: &str, hour: u32) -> CallRecord {
        CallRecord {
            id: CallId::new(id),
            mint: format!("mint-{id}"),
            caller: caller.into(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn criteria_filters_by_caller_and_window() {
        let source = StaticCallSource::new(vec![
            call("a", "alpha", 1),
            call("b", "beta", 2),
            call("c", "alpha", 3),
        ]);
        let criteria = CallCriteria { caller: Some("alpha".into()), ..Default::default() };
        let calls = source.list_calls(&criteria);
        assert_eq!(calls.len(), 2);

        let since = call("c", "alpha", 3).created_at_ms();
        let criteria = CallCriteria {
            caller: Some("alpha".into()),
            since_ms: Some(since),
            until_ms: None,
        };
        assert_eq!(source.list_calls(&criteria).len(), 1);
    }

    #[test]
    fn provider_sorts_series() {
        let mut provider = StaticCandleProvider::default();
        let c = |ts| Candle { ts_secs: ts, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 0.0 };
        provider.insert(CallId::new("a"), vec![c(30), c(10), c(20)]);
        let candles = provider.candles(&CallId::new("a"));
        assert_eq!(candles[0].ts_secs, 10);
        assert_eq!(candles[2].ts_secs, 30);
    }

    #[test]
    fn cache_drops_insane_bars() {
        struct Dirty;
        impl CandleProvider for Dirty {
            fn candles(&self, _call_id: &CallId) -> Vec<Candle> {
                vec![
                    Candle { ts_secs: 2, open: 1.0, high: 1.1, low: 0.9, close: 1.0, volume: 1.0 },
                    // high below low: a bad print, not a tradeable bar
                    Candle { ts_secs: 1, open: 1.0, high: 0.5, low: 0.9, close: 1.0, volume: 1.0 },
                ]
            }
        }
        let cache = CandleCache::new(&Dirty);
        let candles = cache.candles(&CallId::new("a"));
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].ts_secs, 2);
    }

    #[test]
    fn missing_series_is_empty() {
        let provider = StaticCandleProvider::default();
        assert!(provider.candles(&CallId::new("nope")).is_empty());
    }

    #[test]
    fn cache_memoizes() {
        struct Counting {
            hits: RefCell<usize>,
        }
        impl CandleProvider for Counting {
            fn candles(&self, _call_id: &CallId) -> Vec<Candle> {
                *self.hits.borrow_mut() += 1;
                vec![Candle { ts_secs: 1, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 0.0 }]
            }
        }
        let counting = Counting { hits: RefCell::new(0) };
        let cache = CandleCache::new(&counting);
        let id = CallId::new("a");
        cache.candles(&id);
        cache.candles(&id);
        assert_eq!(*counting.hits.borrow(), 1);
        assert_eq!(cache.len(), 1);
    }
}
