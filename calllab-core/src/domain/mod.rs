//! Domain types for CallLab.

pub mod call;
pub mod candle;
pub mod policy;
pub mod position;
pub mod trade;

pub use call::{CallId, CallRecord};
pub use candle::{normalize_candles, sort_candles, Candle};
pub use policy::{ExitPolicy, LadderLevel, PolicyError};
pub use position::{Position, PositionHandle};
pub use trade::{ExitReason, TradeExecution};
