pub mod candle;
pub mod detection;
pub mod market;
pub mod signal;
pub mod trade;

pub use candle::Candle;
pub use detection::{Detection, PatternBias};
pub use market::{MarketSnapshot, PatternHint};
pub use signal::{Signal, SignalAction};
pub use trade::{Side, Trade, TradeStatus};
