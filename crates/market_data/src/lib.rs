pub mod price_book;
pub mod simulated;
pub mod traits;

pub use price_book::PriceBook;
pub use simulated::SimulatedMarket;
pub use traits::{CandleSource, PriceOracle, resolve_price, usable_price};
