pub mod db;
pub mod repositories;

pub use db::open_pool;
pub use repositories::TradeRepository;
