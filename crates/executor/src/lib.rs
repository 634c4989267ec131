pub mod error;
pub mod services;
pub mod trading_core;

pub use error::{LedgerError, SignalError};
pub use services::ledger_service::{OpenRequest, PaperLedger, PortfolioStats};
pub use services::scan_controller::{ControllerStatus, ScanningController, StartOutcome};
pub use services::telegram_service::{AlertNotifier, AlertSink, TelegramSink};
pub use trading_core::{TradingCore, TradingCoreParts};
