pub mod patterns;
pub mod scan;
pub mod scan_state;
pub mod services;

pub use patterns::{PatternKind, PatternMatch};
pub use scan::{PartialScanFailure, ScanOutcome, ScanResult, SymbolScan};
pub use scan_state::{ScanState, ScanView};
pub use services::scan_service::{PatternScanner, ScannerSettings};
pub use services::signal_service::{SignalGenerator, StrategyProfile};
