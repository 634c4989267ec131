pub mod scan_service;
pub mod signal_service;
