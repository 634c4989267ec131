pub mod ledger_service;
pub mod scan_controller;
pub mod telegram_service;
