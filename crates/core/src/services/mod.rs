pub mod alert_service;
pub mod currency_service;
pub mod insights_service;
pub mod ledger_service;
pub mod price_service;
pub mod transfer_service;
pub mod valuation_service;
