pub mod alert;
pub mod category;
pub mod currency;
pub mod holding;
pub mod insight;
pub mod preferences;
pub mod price;
pub mod settings;
pub mod snapshot;
pub mod transaction;
pub mod valuation;
