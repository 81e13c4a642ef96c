pub mod invalidation;
pub mod query_cache;
pub mod query_key;
