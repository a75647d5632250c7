pub mod invoke;
pub mod record_store;
