pub mod carrier;
pub mod invoice;
pub mod memory_store;
pub mod models;
pub mod notifier;
pub mod pg_store;
