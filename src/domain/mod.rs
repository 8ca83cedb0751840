pub mod errors;
pub mod order;
pub mod outbox;
pub mod ports;
pub mod stock;
pub mod transfer;
pub mod transition;
