pub mod bank_transfer;
pub mod carrier_poller;
pub mod hosted_gateway;
pub mod inventory;
pub mod order_service;
pub mod outbox_dispatcher;
