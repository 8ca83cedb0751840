use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{CustomerContact, Order, OrderItem, OrderStatus};
use super::outbox::{NotificationKind, OutboxMessage};
use super::stock::{Product, StockMovement};
use super::transfer::{BankAccount, TransferNotification};

/// Storage operations available inside one atomic unit of work.
///
/// `lock_*` methods take a row lock held until the unit commits or rolls back.
pub trait UnitOfWork {
    fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError>;
    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError>;
    fn update_order(&mut self, order: &Order) -> Result<(), DomainError>;
    /// Newest first, optionally filtered by status. Returns the page and the
    /// total number of matching orders.
    fn list_orders(
        &mut self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), DomainError>;
    /// Shipped orders that carry a tracking number, oldest shipment first.
    fn shipped_orders(&mut self, limit: i64) -> Result<Vec<Order>, DomainError>;
    fn customer_contact(&mut self, order: &Order) -> Result<Option<CustomerContact>, DomainError>;

    fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError>;
    fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError>;
    /// Appends `movement` to the ledger and moves the product counter by the
    /// same signed amount. Returns the new counter value.
    fn record_movement(&mut self, movement: &StockMovement) -> Result<i32, DomainError>;
    fn stock_movements(&mut self, product_id: Uuid) -> Result<Vec<StockMovement>, DomainError>;

    fn active_bank_account(&mut self) -> Result<Option<BankAccount>, DomainError>;
    fn insert_transfer(&mut self, transfer: &TransferNotification) -> Result<(), DomainError>;
    fn find_transfer(&mut self, id: Uuid) -> Result<Option<TransferNotification>, DomainError>;
    fn lock_transfer(&mut self, id: Uuid) -> Result<Option<TransferNotification>, DomainError>;
    fn update_transfer(&mut self, transfer: &TransferNotification) -> Result<(), DomainError>;

    fn enqueue(&mut self, message: &OutboxMessage) -> Result<(), DomainError>;
    /// Locks the oldest message due at `now`, skipping ones locked elsewhere.
    fn claim_outbox(&mut self, now: DateTime<Utc>) -> Result<Option<OutboxMessage>, DomainError>;
    fn update_outbox(&mut self, message: &OutboxMessage) -> Result<(), DomainError>;
}

/// A store that can run work atomically.
pub trait Store: Send + Sync + 'static {
    /// Runs `work` in one transaction: everything it wrote is committed when it
    /// returns `Ok`, and nothing is when it returns `Err`.
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<(), DomainError>,
    ) -> Result<(), DomainError>;
}

/// Runs `work` inside `store`'s transaction and hands back its value.
pub fn transaction<T, F>(store: &dyn Store, work: F) -> Result<T, DomainError>
where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T, DomainError>,
{
    let mut work = Some(work);
    let mut output = None;
    store.run_in_transaction(&mut |uow: &mut dyn UnitOfWork| {
        let work = work
            .take()
            .ok_or_else(|| DomainError::Internal("transaction body invoked twice".into()))?;
        output = Some(work(uow)?);
        Ok(())
    })?;
    output.ok_or_else(|| DomainError::Internal("transaction produced no value".into()))
}

/// Delivers customer- and business-facing messages.
pub trait Notifier: Send + Sync {
    fn send(&self, kind: NotificationKind, recipient: &str, data: &Value)
        -> Result<(), DomainError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub tax_id: String,
}

/// Produces an invoice artifact and returns a reference to it.
pub trait InvoiceGenerator: Send + Sync {
    fn generate(
        &self,
        order: &Order,
        items: &[OrderItem],
        company: &CompanyInfo,
    ) -> Result<String, DomainError>;
}

/// Carrier-side shipment progress, mapped onto our vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentStatus {
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Shipped => "SHIPPED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            ShipmentStatus::Delivered => "DELIVERED",
        }
    }

    /// Lenient mapping of carrier-reported labels. Unknown labels are `None`.
    pub fn from_carrier_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "SHIPPED" | "PICKED_UP" | "ACCEPTED" => Some(ShipmentStatus::Shipped),
            "IN_TRANSIT" | "TRANSIT" => Some(ShipmentStatus::InTransit),
            "OUT_FOR_DELIVERY" => Some(ShipmentStatus::OutForDelivery),
            "DELIVERED" => Some(ShipmentStatus::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierStatus {
    pub status: ShipmentStatus,
    pub description: String,
}

/// Polled, untrusted shipment status for one carrier.
pub trait CarrierStatusSource: Send + Sync {
    fn get_status(&self, tracking_number: &str) -> Result<CarrierStatus, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_labels_are_normalized() {
        assert_eq!(
            ShipmentStatus::from_carrier_label("out for delivery"),
            Some(ShipmentStatus::OutForDelivery)
        );
        assert_eq!(
            ShipmentStatus::from_carrier_label("In-Transit"),
            Some(ShipmentStatus::InTransit)
        );
        assert_eq!(
            ShipmentStatus::from_carrier_label("DELIVERED"),
            Some(ShipmentStatus::Delivered)
        );
        assert_eq!(ShipmentStatus::from_carrier_label("lost"), None);
    }
}
