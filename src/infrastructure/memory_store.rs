//! In-process [`Store`] for tests and local experiments.
//!
//! A transaction works on a copy of the whole state and swaps it in only when
//! the work returns `Ok`. Transactions are serialized by one mutex, which is
//! stricter than the row locks of the Postgres store but preserves the same
//! observable guarantees.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Mutex, TryLockError};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    CustomerContact, Milestones, Order, OrderItem, OrderStatus, Tracking,
};
use crate::domain::outbox::OutboxMessage;
use crate::domain::ports::{Store, UnitOfWork};
use crate::domain::stock::{Product, StockMovement};
use crate::domain::transfer::{BankAccount, TransferNotification};

#[derive(Debug, Default, Clone)]
struct State {
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    products: HashMap<Uuid, Product>,
    movements: Vec<StockMovement>,
    users: HashMap<Uuid, CustomerContact>,
    bank_accounts: Vec<BankAccount>,
    transfers: HashMap<Uuid, TransferNotification>,
    outbox: Vec<OutboxMessage>,
    failing_products: HashSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    pub fn add_product(&self, name: &str, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.write(|s| {
            s.products.insert(
                id,
                Product {
                    id,
                    name: name.to_string(),
                    stock,
                    initial_stock: stock,
                },
            )
        });
        id
    }

    pub fn add_user(&self, name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.write(|s| {
            s.users.insert(
                id,
                CustomerContact {
                    name: name.to_string(),
                    email: email.to_string(),
                },
            )
        });
        id
    }

    /// The most recently added account is the active one.
    pub fn add_bank_account(&self, bank_name: &str, iban: &str, account_holder: &str) {
        self.write(|s| {
            s.bank_accounts.push(BankAccount {
                bank_name: bank_name.to_string(),
                iban: iban.to_string(),
                account_holder: account_holder.to_string(),
            })
        });
    }

    /// Seeds an order directly in `status` without touching stock. Lines are
    /// `(product, quantity, unit price)`. Statuses past payment get `paid_at`.
    pub fn add_order(&self, user_id: Uuid, lines: &[(Uuid, i32, &str)], status: OrderStatus) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let items: Vec<OrderItem> = lines
            .iter()
            .enumerate()
            .map(|(idx, (product_id, quantity, price))| OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                line_no: idx as i32 + 1,
                product_id: *product_id,
                quantity: *quantity,
                unit_price: BigDecimal::from_str(price).unwrap_or_default(),
                size: None,
                color: None,
            })
            .collect();
        let total = items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + item.subtotal());

        let paid = matches!(
            status,
            OrderStatus::Paid
                | OrderStatus::Approved
                | OrderStatus::Shipped
                | OrderStatus::Delivered
                | OrderStatus::ReturnApproved
                | OrderStatus::ReturnRejected
                | OrderStatus::ExchangeApproved
                | OrderStatus::ExchangeRejected
        );
        let order = Order {
            id,
            user_id: Some(user_id),
            guest: None,
            status,
            total_amount: total,
            shipping_cost: BigDecimal::from(0),
            discount: BigDecimal::from(0),
            payment_method: None,
            tracking: Tracking::default(),
            exchange: Default::default(),
            admin_notes: String::new(),
            invoice_reference: None,
            milestones: Milestones {
                paid_at: paid.then_some(now),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        };
        self.write(|s| {
            s.orders.insert(id, order);
            s.items.insert(id, items);
        });
        id
    }

    /// Makes every later ledger write for `product_id` fail.
    pub fn fail_movements_for(&self, product_id: Uuid) {
        self.write(|s| s.failing_products.insert(product_id));
    }

    pub fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        self.read(|s| s.products.get(&product_id).map(|p| p.stock))
    }

    pub fn movements_for(&self, product_id: Uuid) -> Vec<StockMovement> {
        self.read(|s| {
            s.movements
                .iter()
                .filter(|m| m.product_id == product_id)
                .cloned()
                .collect()
        })
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.read(|s| s.orders.get(&id).cloned())
    }

    pub fn transfer(&self, id: Uuid) -> Option<TransferNotification> {
        self.read(|s| s.transfers.get(&id).cloned())
    }

    /// True while some transaction holds the store.
    pub fn in_transaction(&self) -> bool {
        matches!(self.state.try_lock(), Err(TryLockError::WouldBlock))
    }

    pub fn outbox(&self) -> Vec<OutboxMessage> {
        self.read(|s| s.outbox.clone())
    }
}

impl Store for MemoryStore {
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<(), DomainError>,
    ) -> Result<(), DomainError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DomainError::Internal("memory store lock poisoned".into()))?;
        let mut working = state.clone();
        work(&mut MemoryUnitOfWork {
            state: &mut working,
        })?;
        *state = working;
        Ok(())
    }
}

struct MemoryUnitOfWork<'a> {
    state: &'a mut State,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError> {
        if self.state.orders.contains_key(&order.id) {
            return Err(DomainError::Internal(format!("order {} already exists", order.id)));
        }
        self.state.orders.insert(order.id, order.clone());
        self.state.items.insert(order.id, items.to_vec());
        Ok(())
    }

    fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.state.orders.get(&id).cloned())
    }

    fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.find_order(id)
    }

    fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        let mut items = self.state.items.get(&order_id).cloned().unwrap_or_default();
        items.sort_by_key(|item| item.line_no);
        Ok(items)
    }

    fn update_order(&mut self, order: &Order) -> Result<(), DomainError> {
        match self.state.orders.get_mut(&order.id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("Order", order.id)),
        }
    }

    fn list_orders(
        &mut self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), DomainError> {
        let mut matching: Vec<&Order> = self
            .state
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    fn shipped_orders(&mut self, limit: i64) -> Result<Vec<Order>, DomainError> {
        let mut shipped: Vec<Order> = self
            .state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Shipped && o.tracking.tracking_number.is_some())
            .cloned()
            .collect();
        shipped.sort_by_key(|o| o.milestones.shipped_at);
        shipped.truncate(limit.max(0) as usize);
        Ok(shipped)
    }

    fn customer_contact(&mut self, order: &Order) -> Result<Option<CustomerContact>, DomainError> {
        if let Some(guest) = &order.guest {
            return Ok(Some(CustomerContact {
                name: guest.name.clone(),
                email: guest.email.clone(),
            }));
        }
        Ok(order.user_id.and_then(|id| self.state.users.get(&id).cloned()))
    }

    fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self.state.products.get(&id).cloned())
    }

    fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, DomainError> {
        self.find_product(id)
    }

    fn record_movement(&mut self, movement: &StockMovement) -> Result<i32, DomainError> {
        if self.state.failing_products.contains(&movement.product_id) {
            return Err(DomainError::Internal(format!(
                "ledger write for product {} failed",
                movement.product_id
            )));
        }
        let product = self
            .state
            .products
            .get_mut(&movement.product_id)
            .ok_or_else(|| DomainError::not_found("Product", movement.product_id))?;
        let next = product
            .stock
            .checked_add(movement.direction.signed(movement.quantity))
            .ok_or_else(|| {
                DomainError::InvalidInput(format!(
                    "stock of product {} cannot take {} more units",
                    product.id, movement.quantity
                ))
            })?;
        if next < 0 {
            return Err(DomainError::Internal(format!(
                "stock of product {} would become {next}",
                product.id
            )));
        }
        product.stock = next;
        self.state.movements.push(movement.clone());
        Ok(next)
    }

    fn stock_movements(&mut self, product_id: Uuid) -> Result<Vec<StockMovement>, DomainError> {
        Ok(self
            .state
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    fn active_bank_account(&mut self) -> Result<Option<BankAccount>, DomainError> {
        Ok(self.state.bank_accounts.last().cloned())
    }

    fn insert_transfer(&mut self, transfer: &TransferNotification) -> Result<(), DomainError> {
        self.state.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    fn find_transfer(&mut self, id: Uuid) -> Result<Option<TransferNotification>, DomainError> {
        Ok(self.state.transfers.get(&id).cloned())
    }

    fn lock_transfer(&mut self, id: Uuid) -> Result<Option<TransferNotification>, DomainError> {
        self.find_transfer(id)
    }

    fn update_transfer(&mut self, transfer: &TransferNotification) -> Result<(), DomainError> {
        match self.state.transfers.get_mut(&transfer.id) {
            Some(stored) => {
                *stored = transfer.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("Transfer notification", transfer.id)),
        }
    }

    fn enqueue(&mut self, message: &OutboxMessage) -> Result<(), DomainError> {
        self.state.outbox.push(message.clone());
        Ok(())
    }

    fn claim_outbox(&mut self, now: DateTime<Utc>) -> Result<Option<OutboxMessage>, DomainError> {
        Ok(self
            .state
            .outbox
            .iter()
            .filter(|m| m.is_pending(now))
            .min_by_key(|m| (m.available_at, m.created_at))
            .cloned())
    }

    fn update_outbox(&mut self, message: &OutboxMessage) -> Result<(), DomainError> {
        match self.state.outbox.iter_mut().find(|m| m.id == message.id) {
            Some(stored) => {
                *stored = message.clone();
                Ok(())
            }
            None => Err(DomainError::Internal(format!(
                "outbox message {} not found",
                message.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::transaction;
    use crate::domain::stock::Direction;

    #[test]
    fn failed_work_leaves_state_untouched() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 4);

        let result: Result<(), DomainError> = transaction(&store, |uow| {
            uow.record_movement(&StockMovement {
                id: Uuid::new_v4(),
                product_id: product,
                order_id: None,
                direction: Direction::Out,
                quantity: 1,
                description: "first".into(),
                created_at: Utc::now(),
            })?;
            Err(DomainError::Internal("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(store.stock_of(product), Some(4));
        assert!(store.movements_for(product).is_empty());
    }

    #[test]
    fn counter_refuses_to_go_negative() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 1);
        let err = transaction(&store, |uow| {
            uow.record_movement(&StockMovement {
                id: Uuid::new_v4(),
                product_id: product,
                order_id: None,
                direction: Direction::Out,
                quantity: 2,
                description: "too many".into(),
                created_at: Utc::now(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert_eq!(store.stock_of(product), Some(1));
    }

    #[test]
    fn counter_overflow_is_rejected_and_nothing_is_recorded() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", i32::MAX - 1);
        let err = transaction(&store, |uow| {
            uow.record_movement(&StockMovement {
                id: Uuid::new_v4(),
                product_id: product,
                order_id: None,
                direction: Direction::In,
                quantity: 5,
                description: "restock".into(),
                created_at: Utc::now(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert_eq!(store.stock_of(product), Some(i32::MAX - 1));
        assert!(store.movements_for(product).is_empty());
    }

    #[test]
    fn latest_bank_account_is_active() {
        let store = MemoryStore::new();
        store.add_bank_account("Old Bank", "TR01", "Shop");
        store.add_bank_account("New Bank", "TR02", "Shop");
        let active = transaction(&store, |uow| uow.active_bank_account()).unwrap();
        assert_eq!(active.unwrap().bank_name, "New Bank");
    }
}
