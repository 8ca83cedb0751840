use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::application::inventory::InventoryService;
use crate::domain::errors::DomainError;
use crate::domain::order::{Milestones, NewOrder, Order, OrderItem, OrderStatus, Tracking};
use crate::domain::outbox::{NotificationKind, OutboxMessage};
use crate::domain::ports::{transaction, Store, UnitOfWork};
use crate::domain::stock::{AppliedMovement, StockReconciliation};
use crate::domain::transition::{
    plan, Planned, TransitionCommand, TransitionOrigin, TransitionPlan,
};

pub const ORDER_AGGREGATE: &str = "Order";

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied {
        from: OrderStatus,
        to: OrderStatus,
        movements: Vec<AppliedMovement>,
    },
    /// The status did not move: a duplicate from a retrying source, a
    /// re-observation of a status the order already has, or a payment
    /// flagged for review on an order that can no longer take it.
    Unchanged { status: OrderStatus },
}

impl TransitionOutcome {
    pub fn status(&self) -> OrderStatus {
        match self {
            TransitionOutcome::Applied { to, .. } => *to,
            TransitionOutcome::Unchanged { status } => *status,
        }
    }
}

/// Drives `order_id` through `command` inside the caller's unit of work.
///
/// The order row is locked first, so concurrent requests for the same order
/// run one after the other; the later one sees the advanced status. Stock
/// movements, the order write and the outbox intent all land in `uow`.
pub fn execute_transition(
    uow: &mut dyn UnitOfWork,
    order_id: Uuid,
    command: &TransitionCommand,
    origin: &TransitionOrigin,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, DomainError> {
    let current = uow
        .lock_order(order_id)?
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;
    let items = uow.order_items(order_id)?;

    let planned = match plan(&current, &items, command, origin, now) {
        Ok(planned) => planned,
        Err(DomainError::Conflict { current: status, .. })
            if origin.acknowledges_stale()
                && matches!(command, TransitionCommand::ConfirmPayment { .. })
                && !current.is_paid() =>
        {
            // Money was captured for an order that can no longer take it.
            log::error!(
                "order {order_id} is {status} but {} reported a captured payment; flagged for review",
                origin.author()
            );
            let mut flagged = current.clone();
            flagged.updated_at = now;
            flagged.append_note(
                now,
                &origin.author(),
                &format!("payment captured while order is {status}; needs manual review"),
            );
            uow.update_order(&flagged)?;
            return Ok(TransitionOutcome::Unchanged { status });
        }
        Err(DomainError::Conflict { action, current: status }) if origin.acknowledges_stale() => {
            log::info!(
                "order {order_id} is already {status}; acknowledging duplicate '{action}' from {}",
                origin.author()
            );
            return Ok(TransitionOutcome::Unchanged { status });
        }
        Err(e) => return Err(e),
    };

    let TransitionPlan {
        from,
        mut order,
        stock,
        notification,
    } = match planned {
        Planned::Transition(plan) => *plan,
        Planned::AlreadyApplied => {
            log::debug!("order {order_id} already {}; nothing to do", current.status);
            return Ok(TransitionOutcome::Unchanged {
                status: current.status,
            });
        }
    };

    let movements = InventoryService::apply_batch(uow, order_id, &stock, now)?;
    for shortfall in movements.iter().filter(|m| m.shortfall() > 0) {
        order.append_note(
            now,
            "inventory",
            &format!(
                "stock shortfall: product {} short by {} unit(s)",
                shortfall.product_id,
                shortfall.shortfall()
            ),
        );
    }
    uow.update_order(&order)?;

    if let Some(kind) = notification {
        let data = notification_data(&order, command);
        enqueue_customer_notification(uow, &order, kind, data, now)?;
    }

    log::info!(
        "order {order_id}: {from} -> {} ({}, by {})",
        order.status,
        command.name(),
        origin.author()
    );
    Ok(TransitionOutcome::Applied {
        from,
        to: order.status,
        movements,
    })
}

/// Queues a customer-facing notification for `order`. Orders whose customer
/// cannot be resolved are logged and skipped.
pub fn enqueue_customer_notification(
    uow: &mut dyn UnitOfWork,
    order: &Order,
    kind: NotificationKind,
    data: Value,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    match uow.customer_contact(order)? {
        Some(contact) => {
            let mut data = data;
            data["customer_name"] = Value::String(contact.name);
            uow.enqueue(&OutboxMessage::new(
                ORDER_AGGREGATE,
                order.id,
                kind,
                &contact.email,
                data,
                now,
            ))
        }
        None => {
            log::warn!("order {}: no customer contact, skipping {kind}", order.id);
            Ok(())
        }
    }
}

fn notification_data(order: &Order, command: &TransitionCommand) -> Value {
    let reason = match command {
        TransitionCommand::Reject { reason }
        | TransitionCommand::FailPayment { reason }
        | TransitionCommand::Cancel { reason } => Some(reason.clone()),
        TransitionCommand::ApproveReturn { note }
        | TransitionCommand::RejectReturn { note }
        | TransitionCommand::ApproveExchange { note, .. }
        | TransitionCommand::RejectExchange { note } => note.clone(),
        _ => None,
    };
    json!({
        "order_id": order.id,
        "status": order.status.as_str(),
        "status_description": order.status.customer_description(),
        "total_amount": order.total_amount.to_string(),
        "payment_method": order.payment_method.map(|m| m.as_str()),
        "shipping_company": order.tracking.shipping_company,
        "tracking_number": order.tracking.tracking_number,
        "tracking_url": order.tracking.tracking_url,
        "reason": reason,
    })
}

/// Order intake, queries and admin/automated transitions.
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records a validated order in `PENDING`, together with its items.
    pub fn create_order(&self, new_order: NewOrder) -> Result<Uuid, DomainError> {
        new_order.validate()?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order = Order {
            id: order_id,
            user_id: new_order.user_id,
            guest: new_order.guest,
            status: OrderStatus::Pending,
            total_amount: new_order.total_amount,
            shipping_cost: new_order.shipping_cost,
            discount: new_order.discount,
            payment_method: new_order.payment_method,
            tracking: Tracking::default(),
            exchange: Default::default(),
            admin_notes: String::new(),
            invoice_reference: None,
            milestones: Milestones::default(),
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = new_order
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                line_no: idx as i32 + 1,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                size: line.size,
                color: line.color,
            })
            .collect();

        transaction(self.store.as_ref(), |uow| {
            for item in &items {
                if uow.find_product(item.product_id)?.is_none() {
                    return Err(DomainError::not_found("Product", item.product_id));
                }
            }
            uow.insert_order(&order, &items)?;
            let data = json!({
                "order_id": order.id,
                "status": order.status.as_str(),
                "status_description": order.status.customer_description(),
                "total_amount": order.total_amount.to_string(),
                "lines": items.iter().map(|i| json!({
                    "product_id": i.product_id,
                    "quantity": i.quantity,
                    "unit_price": i.unit_price.to_string(),
                })).collect::<Vec<_>>(),
            });
            enqueue_customer_notification(uow, &order, NotificationKind::OrderReceived, data, now)
        })?;

        log::info!("order {order_id} created");
        Ok(order_id)
    }

    pub fn get_order(&self, id: Uuid) -> Result<Option<OrderDetails>, DomainError> {
        transaction(self.store.as_ref(), |uow| {
            let Some(order) = uow.find_order(id)? else {
                return Ok(None);
            };
            let items = uow.order_items(id)?;
            Ok(Some(OrderDetails { order, items }))
        })
    }

    /// Page numbers start at 1; `limit` is clamped to 1..=100.
    pub fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let (orders, total) = transaction(self.store.as_ref(), |uow| {
            uow.list_orders(status, limit, (page - 1) * limit)
        })?;
        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
        })
    }

    /// Runs one transition in its own transaction.
    pub fn transition(
        &self,
        order_id: Uuid,
        command: TransitionCommand,
        origin: TransitionOrigin,
    ) -> Result<TransitionOutcome, DomainError> {
        transaction(self.store.as_ref(), |uow| {
            execute_transition(uow, order_id, &command, &origin, Utc::now())
        })
    }

    pub fn stock_report(&self, product_id: Uuid) -> Result<StockReconciliation, DomainError> {
        transaction(self.store.as_ref(), |uow| {
            InventoryService::reconcile(uow, product_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderLineInput;
    use crate::infrastructure::memory_store::MemoryStore;
    use bigdecimal::BigDecimal;

    fn order_for(product_id: Uuid, user_id: Uuid) -> NewOrder {
        NewOrder {
            user_id: Some(user_id),
            guest: None,
            lines: vec![OrderLineInput {
                product_id,
                quantity: 1,
                unit_price: BigDecimal::from(12),
                size: None,
                color: None,
            }],
            shipping_cost: BigDecimal::from(0),
            discount: BigDecimal::from(0),
            total_amount: BigDecimal::from(12),
            payment_method: None,
        }
    }

    #[test]
    fn unknown_product_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("Ada", "ada@example.com");
        let service = OrderService::new(store.clone());

        let err = service
            .create_order(order_for(Uuid::new_v4(), user))
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
        assert!(store.outbox().is_empty());
        assert_eq!(service.list_orders(None, 1, 20).unwrap().total, 0);
    }

    #[test]
    fn listing_clamps_paging_and_filters() {
        let store = Arc::new(MemoryStore::new());
        let product = store.add_product("Mug", 5);
        let user = store.add_user("Ada", "ada@example.com");
        let service = OrderService::new(store.clone());
        for _ in 0..3 {
            service.create_order(order_for(product, user)).unwrap();
        }
        store.add_order(user, &[(product, 1, "12")], OrderStatus::Paid);

        let page = service.list_orders(None, 0, 1000).unwrap();
        assert_eq!((page.page, page.limit, page.total), (1, 100, 4));
        assert_eq!(page.orders.len(), 4);

        let page = service.list_orders(Some(OrderStatus::Pending), 2, 2).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.orders.len(), 1);
        assert!(page.orders.iter().all(|o| o.status == OrderStatus::Pending));
    }

    #[test]
    fn customer_view_carries_items() {
        let store = Arc::new(MemoryStore::new());
        let product = store.add_product("Mug", 5);
        let user = store.add_user("Ada", "ada@example.com");
        let service = OrderService::new(store);

        let id = service.create_order(order_for(product, user)).unwrap();
        let details = service.get_order(id).unwrap().unwrap();

        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].line_no, 1);
        assert!(service.get_order(Uuid::new_v4()).unwrap().is_none());
    }
}
