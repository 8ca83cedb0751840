use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    ExchangeRequest, GuestContact, Milestones, Order, OrderItem, Tracking,
};
use crate::domain::outbox::OutboxMessage;
use crate::domain::stock::{Product, StockMovement};
use crate::domain::transfer::{BankAccount, TransferNotification};
use crate::schema::{
    bank_accounts, order_items, orders, outbox_messages, products, stock_movements,
    transfer_notifications,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = orders)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub status: String,
    pub total_amount: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub discount: BigDecimal,
    pub payment_method: Option<String>,
    pub shipping_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub carrier_status: Option<String>,
    pub exchange_product_id: Option<Uuid>,
    pub exchange_size: Option<String>,
    pub exchange_color: Option<String>,
    pub admin_notes: String,
    pub invoice_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub return_approved_at: Option<DateTime<Utc>>,
    pub exchange_approved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        OrderRow {
            id: order.id,
            user_id: order.user_id,
            guest_name: order.guest.as_ref().map(|g| g.name.clone()),
            guest_email: order.guest.as_ref().map(|g| g.email.clone()),
            guest_phone: order.guest.as_ref().and_then(|g| g.phone.clone()),
            status: order.status.as_str().to_string(),
            total_amount: order.total_amount.clone(),
            shipping_cost: order.shipping_cost.clone(),
            discount: order.discount.clone(),
            payment_method: order.payment_method.map(|m| m.as_str().to_string()),
            shipping_company: order.tracking.shipping_company.clone(),
            tracking_number: order.tracking.tracking_number.clone(),
            tracking_url: order.tracking.tracking_url.clone(),
            carrier_status: order.tracking.carrier_status.clone(),
            exchange_product_id: order.exchange.product_id,
            exchange_size: order.exchange.size.clone(),
            exchange_color: order.exchange.color.clone(),
            admin_notes: order.admin_notes.clone(),
            invoice_reference: order.invoice_reference.clone(),
            paid_at: order.milestones.paid_at,
            shipped_at: order.milestones.shipped_at,
            delivered_at: order.milestones.delivered_at,
            return_approved_at: order.milestones.return_approved_at,
            exchange_approved_at: order.milestones.exchange_approved_at,
            cancelled_at: order.milestones.cancelled_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let guest = match (row.guest_name, row.guest_email) {
            (Some(name), Some(email)) => Some(GuestContact {
                name,
                email,
                phone: row.guest_phone,
            }),
            _ => None,
        };
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            guest,
            status: row.status.parse()?,
            total_amount: row.total_amount,
            shipping_cost: row.shipping_cost,
            discount: row.discount,
            payment_method: row
                .payment_method
                .as_deref()
                .map(str::parse)
                .transpose()?,
            tracking: Tracking {
                shipping_company: row.shipping_company,
                tracking_number: row.tracking_number,
                tracking_url: row.tracking_url,
                carrier_status: row.carrier_status,
            },
            exchange: ExchangeRequest {
                product_id: row.exchange_product_id,
                size: row.exchange_size,
                color: row.exchange_color,
            },
            admin_notes: row.admin_notes,
            invoice_reference: row.invoice_reference,
            milestones: Milestones {
                paid_at: row.paid_at,
                shipped_at: row.shipped_at,
                delivered_at: row.delivered_at,
                return_approved_at: row.return_approved_at,
                exchange_approved_at: row.exchange_approved_at,
                cancelled_at: row.cancelled_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_no: i32,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl From<&OrderItem> for OrderItemRow {
    fn from(item: &OrderItem) -> Self {
        OrderItemRow {
            id: item.id,
            order_id: item.order_id,
            line_no: item.line_no,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price.clone(),
            size: item.size.clone(),
            color: item.color.clone(),
        }
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            line_no: row.line_no,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            size: row.size,
            color: row.color,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
    pub initial_stock: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            stock: row.stock,
            initial_stock: row.initial_stock,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProductRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub stock: i32,
    pub initial_stock: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = stock_movements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StockMovementRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub order_id: Option<Uuid>,
    pub direction: String,
    pub quantity: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StockMovement> for StockMovementRow {
    fn from(m: &StockMovement) -> Self {
        StockMovementRow {
            id: m.id,
            product_id: m.product_id,
            order_id: m.order_id,
            direction: m.direction.as_str().to_string(),
            quantity: m.quantity,
            description: m.description.clone(),
            created_at: m.created_at,
        }
    }
}

impl TryFrom<StockMovementRow> for StockMovement {
    type Error = DomainError;

    fn try_from(row: StockMovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            order_id: row.order_id,
            direction: row.direction.parse()?,
            quantity: row.quantity,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bank_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BankAccountRow {
    pub bank_name: String,
    pub iban: String,
    pub account_holder: String,
}

impl From<BankAccountRow> for BankAccount {
    fn from(row: BankAccountRow) -> Self {
        BankAccount {
            bank_name: row.bank_name,
            iban: row.iban,
            account_holder: row.account_holder,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bank_accounts)]
pub struct NewBankAccountRow<'a> {
    pub id: Uuid,
    pub bank_name: &'a str,
    pub iban: &'a str,
    pub account_holder: &'a str,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = transfer_notifications)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransferRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub amount: BigDecimal,
    pub transfer_date: NaiveDate,
    pub note: Option<String>,
    pub status: String,
    pub admin_note: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub bank_name: String,
    pub iban: String,
    pub account_holder: String,
    pub created_at: DateTime<Utc>,
}

impl From<&TransferNotification> for TransferRow {
    fn from(t: &TransferNotification) -> Self {
        TransferRow {
            id: t.id,
            order_id: t.order_id,
            customer_name: t.customer_name.clone(),
            customer_email: t.customer_email.clone(),
            customer_phone: t.customer_phone.clone(),
            amount: t.amount.clone(),
            transfer_date: t.transfer_date,
            note: t.note.clone(),
            status: t.status.as_str().to_string(),
            admin_note: t.admin_note.clone(),
            confirmed_at: t.confirmed_at,
            decided_at: t.decided_at,
            bank_name: t.bank.bank_name.clone(),
            iban: t.bank.iban.clone(),
            account_holder: t.bank.account_holder.clone(),
            created_at: t.created_at,
        }
    }
}

impl TryFrom<TransferRow> for TransferNotification {
    type Error = DomainError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(TransferNotification {
            id: row.id,
            order_id: row.order_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            amount: row.amount,
            transfer_date: row.transfer_date,
            note: row.note,
            status: row.status.parse()?,
            admin_note: row.admin_note,
            confirmed_at: row.confirmed_at,
            decided_at: row.decided_at,
            bank: BankAccount {
                bank_name: row.bank_name,
                iban: row.iban,
                account_holder: row.account_holder,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable, AsChangeset)]
#[diesel(table_name = outbox_messages)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub kind: String,
    pub recipient: String,
    pub payload: Value,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub abandoned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&OutboxMessage> for OutboxRow {
    fn from(m: &OutboxMessage) -> Self {
        OutboxRow {
            id: m.id,
            aggregate_type: m.aggregate_type.clone(),
            aggregate_id: m.aggregate_id.clone(),
            kind: m.kind.as_str().to_string(),
            recipient: m.recipient.clone(),
            payload: m.data.clone(),
            attempts: m.attempts,
            last_error: m.last_error.clone(),
            available_at: m.available_at,
            dispatched_at: m.dispatched_at,
            abandoned_at: m.abandoned_at,
            created_at: m.created_at,
        }
    }
}

impl TryFrom<OutboxRow> for OutboxMessage {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxMessage {
            id: row.id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            kind: row.kind.parse()?,
            recipient: row.recipient,
            data: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
            available_at: row.available_at,
            dispatched_at: row.dispatched_at,
            abandoned_at: row.abandoned_at,
            created_at: row.created_at,
        })
    }
}
