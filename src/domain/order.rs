use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Authoritative order status. Stored as its SCREAMING_SNAKE_CASE name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Paid,
    Approved,
    Rejected,
    Failed,
    Shipped,
    Delivered,
    Cancelled,
    ReturnApproved,
    ReturnRejected,
    ExchangeApproved,
    ExchangeRejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 13] = [
        OrderStatus::Pending,
        OrderStatus::AwaitingPayment,
        OrderStatus::Paid,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Failed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::ReturnApproved,
        OrderStatus::ReturnRejected,
        OrderStatus::ExchangeApproved,
        OrderStatus::ExchangeRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::ReturnApproved => "RETURN_APPROVED",
            OrderStatus::ReturnRejected => "RETURN_REJECTED",
            OrderStatus::ExchangeApproved => "EXCHANGE_APPROVED",
            OrderStatus::ExchangeRejected => "EXCHANGE_REJECTED",
        }
    }

    /// No further transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected
                | OrderStatus::Failed
                | OrderStatus::Cancelled
                | OrderStatus::ReturnApproved
                | OrderStatus::ReturnRejected
                | OrderStatus::ExchangeApproved
                | OrderStatus::ExchangeRejected
        )
    }

    /// Statuses from which a paid order can be returned or exchanged.
    pub fn is_fulfilment_stage(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Approved | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Explanation shown to customers instead of the raw status code.
    pub fn customer_description(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "We have received your order and are waiting for payment.",
            OrderStatus::AwaitingPayment => {
                "Your bank transfer notice was received and is being checked."
            }
            OrderStatus::Paid => "Your payment was received. We are preparing your order.",
            OrderStatus::Approved => "Your order was approved and is being prepared.",
            OrderStatus::Rejected => "Your order could not be accepted. Please contact us.",
            OrderStatus::Failed => "Your payment did not go through. You can try again.",
            OrderStatus::Shipped => "Your order is on its way.",
            OrderStatus::Delivered => "Your order was delivered.",
            OrderStatus::Cancelled => "Your order was cancelled.",
            OrderStatus::ReturnApproved => "Your return was approved.",
            OrderStatus::ReturnRejected => "Your return request was declined.",
            OrderStatus::ExchangeApproved => "Your exchange was approved.",
            OrderStatus::ExchangeRejected => "Your exchange request was declined.",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Internal(format!("unknown order status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    HostedCard,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::HostedCard => "HOSTED_CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOSTED_CARD" => Ok(PaymentMethod::HostedCard),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            other => Err(DomainError::InvalidInput(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// Guest checkout contact details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Where customer notifications for an order go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tracking {
    pub shipping_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    /// Last status reported by the carrier, e.g. `IN_TRANSIT`.
    pub carrier_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExchangeRequest {
    pub product_id: Option<Uuid>,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Milestones {
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub return_approved_at: Option<DateTime<Utc>>,
    pub exchange_approved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest: Option<GuestContact>,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub discount: BigDecimal,
    pub payment_method: Option<PaymentMethod>,
    pub tracking: Tracking,
    pub exchange: ExchangeRequest,
    pub admin_notes: String,
    pub invoice_reference: Option<String>,
    pub milestones: Milestones,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Payment has been captured for this order at some point.
    pub fn is_paid(&self) -> bool {
        self.milestones.paid_at.is_some()
    }

    /// Appends a timestamped line to the admin audit trail.
    pub fn append_note(&mut self, at: DateTime<Utc>, author: &str, text: &str) {
        if !self.admin_notes.is_empty() {
            self.admin_notes.push('\n');
        }
        self.admin_notes
            .push_str(&format!("[{}] {}: {}", at.to_rfc3339(), author, text));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_no: i32,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl OrderItem {
    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

/// Input for a new order line.
#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Input for order intake. Exactly one of `user_id` or `guest` must be set.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub guest: Option<GuestContact>,
    pub lines: Vec<OrderLineInput>,
    pub shipping_cost: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
    pub payment_method: Option<PaymentMethod>,
}

impl NewOrder {
    /// Checks contact exclusivity, line quantities and the total invariant.
    pub fn validate(&self) -> Result<(), DomainError> {
        match (&self.user_id, &self.guest) {
            (Some(_), None) => {}
            (None, Some(guest)) => {
                if guest.name.trim().is_empty() || guest.email.trim().is_empty() {
                    return Err(DomainError::InvalidInput(
                        "guest orders need a name and an email".into(),
                    ));
                }
            }
            _ => {
                return Err(DomainError::InvalidInput(
                    "exactly one of user or guest contact must be provided".into(),
                ))
            }
        }

        if self.lines.is_empty() {
            return Err(DomainError::InvalidInput("an order needs at least one line".into()));
        }
        if let Some(line) = self.lines.iter().find(|l| l.quantity <= 0) {
            return Err(DomainError::InvalidInput(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }

        let items: BigDecimal = self
            .lines
            .iter()
            .map(|l| &l.unit_price * BigDecimal::from(l.quantity))
            .sum();
        let expected = items + &self.shipping_cost - &self.discount;
        if expected != self.total_amount {
            return Err(DomainError::InvalidInput(format!(
                "total {} does not match items plus shipping minus discount ({})",
                self.total_amount, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().expect("valid decimal")
    }

    fn new_order() -> NewOrder {
        NewOrder {
            user_id: Some(Uuid::new_v4()),
            guest: None,
            lines: vec![
                OrderLineInput {
                    product_id: Uuid::new_v4(),
                    quantity: 2,
                    unit_price: dec("10.50"),
                    size: None,
                    color: None,
                },
                OrderLineInput {
                    product_id: Uuid::new_v4(),
                    quantity: 1,
                    unit_price: dec("4.00"),
                    size: Some("M".into()),
                    color: None,
                },
            ],
            shipping_cost: dec("5"),
            discount: dec("2.00"),
            total_amount: dec("28.00"),
            payment_method: None,
        }
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPING".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::ReturnApproved.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn valid_order_passes() {
        assert!(new_order().validate().is_ok());
    }

    #[test]
    fn total_mismatch_is_rejected() {
        let mut order = new_order();
        order.total_amount = dec("30.00");
        assert!(matches!(order.validate(), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn both_user_and_guest_is_rejected() {
        let mut order = new_order();
        order.guest = Some(GuestContact {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: None,
        });
        assert!(order.validate().is_err());
    }

    #[test]
    fn neither_user_nor_guest_is_rejected() {
        let mut order = new_order();
        order.user_id = None;
        assert!(order.validate().is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut order = new_order();
        order.lines[0].quantity = 0;
        assert!(order.validate().is_err());
    }

    #[test]
    fn notes_are_appended_line_by_line() {
        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            user_id: None,
            guest: None,
            status: OrderStatus::Pending,
            total_amount: dec("1"),
            shipping_cost: dec("0"),
            discount: dec("0"),
            payment_method: None,
            tracking: Tracking::default(),
            exchange: ExchangeRequest::default(),
            admin_notes: String::new(),
            invoice_reference: None,
            milestones: Milestones::default(),
            created_at: now,
            updated_at: now,
        };
        order.append_note(now, "system", "first");
        order.append_note(now, "admin:7", "second");
        let lines: Vec<&str> = order.admin_notes.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("system: first"));
        assert!(lines[1].ends_with("admin:7: second"));
    }
}
