use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;

/// Side effects a committed transition asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    OrderReceived,
    OrderPaid,
    OrderApproved,
    OrderRejected,
    PaymentFailed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    ReturnApproved,
    ReturnRejected,
    ExchangeApproved,
    ExchangeRejected,
    TransferInstructions,
    TransferExpected,
    TransferConfirmed,
    TransferRejected,
}

impl NotificationKind {
    const ALL: [NotificationKind; 16] = [
        NotificationKind::OrderReceived,
        NotificationKind::OrderPaid,
        NotificationKind::OrderApproved,
        NotificationKind::OrderRejected,
        NotificationKind::PaymentFailed,
        NotificationKind::OrderShipped,
        NotificationKind::OrderDelivered,
        NotificationKind::OrderCancelled,
        NotificationKind::ReturnApproved,
        NotificationKind::ReturnRejected,
        NotificationKind::ExchangeApproved,
        NotificationKind::ExchangeRejected,
        NotificationKind::TransferInstructions,
        NotificationKind::TransferExpected,
        NotificationKind::TransferConfirmed,
        NotificationKind::TransferRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderReceived => "OrderReceived",
            NotificationKind::OrderPaid => "OrderPaid",
            NotificationKind::OrderApproved => "OrderApproved",
            NotificationKind::OrderRejected => "OrderRejected",
            NotificationKind::PaymentFailed => "PaymentFailed",
            NotificationKind::OrderShipped => "OrderShipped",
            NotificationKind::OrderDelivered => "OrderDelivered",
            NotificationKind::OrderCancelled => "OrderCancelled",
            NotificationKind::ReturnApproved => "ReturnApproved",
            NotificationKind::ReturnRejected => "ReturnRejected",
            NotificationKind::ExchangeApproved => "ExchangeApproved",
            NotificationKind::ExchangeRejected => "ExchangeRejected",
            NotificationKind::TransferInstructions => "TransferInstructions",
            NotificationKind::TransferExpected => "TransferExpected",
            NotificationKind::TransferConfirmed => "TransferConfirmed",
            NotificationKind::TransferRejected => "TransferRejected",
        }
    }

    /// Subject line used by mail-based notifiers.
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::OrderReceived => "We received your order",
            NotificationKind::OrderPaid => "Payment received",
            NotificationKind::OrderApproved => "Your order is approved",
            NotificationKind::OrderRejected => "Your order could not be accepted",
            NotificationKind::PaymentFailed => "Your payment failed",
            NotificationKind::OrderShipped => "Your order has shipped",
            NotificationKind::OrderDelivered => "Your order was delivered",
            NotificationKind::OrderCancelled => "Your order was cancelled",
            NotificationKind::ReturnApproved => "Return approved",
            NotificationKind::ReturnRejected => "Return declined",
            NotificationKind::ExchangeApproved => "Exchange approved",
            NotificationKind::ExchangeRejected => "Exchange declined",
            NotificationKind::TransferInstructions => "Bank transfer details",
            NotificationKind::TransferExpected => "Incoming bank transfer declared",
            NotificationKind::TransferConfirmed => "Your transfer was confirmed",
            NotificationKind::TransferRejected => "Your transfer could not be verified",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::Internal(format!("unknown notification kind '{s}'")))
    }
}

/// A side-effect intent written in the same transaction as the state change
/// that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub kind: NotificationKind,
    pub recipient: String,
    pub data: Value,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub abandoned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn new(
        aggregate_type: &str,
        aggregate_id: Uuid,
        kind: NotificationKind,
        recipient: &str,
        data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        OutboxMessage {
            id: Uuid::new_v4(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            kind,
            recipient: recipient.to_string(),
            data,
            attempts: 0,
            last_error: None,
            available_at: now,
            dispatched_at: None,
            abandoned_at: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.dispatched_at.is_none() && self.abandoned_at.is_none() && self.available_at <= now
    }

    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_error = None;
        self.dispatched_at = Some(now);
    }

    /// Reschedules with linear backoff, or abandons once `max_attempts` is hit.
    pub fn record_failure(
        &mut self,
        error: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
        backoff: Duration,
    ) {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        if self.attempts >= max_attempts {
            self.abandoned_at = Some(now);
        } else {
            self.available_at = now + backoff * self.attempts;
        }
    }
}
