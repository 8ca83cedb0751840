use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::application::order_service::ORDER_AGGREGATE;
use crate::domain::errors::DomainError;
use crate::domain::outbox::{NotificationKind, OutboxMessage};
use crate::domain::ports::{transaction, CompanyInfo, InvoiceGenerator, Notifier, Store};

/// What one dispatch pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Delivers outbox intents after the transitions that wrote them committed.
///
/// A message is leased in one short transaction, delivered with no
/// transaction open, then marked in a second one. A crash between the two
/// leaves the lease to expire and the message is sent again.
pub struct OutboxDispatcher {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    invoices: Arc<dyn InvoiceGenerator>,
    company: CompanyInfo,
    max_attempts: i32,
    backoff: Duration,
    lease: Duration,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        invoices: Arc<dyn InvoiceGenerator>,
        company: CompanyInfo,
        max_attempts: i32,
    ) -> Self {
        Self {
            store,
            notifier,
            invoices,
            company,
            max_attempts: max_attempts.max(1),
            backoff: Duration::seconds(30),
            lease: Duration::minutes(5),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Handles up to `batch` due messages.
    pub fn dispatch_pending(&self, batch: usize) -> Result<DispatchSummary, DomainError> {
        let mut summary = DispatchSummary::default();
        for _ in 0..batch {
            let Some(mut message) = self.claim()? else {
                break;
            };

            let result = self.deliver(&mut message);
            let now = Utc::now();
            match &result {
                Ok(()) => message.mark_dispatched(now),
                Err(e) => message.record_failure(&e.to_string(), now, self.max_attempts, self.backoff),
            }
            transaction(self.store.as_ref(), |uow| uow.update_outbox(&message))?;

            match result {
                Ok(()) => {
                    summary.dispatched += 1;
                    log::debug!("outbox {}: {} sent to {}", message.id, message.kind, message.recipient);
                }
                Err(e) if message.abandoned_at.is_some() => {
                    summary.abandoned += 1;
                    log::error!(
                        "outbox {}: giving up on {} after {} attempts: {e}",
                        message.id,
                        message.kind,
                        message.attempts
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    log::warn!(
                        "outbox {}: {} failed (attempt {}), retrying at {}: {e}",
                        message.id,
                        message.kind,
                        message.attempts,
                        message.available_at
                    );
                }
            }
        }
        Ok(summary)
    }

    /// Takes the next due message and hides it from other dispatchers until
    /// the lease runs out.
    fn claim(&self) -> Result<Option<OutboxMessage>, DomainError> {
        transaction(self.store.as_ref(), |uow| {
            let now = Utc::now();
            let Some(mut message) = uow.claim_outbox(now)? else {
                return Ok(None);
            };
            message.available_at = now + self.lease;
            uow.update_outbox(&message)?;
            Ok(Some(message))
        })
    }

    fn deliver(&self, message: &mut OutboxMessage) -> Result<(), DomainError> {
        if message.kind == NotificationKind::OrderApproved {
            if let Some(reference) = self.ensure_invoice(message)? {
                message.data["invoice_reference"] = Value::String(reference);
            }
        }
        self.notifier
            .send(message.kind, &message.recipient, &message.data)
            .map_err(|e| match e {
                DomainError::SideEffect(_) => e,
                other => DomainError::SideEffect(other.to_string()),
            })
    }

    /// Generates the invoice for an approved order once and stores its
    /// reference on the order. A generator failure is logged and the
    /// notification goes out without an invoice.
    ///
    /// The generator runs between two short transactions; the reference is
    /// only written if no other dispatcher stored one meanwhile.
    fn ensure_invoice(&self, message: &OutboxMessage) -> Result<Option<String>, DomainError> {
        if message.aggregate_type != ORDER_AGGREGATE {
            return Ok(None);
        }
        let Ok(order_id) = Uuid::parse_str(&message.aggregate_id) else {
            return Ok(None);
        };
        let snapshot = transaction(self.store.as_ref(), |uow| {
            let Some(order) = uow.lock_order(order_id)? else {
                return Ok(None);
            };
            let items = uow.order_items(order_id)?;
            Ok(Some((order, items)))
        })?;
        let Some((order, items)) = snapshot else {
            return Ok(None);
        };
        if let Some(reference) = &order.invoice_reference {
            return Ok(Some(reference.clone()));
        }

        let reference = match self.invoices.generate(&order, &items, &self.company) {
            Ok(reference) => reference,
            Err(e) => {
                log::error!("order {order_id}: invoice generation failed: {e}");
                return Ok(None);
            }
        };

        transaction(self.store.as_ref(), |uow| {
            let Some(mut current) = uow.lock_order(order_id)? else {
                return Ok(None);
            };
            if let Some(existing) = &current.invoice_reference {
                log::warn!("order {order_id}: invoice {existing} already stored; discarding {reference}");
                return Ok(Some(existing.clone()));
            }
            current.invoice_reference = Some(reference.clone());
            uow.update_order(&current)?;
            log::info!("order {order_id}: invoice {reference} generated");
            Ok(Some(reference.clone()))
        })
    }
}
