use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::application::order_service::{execute_transition, TransitionOutcome};
use crate::domain::errors::DomainError;
use crate::domain::order::PaymentMethod;
use crate::domain::outbox::{NotificationKind, OutboxMessage};
use crate::domain::ports::{transaction, Store};
use crate::domain::transfer::{
    BankAccount, TransferDeclaration, TransferDecision, TransferNotification,
};
use crate::domain::transition::{TransitionCommand, TransitionOrigin};

pub const TRANSFER_AGGREGATE: &str = "TransferNotification";

/// Result of a customer's transfer declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub order_id: Uuid,
    pub bank: BankAccount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    pub transfer: TransferNotification,
    /// Set when a confirmation moved the order.
    pub order: Option<TransitionOutcome>,
}

/// Manual payment channel: customers declare a transfer, an admin decides.
pub struct BankTransferService {
    store: Arc<dyn Store>,
    business_email: String,
}

impl BankTransferService {
    pub fn new(store: Arc<dyn Store>, business_email: impl Into<String>) -> Self {
        Self {
            store,
            business_email: business_email.into(),
        }
    }

    /// Records the declaration with a frozen copy of the receiving account and
    /// moves the order to `AWAITING_PAYMENT`.
    pub fn submit(
        &self,
        order_id: Uuid,
        declaration: TransferDeclaration,
    ) -> Result<TransferReceipt, DomainError> {
        declaration.validate()?;
        let now = Utc::now();

        let receipt = transaction(self.store.as_ref(), |uow| {
            if uow.find_order(order_id)?.is_none() {
                return Err(DomainError::not_found("Order", order_id));
            }
            let bank = uow.active_bank_account()?.ok_or_else(|| {
                DomainError::Configuration("no active receiving bank account".into())
            })?;

            let transfer = TransferNotification::new(order_id, declaration, bank, now);
            uow.insert_transfer(&transfer)?;
            execute_transition(
                uow,
                order_id,
                &TransitionCommand::AwaitTransfer {
                    transfer_id: transfer.id,
                },
                &TransitionOrigin::BankTransfer {
                    actor: "customer".into(),
                },
                now,
            )?;

            let data = transfer_data(&transfer);
            uow.enqueue(&OutboxMessage::new(
                TRANSFER_AGGREGATE,
                transfer.id,
                NotificationKind::TransferInstructions,
                &transfer.customer_email,
                data.clone(),
                now,
            ))?;
            uow.enqueue(&OutboxMessage::new(
                TRANSFER_AGGREGATE,
                transfer.id,
                NotificationKind::TransferExpected,
                &self.business_email,
                data,
                now,
            ))?;

            Ok(TransferReceipt {
                transfer_id: transfer.id,
                order_id,
                bank: transfer.bank,
            })
        })?;

        log::info!(
            "order {order_id}: bank transfer {} declared, awaiting review",
            receipt.transfer_id
        );
        Ok(receipt)
    }

    /// Applies an admin verdict. A notification is decided once; a second call
    /// fails with `StaleRecord` and changes nothing. Rejection leaves the order
    /// where it is.
    pub fn decide(
        &self,
        transfer_id: Uuid,
        decision: TransferDecision,
        admin_note: Option<String>,
        admin_id: &str,
    ) -> Result<DecisionResult, DomainError> {
        let now = Utc::now();

        let result = transaction(self.store.as_ref(), |uow| {
            let mut transfer = uow
                .lock_transfer(transfer_id)?
                .ok_or_else(|| DomainError::not_found("Transfer notification", transfer_id))?;
            transfer.decide(decision, admin_note.clone(), now)?;
            uow.update_transfer(&transfer)?;

            let (order, kind) = match decision {
                TransferDecision::Confirmed => {
                    let outcome = execute_transition(
                        uow,
                        transfer.order_id,
                        &TransitionCommand::ConfirmPayment {
                            method: PaymentMethod::BankTransfer,
                            reference: format!("transfer {}", transfer.id),
                        },
                        &TransitionOrigin::BankTransfer {
                            actor: admin_id.to_string(),
                        },
                        now,
                    )?;
                    (Some(outcome), NotificationKind::TransferConfirmed)
                }
                TransferDecision::Rejected => (None, NotificationKind::TransferRejected),
            };

            uow.enqueue(&OutboxMessage::new(
                TRANSFER_AGGREGATE,
                transfer.id,
                kind,
                &transfer.customer_email,
                transfer_data(&transfer),
                now,
            ))?;

            Ok(DecisionResult { transfer, order })
        })?;

        log::info!(
            "transfer {transfer_id} {} by admin {admin_id}",
            result.transfer.status
        );
        Ok(result)
    }

    pub fn get(&self, transfer_id: Uuid) -> Result<TransferNotification, DomainError> {
        transaction(self.store.as_ref(), |uow| {
            uow.find_transfer(transfer_id)?
                .ok_or_else(|| DomainError::not_found("Transfer notification", transfer_id))
        })
    }
}

fn transfer_data(transfer: &TransferNotification) -> serde_json::Value {
    json!({
        "transfer_id": transfer.id,
        "order_id": transfer.order_id,
        "customer_name": transfer.customer_name,
        "customer_email": transfer.customer_email,
        "customer_phone": transfer.customer_phone,
        "amount": transfer.amount.to_string(),
        "transfer_date": transfer.transfer_date.to_string(),
        "note": transfer.note,
        "status": transfer.status.as_str(),
        "admin_note": transfer.admin_note,
        "bank_name": transfer.bank.bank_name,
        "iban": transfer.bank.iban,
        "account_holder": transfer.bank.account_holder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::domain::transfer::TransferStatus;
    use crate::infrastructure::memory_store::MemoryStore;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn declaration() -> TransferDeclaration {
        TransferDeclaration {
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: Some("555".into()),
            amount: BigDecimal::from(20),
            transfer_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            note: Some("sent from my account".into()),
        }
    }

    fn setup() -> (Arc<MemoryStore>, BankTransferService, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        store.add_bank_account("First Bank", "TR12 0006 4000 0011 2345 6789 01", "Shop Ltd");
        let product = store.add_product("Mug", 10);
        let user = store.add_user("Ada", "ada@example.com");
        let order = store.add_order(user, &[(product, 2, "10.00")], OrderStatus::Pending);
        let service = BankTransferService::new(store.clone(), "orders@shop.example");
        (store, service, order, product)
    }

    #[test]
    fn submit_freezes_bank_details_and_awaits_payment() {
        let (store, service, order, _) = setup();
        let receipt = service.submit(order, declaration()).unwrap();

        assert_eq!(receipt.bank.bank_name, "First Bank");
        assert_eq!(store.order(order).unwrap().status, OrderStatus::AwaitingPayment);

        store.add_bank_account("Other Bank", "TR99", "New Holder");
        let stored = service.get(receipt.transfer_id).unwrap();
        assert_eq!(stored.bank.bank_name, "First Bank");

        let kinds: Vec<_> = store.outbox().iter().map(|m| (m.kind, m.recipient.clone())).collect();
        assert!(kinds.contains(&(
            NotificationKind::TransferInstructions,
            "ada@example.com".to_string()
        )));
        assert!(kinds.contains(&(
            NotificationKind::TransferExpected,
            "orders@shop.example".to_string()
        )));
    }

    #[test]
    fn submit_for_unknown_order_is_not_found() {
        let (store, service, _, _) = setup();
        let before = store.outbox().len();
        let err = service.submit(Uuid::new_v4(), declaration()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(store.outbox().len(), before);
    }

    #[test]
    fn submit_without_bank_account_is_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let product = store.add_product("Mug", 10);
        let user = store.add_user("Ada", "ada@example.com");
        let order = store.add_order(user, &[(product, 1, "10.00")], OrderStatus::Pending);
        let service = BankTransferService::new(store.clone(), "orders@shop.example");

        let err = service.submit(order, declaration()).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
        assert_eq!(store.order(order).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn confirm_pays_the_order_and_takes_stock() {
        let (store, service, order, product) = setup();
        let receipt = service.submit(order, declaration()).unwrap();

        let result = service
            .decide(receipt.transfer_id, TransferDecision::Confirmed, None, "admin-1")
            .unwrap();

        assert_eq!(result.transfer.status, TransferStatus::Confirmed);
        assert!(result.transfer.confirmed_at.is_some());
        assert_eq!(result.order.unwrap().status(), OrderStatus::Paid);
        assert_eq!(store.stock_of(product), Some(8));
    }

    #[test]
    fn reject_leaves_order_and_stock_alone() {
        let (store, service, order, product) = setup();
        let receipt = service.submit(order, declaration()).unwrap();

        let result = service
            .decide(
                receipt.transfer_id,
                TransferDecision::Rejected,
                Some("no matching deposit".into()),
                "admin-1",
            )
            .unwrap();

        assert_eq!(result.transfer.status, TransferStatus::Rejected);
        assert!(result.order.is_none());
        assert_eq!(store.order(order).unwrap().status, OrderStatus::AwaitingPayment);
        assert!(store.movements_for(product).is_empty());
    }

    #[test]
    fn second_decision_fails_without_side_effects() {
        let (store, service, order, product) = setup();
        let receipt = service.submit(order, declaration()).unwrap();
        service
            .decide(receipt.transfer_id, TransferDecision::Confirmed, None, "admin-1")
            .unwrap();
        let movements = store.movements_for(product).len();

        let err = service
            .decide(receipt.transfer_id, TransferDecision::Confirmed, None, "admin-2")
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.movements_for(product).len(), movements);
    }
}
