//! Order status transitions.
//!
//! `plan` is pure: given the locked order, its items and a command, it
//! returns the next order state plus the stock movements and notification the
//! transition implies. Applying the plan atomically is the caller's job.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{ExchangeRequest, Order, OrderItem, OrderStatus, PaymentMethod};
use super::outbox::NotificationKind;
use super::stock::Direction;

/// Who is asking for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOrigin {
    PaymentGateway,
    BankTransfer { actor: String },
    Admin { admin_id: String },
    Carrier,
}

impl TransitionOrigin {
    pub fn author(&self) -> String {
        match self {
            TransitionOrigin::PaymentGateway => "gateway".to_string(),
            TransitionOrigin::BankTransfer { actor } => format!("bank-transfer:{actor}"),
            TransitionOrigin::Admin { admin_id } => format!("admin:{admin_id}"),
            TransitionOrigin::Carrier => "carrier".to_string(),
        }
    }

    /// Automated sources retry; a stale source status from them is a duplicate.
    pub fn acknowledges_stale(&self) -> bool {
        matches!(
            self,
            TransitionOrigin::PaymentGateway | TransitionOrigin::Carrier
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingInput {
    pub shipping_company: String,
    pub tracking_number: String,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCommand {
    ConfirmPayment {
        method: PaymentMethod,
        reference: String,
    },
    AwaitTransfer {
        transfer_id: Uuid,
    },
    Approve,
    Reject {
        reason: String,
    },
    FailPayment {
        reason: String,
    },
    Ship(TrackingInput),
    MarkDelivered,
    Cancel {
        reason: String,
    },
    ApproveReturn {
        note: Option<String>,
    },
    RejectReturn {
        note: Option<String>,
    },
    ApproveExchange {
        replacement: ExchangeRequest,
        note: Option<String>,
    },
    RejectExchange {
        note: Option<String>,
    },
}

impl TransitionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionCommand::ConfirmPayment { .. } => "confirm payment",
            TransitionCommand::AwaitTransfer { .. } => "await bank transfer",
            TransitionCommand::Approve => "approve",
            TransitionCommand::Reject { .. } => "reject",
            TransitionCommand::FailPayment { .. } => "fail payment",
            TransitionCommand::Ship(_) => "ship",
            TransitionCommand::MarkDelivered => "mark delivered",
            TransitionCommand::Cancel { .. } => "cancel",
            TransitionCommand::ApproveReturn { .. } => "approve return",
            TransitionCommand::RejectReturn { .. } => "reject return",
            TransitionCommand::ApproveExchange { .. } => "approve exchange",
            TransitionCommand::RejectExchange { .. } => "reject exchange",
        }
    }

    fn permits(&self, origin: &TransitionOrigin) -> bool {
        use TransitionOrigin as O;
        match self {
            TransitionCommand::ConfirmPayment { method, .. } => matches!(
                (method, origin),
                (PaymentMethod::HostedCard, O::PaymentGateway)
                    | (PaymentMethod::BankTransfer, O::BankTransfer { .. })
            ),
            TransitionCommand::FailPayment { .. } => matches!(origin, O::PaymentGateway),
            TransitionCommand::AwaitTransfer { .. } => matches!(origin, O::BankTransfer { .. }),
            TransitionCommand::MarkDelivered => matches!(origin, O::Admin { .. } | O::Carrier),
            _ => matches!(origin, O::Admin { .. }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDirective {
    pub product_id: Uuid,
    pub direction: Direction,
    pub quantity: i32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    /// The order as it must be persisted.
    pub order: Order,
    /// Applied in order, all-or-nothing, together with the order write.
    pub stock: Vec<StockDirective>,
    pub notification: Option<NotificationKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    Transition(Box<TransitionPlan>),
    /// The order already reflects the command (idempotent re-delivery).
    AlreadyApplied,
}

/// Computes the transition for `command` against the current `order`.
pub fn plan(
    order: &Order,
    items: &[OrderItem],
    command: &TransitionCommand,
    origin: &TransitionOrigin,
    now: DateTime<Utc>,
) -> Result<Planned, DomainError> {
    use OrderStatus::*;
    use TransitionCommand as C;

    if !command.permits(origin) {
        return Err(DomainError::Unauthorized(format!(
            "{} may not {}",
            origin.author(),
            command.name()
        )));
    }

    let author = origin.author();
    let mut next = order.clone();
    next.updated_at = now;
    let mut stock = Vec::new();

    let (to, notification) = match (order.status, command) {
        (from @ (Pending | AwaitingPayment | Approved), C::ConfirmPayment { method, reference })
            if from != Approved || !order.is_paid() =>
        {
            next.payment_method = Some(*method);
            next.milestones.paid_at = Some(now);
            next.append_note(
                now,
                &author,
                &format!("payment confirmed via {method} ({reference})"),
            );
            stock = item_movements(
                items,
                Direction::Out,
                &format!("Order {} paid via {method}", order.id),
            );
            // Approved before payment: the approval stands.
            let to = if from == Approved { Approved } else { Paid };
            (to, Some(NotificationKind::OrderPaid))
        }
        (Pending, C::AwaitTransfer { transfer_id }) => {
            next.payment_method = Some(PaymentMethod::BankTransfer);
            next.append_note(
                now,
                &author,
                &format!("bank transfer {transfer_id} declared by customer"),
            );
            (AwaitingPayment, None)
        }
        (Pending | Paid, C::Approve) => {
            next.append_note(now, &author, "order approved");
            (Approved, Some(NotificationKind::OrderApproved))
        }
        (Pending | Paid, C::Reject { reason }) => {
            let reason = required_text(reason, "a rejection reason")?;
            next.append_note(now, &author, &format!("order rejected: {reason}"));
            (Rejected, Some(NotificationKind::OrderRejected))
        }
        (Pending | AwaitingPayment, C::FailPayment { reason }) => {
            next.append_note(now, &author, &format!("payment failed: {reason}"));
            (Failed, Some(NotificationKind::PaymentFailed))
        }
        (Approved, C::FailPayment { reason }) if !order.is_paid() => {
            next.append_note(now, &author, &format!("payment failed: {reason}"));
            (Failed, Some(NotificationKind::PaymentFailed))
        }
        (Paid | Approved, C::Ship(tracking)) => {
            let company = required_text(&tracking.shipping_company, "a shipping company")?;
            let number = required_text(&tracking.tracking_number, "a tracking number")?;
            next.tracking.shipping_company = Some(company.to_string());
            next.tracking.tracking_number = Some(number.to_string());
            next.tracking.tracking_url = tracking.tracking_url.clone();
            next.tracking.carrier_status = None;
            next.milestones.shipped_at = Some(now);
            next.append_note(now, &author, &format!("shipped with {company} ({number})"));
            (Shipped, Some(NotificationKind::OrderShipped))
        }
        (Shipped, C::MarkDelivered) => {
            next.milestones.delivered_at = Some(now);
            next.append_note(now, &author, "delivery confirmed");
            (Delivered, Some(NotificationKind::OrderDelivered))
        }
        (Delivered, C::MarkDelivered) => return Ok(Planned::AlreadyApplied),
        (Pending | AwaitingPayment | Paid | Approved, C::Cancel { reason }) => {
            let reason = required_text(reason, "a cancellation reason")?;
            if order.is_paid() {
                stock = item_movements(
                    items,
                    Direction::In,
                    &format!("Order {} cancelled after payment", order.id),
                );
            }
            next.milestones.cancelled_at = Some(now);
            next.append_note(now, &author, &format!("order cancelled: {reason}"));
            (Cancelled, Some(NotificationKind::OrderCancelled))
        }
        (Paid | Approved | Shipped | Delivered, C::ApproveReturn { note }) if order.is_paid() => {
            stock = item_movements(
                items,
                Direction::In,
                &format!("Order {} return approved", order.id),
            );
            next.milestones.return_approved_at = Some(now);
            next.append_note(now, &author, &with_note("return approved", note));
            (ReturnApproved, Some(NotificationKind::ReturnApproved))
        }
        (Paid | Approved | Shipped | Delivered, C::RejectReturn { note }) if order.is_paid() => {
            next.append_note(now, &author, &with_note("return rejected", note));
            (ReturnRejected, Some(NotificationKind::ReturnRejected))
        }
        (Paid | Approved | Shipped | Delivered, C::ApproveExchange { replacement, note })
            if order.is_paid() =>
        {
            let product_id = replacement
                .product_id
                .or_else(|| items.first().map(|item| item.product_id))
                .ok_or_else(|| {
                    DomainError::InvalidInput("order has no items to exchange".into())
                })?;
            stock = item_movements(
                items,
                Direction::In,
                &format!("Order {} exchange approved: original returned", order.id),
            );
            stock.push(StockDirective {
                product_id,
                direction: Direction::Out,
                quantity: 1,
                description: format!(
                    "Order {} exchange approved: replacement sent{}",
                    order.id,
                    variant_suffix(replacement)
                ),
            });
            next.exchange = ExchangeRequest {
                product_id: Some(product_id),
                size: replacement.size.clone(),
                color: replacement.color.clone(),
            };
            next.milestones.exchange_approved_at = Some(now);
            next.append_note(now, &author, &with_note("exchange approved", note));
            (ExchangeApproved, Some(NotificationKind::ExchangeApproved))
        }
        (Paid | Approved | Shipped | Delivered, C::RejectExchange { note }) if order.is_paid() => {
            next.append_note(now, &author, &with_note("exchange rejected", note));
            (ExchangeRejected, Some(NotificationKind::ExchangeRejected))
        }
        (current, command) => {
            return Err(DomainError::Conflict {
                action: command.name(),
                current,
            })
        }
    };

    next.status = to;
    Ok(Planned::Transition(Box::new(TransitionPlan {
        from: order.status,
        order: next,
        stock,
        notification,
    })))
}

fn item_movements(items: &[OrderItem], direction: Direction, description: &str) -> Vec<StockDirective> {
    items
        .iter()
        .map(|item| StockDirective {
            product_id: item.product_id,
            direction,
            quantity: item.quantity,
            description: description.to_string(),
        })
        .collect()
}

fn required_text<'a>(value: &'a str, what: &str) -> Result<&'a str, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput(format!("{what} is required")));
    }
    Ok(trimmed)
}

fn with_note(base: &str, note: &Option<String>) -> String {
    match note.as_deref().map(str::trim) {
        Some(note) if !note.is_empty() => format!("{base}: {note}"),
        _ => base.to_string(),
    }
}

fn variant_suffix(replacement: &ExchangeRequest) -> String {
    let parts: Vec<String> = [
        replacement.size.as_ref().map(|s| format!("size {s}")),
        replacement.color.as_ref().map(|c| format!("color {c}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Milestones, Tracking};
    use bigdecimal::BigDecimal;

    fn order(status: OrderStatus, paid: bool) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            guest: None,
            status,
            total_amount: BigDecimal::from(30),
            shipping_cost: BigDecimal::from(0),
            discount: BigDecimal::from(0),
            payment_method: None,
            tracking: Tracking::default(),
            exchange: ExchangeRequest::default(),
            admin_notes: String::new(),
            invoice_reference: None,
            milestones: Milestones {
                paid_at: paid.then_some(now),
                ..Milestones::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn items(order_id: Uuid) -> Vec<OrderItem> {
        vec![
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                line_no: 1,
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: BigDecimal::from(10),
                size: None,
                color: None,
            },
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                line_no: 2,
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: BigDecimal::from(10),
                size: None,
                color: None,
            },
        ]
    }

    fn admin() -> TransitionOrigin {
        TransitionOrigin::Admin {
            admin_id: "7".into(),
        }
    }

    fn card_payment() -> TransitionCommand {
        TransitionCommand::ConfirmPayment {
            method: PaymentMethod::HostedCard,
            reference: "callback".into(),
        }
    }

    fn expect_plan(planned: Planned) -> TransitionPlan {
        match planned {
            Planned::Transition(plan) => *plan,
            Planned::AlreadyApplied => panic!("expected a transition"),
        }
    }

    /// Every (status, command) pair the machine accepts from an admin or the
    /// gateway, written out as the reference edge list.
    fn legal(status: OrderStatus, command: &TransitionCommand, paid: bool) -> bool {
        use OrderStatus::*;
        use TransitionCommand as C;
        match command {
            C::ConfirmPayment { .. } => {
                matches!(status, Pending | AwaitingPayment) || (status == Approved && !paid)
            }
            C::AwaitTransfer { .. } => status == Pending,
            C::Approve | C::Reject { .. } => matches!(status, Pending | Paid),
            C::FailPayment { .. } => {
                matches!(status, Pending | AwaitingPayment) || (status == Approved && !paid)
            }
            C::Ship(_) => matches!(status, Paid | Approved),
            C::MarkDelivered => status == Shipped,
            C::Cancel { .. } => matches!(status, Pending | AwaitingPayment | Paid | Approved),
            C::ApproveReturn { .. }
            | C::RejectReturn { .. }
            | C::ApproveExchange { .. }
            | C::RejectExchange { .. } => paid && status.is_fulfilment_stage(),
        }
    }

    #[test]
    fn only_listed_edges_are_accepted() {
        let commands = vec![
            (card_payment(), TransitionOrigin::PaymentGateway),
            (
                TransitionCommand::AwaitTransfer {
                    transfer_id: Uuid::new_v4(),
                },
                TransitionOrigin::BankTransfer {
                    actor: "customer".into(),
                },
            ),
            (TransitionCommand::Approve, admin()),
            (
                TransitionCommand::Reject {
                    reason: "fraud".into(),
                },
                admin(),
            ),
            (
                TransitionCommand::FailPayment {
                    reason: "declined".into(),
                },
                TransitionOrigin::PaymentGateway,
            ),
            (
                TransitionCommand::Ship(TrackingInput {
                    shipping_company: "Aras".into(),
                    tracking_number: "T1".into(),
                    tracking_url: None,
                }),
                admin(),
            ),
            (TransitionCommand::MarkDelivered, admin()),
            (
                TransitionCommand::Cancel {
                    reason: "asked".into(),
                },
                admin(),
            ),
            (TransitionCommand::ApproveReturn { note: None }, admin()),
            (TransitionCommand::RejectReturn { note: None }, admin()),
            (
                TransitionCommand::ApproveExchange {
                    replacement: ExchangeRequest::default(),
                    note: None,
                },
                admin(),
            ),
            (TransitionCommand::RejectExchange { note: None }, admin()),
        ];

        for paid in [false, true] {
            for status in OrderStatus::ALL {
                let current = order(status, paid);
                let lines = items(current.id);
                for (command, origin) in &commands {
                    let result = plan(&current, &lines, command, origin, Utc::now());
                    let already = status == OrderStatus::Delivered
                        && *command == TransitionCommand::MarkDelivered;
                    match result {
                        Ok(Planned::AlreadyApplied) => assert!(already),
                        Ok(Planned::Transition(_)) => assert!(
                            legal(status, command, paid),
                            "{status} accepted {}",
                            command.name()
                        ),
                        Err(DomainError::Conflict { current: seen, .. }) => {
                            assert_eq!(seen, status);
                            assert!(
                                !legal(status, command, paid) && !already,
                                "{status} refused {}",
                                command.name()
                            );
                        }
                        Err(other) => panic!("unexpected error {other}"),
                    }
                }
            }
        }
    }

    #[test]
    fn payment_plans_one_out_per_item() {
        let current = order(OrderStatus::Pending, false);
        let lines = items(current.id);
        let plan = expect_plan(
            plan(
                &current,
                &lines,
                &card_payment(),
                &TransitionOrigin::PaymentGateway,
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.order.status, OrderStatus::Paid);
        assert!(plan.order.is_paid());
        assert_eq!(plan.stock.len(), 2);
        assert!(plan.stock.iter().all(|s| s.direction == Direction::Out));
        assert_eq!(plan.stock[0].quantity, 2);
        assert_eq!(plan.notification, Some(NotificationKind::OrderPaid));
    }

    #[test]
    fn payment_after_early_approval_keeps_status_and_takes_stock() {
        let current = order(OrderStatus::Approved, false);
        let lines = items(current.id);
        let plan = expect_plan(
            plan(
                &current,
                &lines,
                &card_payment(),
                &TransitionOrigin::PaymentGateway,
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.from, OrderStatus::Approved);
        assert_eq!(plan.order.status, OrderStatus::Approved);
        assert!(plan.order.is_paid());
        assert_eq!(plan.stock.len(), 2);
        assert!(plan.stock.iter().all(|s| s.direction == Direction::Out));

        let paid = order(OrderStatus::Approved, true);
        let err = plan_err(&paid, &lines, &card_payment());
        assert!(err.is_conflict());
    }

    fn plan_err(current: &Order, lines: &[OrderItem], command: &TransitionCommand) -> DomainError {
        plan(current, lines, command, &TransitionOrigin::PaymentGateway, Utc::now()).unwrap_err()
    }

    #[test]
    fn admin_cannot_report_payment_failure() {
        let current = order(OrderStatus::Pending, false);
        let err = plan(
            &current,
            &[],
            &TransitionCommand::FailPayment {
                reason: "x".into(),
            },
            &admin(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn gateway_cannot_confirm_bank_transfers() {
        let current = order(OrderStatus::AwaitingPayment, false);
        let err = plan(
            &current,
            &[],
            &TransitionCommand::ConfirmPayment {
                method: PaymentMethod::BankTransfer,
                reference: "x".into(),
            },
            &TransitionOrigin::PaymentGateway,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn rejection_needs_a_reason() {
        let current = order(OrderStatus::Pending, false);
        let err = plan(
            &current,
            &[],
            &TransitionCommand::Reject { reason: "  ".into() },
            &admin(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn rejection_reason_lands_in_admin_notes() {
        let current = order(OrderStatus::Paid, true);
        let plan = expect_plan(
            plan(
                &current,
                &[],
                &TransitionCommand::Reject {
                    reason: "address unreachable".into(),
                },
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert!(plan.order.admin_notes.contains("address unreachable"));
        assert!(plan.order.admin_notes.contains("admin:7"));
    }

    #[test]
    fn shipping_records_tracking_and_timestamp() {
        let current = order(OrderStatus::Approved, true);
        let plan = expect_plan(
            plan(
                &current,
                &[],
                &TransitionCommand::Ship(TrackingInput {
                    shipping_company: "Aras".into(),
                    tracking_number: "AR123".into(),
                    tracking_url: Some("https://track/AR123".into()),
                }),
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.order.tracking.tracking_number.as_deref(), Some("AR123"));
        assert!(plan.order.milestones.shipped_at.is_some());
        assert!(plan.stock.is_empty());
    }

    #[test]
    fn redelivery_is_a_no_op() {
        let current = order(OrderStatus::Delivered, true);
        let planned = plan(
            &current,
            &[],
            &TransitionCommand::MarkDelivered,
            &TransitionOrigin::Carrier,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(planned, Planned::AlreadyApplied);
    }

    #[test]
    fn exchange_reverses_items_and_ships_one_replacement() {
        let current = order(OrderStatus::Delivered, true);
        let lines = items(current.id);
        let replacement = Uuid::new_v4();
        let plan = expect_plan(
            plan(
                &current,
                &lines,
                &TransitionCommand::ApproveExchange {
                    replacement: ExchangeRequest {
                        product_id: Some(replacement),
                        size: Some("L".into()),
                        color: None,
                    },
                    note: None,
                },
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.stock.len(), 3);
        assert!(plan.stock[..2].iter().all(|s| s.direction == Direction::In));
        let last = &plan.stock[2];
        assert_eq!(last.product_id, replacement);
        assert_eq!(last.direction, Direction::Out);
        assert_eq!(last.quantity, 1);
        assert!(last.description.contains("size L"));
        assert_eq!(plan.order.exchange.product_id, Some(replacement));
    }

    #[test]
    fn exchange_without_product_reuses_first_item() {
        let current = order(OrderStatus::Delivered, true);
        let lines = items(current.id);
        let plan = expect_plan(
            plan(
                &current,
                &lines,
                &TransitionCommand::ApproveExchange {
                    replacement: ExchangeRequest {
                        product_id: None,
                        size: Some("S".into()),
                        color: None,
                    },
                    note: None,
                },
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.stock[2].product_id, lines[0].product_id);
    }

    #[test]
    fn cancelling_a_paid_order_restocks() {
        let current = order(OrderStatus::Paid, true);
        let lines = items(current.id);
        let plan = expect_plan(
            plan(
                &current,
                &lines,
                &TransitionCommand::Cancel {
                    reason: "customer request".into(),
                },
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert_eq!(plan.stock.len(), 2);
        assert!(plan.stock.iter().all(|s| s.direction == Direction::In));
    }

    #[test]
    fn cancelling_an_unpaid_order_touches_no_stock() {
        let current = order(OrderStatus::AwaitingPayment, false);
        let plan = expect_plan(
            plan(
                &current,
                &items(current.id),
                &TransitionCommand::Cancel {
                    reason: "no transfer".into(),
                },
                &admin(),
                Utc::now(),
            )
            .unwrap(),
        );
        assert!(plan.stock.is_empty());
        assert_eq!(plan.order.status, OrderStatus::Cancelled);
    }
}
