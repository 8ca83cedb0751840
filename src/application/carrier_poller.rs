use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::application::order_service::{execute_transition, TransitionOutcome};
use crate::domain::errors::DomainError;
use crate::domain::ports::{transaction, CarrierStatusSource, ShipmentStatus, Store};
use crate::domain::transition::{TransitionCommand, TransitionOrigin};

/// Status sources keyed by lower-cased shipping company name.
#[derive(Default, Clone)]
pub struct CarrierRegistry {
    sources: HashMap<String, Arc<dyn CarrierStatusSource>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, company: &str, source: Arc<dyn CarrierStatusSource>) {
        self.sources.insert(company.trim().to_lowercase(), source);
    }

    pub fn get(&self, company: &str) -> Option<&Arc<dyn CarrierStatusSource>> {
        self.sources.get(&company.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub delivered: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Walks shipped orders and folds carrier-reported progress back in.
pub struct CarrierPoller {
    store: Arc<dyn Store>,
    carriers: CarrierRegistry,
    batch: i64,
}

impl CarrierPoller {
    pub fn new(store: Arc<dyn Store>, carriers: CarrierRegistry) -> Self {
        Self {
            store,
            carriers,
            batch: 200,
        }
    }

    /// One pass. A carrier that fails or is unknown only skips its order.
    pub fn poll_once(&self) -> Result<PollSummary, DomainError> {
        let mut summary = PollSummary::default();
        let shipped = transaction(self.store.as_ref(), |uow| uow.shipped_orders(self.batch))?;

        for order in shipped {
            let (Some(company), Some(number)) = (
                order.tracking.shipping_company.as_deref(),
                order.tracking.tracking_number.as_deref(),
            ) else {
                summary.skipped += 1;
                continue;
            };
            let Some(source) = self.carriers.get(company) else {
                log::debug!("order {}: no status source for carrier '{company}'", order.id);
                summary.skipped += 1;
                continue;
            };
            summary.checked += 1;

            let status = match source.get_status(number) {
                Ok(status) => status,
                Err(e) => {
                    log::warn!("order {}: carrier '{company}' lookup failed: {e}", order.id);
                    summary.skipped += 1;
                    continue;
                }
            };

            let applied = match status.status {
                ShipmentStatus::Delivered => transaction(self.store.as_ref(), |uow| {
                    execute_transition(
                        uow,
                        order.id,
                        &TransitionCommand::MarkDelivered,
                        &TransitionOrigin::Carrier,
                        Utc::now(),
                    )
                })
                .map(|outcome| {
                    if matches!(outcome, TransitionOutcome::Applied { .. }) {
                        summary.delivered += 1;
                    }
                }),
                other => transaction(self.store.as_ref(), |uow| {
                    let Some(mut current) = uow.lock_order(order.id)? else {
                        return Ok(false);
                    };
                    if current.status != order.status
                        || current.tracking.carrier_status.as_deref() == Some(other.as_str())
                    {
                        return Ok(false);
                    }
                    current.tracking.carrier_status = Some(other.as_str().to_string());
                    current.updated_at = Utc::now();
                    uow.update_order(&current)?;
                    Ok(true)
                })
                .map(|changed| {
                    if changed {
                        summary.updated += 1;
                    }
                }),
            };

            if let Err(e) = applied {
                log::warn!("order {}: could not record carrier status: {e}", order.id);
                summary.skipped += 1;
            }
        }

        if summary.checked > 0 {
            log::info!(
                "carrier poll: {} checked, {} delivered, {} updated, {} skipped",
                summary.checked,
                summary.delivered,
                summary.updated,
                summary.skipped
            );
        }
        Ok(summary)
    }
}
