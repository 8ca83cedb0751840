use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::ports::UnitOfWork;
use crate::domain::stock::{AppliedMovement, Direction, StockMovement, StockReconciliation};
use crate::domain::transition::StockDirective;

/// The only writer of product stock counters.
///
/// Every call runs inside the caller's unit of work, so ledger rows and
/// counter updates commit or roll back together with whatever order write
/// triggered them.
pub struct InventoryService;

impl InventoryService {
    /// Writes one ledger row and moves the counter by the same amount.
    ///
    /// An `OUT` larger than the available stock is clamped to what is there:
    /// the counter never goes negative and the ledger records only the units
    /// that actually left. The missing units are reported through
    /// [`AppliedMovement::shortfall`].
    pub fn apply_movement(
        uow: &mut dyn UnitOfWork,
        product_id: Uuid,
        order_id: Option<Uuid>,
        direction: Direction,
        quantity: i32,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<AppliedMovement, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidInput(format!(
                "movement quantity for product {product_id} must be positive, got {quantity}"
            )));
        }
        let product = uow
            .lock_product(product_id)?
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        let applied = match direction {
            Direction::In => quantity,
            Direction::Out => quantity.min(product.stock.max(0)),
        };

        let mut description = description.to_string();
        if applied < quantity {
            let shortage = DomainError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            };
            log::warn!("{shortage}; continuing with {applied} unit(s) (order {order_id:?})");
            description.push_str(&format!(" (short by {})", quantity - applied));
        }

        let stock_after = if applied > 0 {
            uow.record_movement(&StockMovement {
                id: Uuid::new_v4(),
                product_id,
                order_id,
                direction,
                quantity: applied,
                description,
                created_at: now,
            })?
        } else {
            product.stock
        };

        Ok(AppliedMovement {
            product_id,
            direction,
            requested: quantity,
            applied,
            stock_after,
        })
    }

    /// Applies every directive for `order_id` as one all-or-nothing batch.
    ///
    /// Products are locked in ascending id order before anything is written,
    /// so two batches touching the same products cannot deadlock.
    pub fn apply_batch(
        uow: &mut dyn UnitOfWork,
        order_id: Uuid,
        directives: &[StockDirective],
        now: DateTime<Utc>,
    ) -> Result<Vec<AppliedMovement>, DomainError> {
        let mut product_ids: Vec<Uuid> = directives.iter().map(|d| d.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        for product_id in product_ids {
            uow.lock_product(product_id)?
                .ok_or_else(|| DomainError::not_found("Product", product_id))?;
        }

        let mut applied = Vec::with_capacity(directives.len());
        for d in directives {
            applied.push(Self::apply_movement(
                uow,
                d.product_id,
                Some(order_id),
                d.direction,
                d.quantity,
                &d.description,
                now,
            )?);
        }
        Ok(applied)
    }

    /// Compares a product's counter against its initial stock plus ledger.
    pub fn reconcile(
        uow: &mut dyn UnitOfWork,
        product_id: Uuid,
    ) -> Result<StockReconciliation, DomainError> {
        let product = uow
            .find_product(product_id)?
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;
        let movements = uow.stock_movements(product_id)?;
        Ok(StockReconciliation::compute(&product, &movements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::transaction;
    use crate::infrastructure::memory_store::MemoryStore;

    fn directive(product_id: Uuid, direction: Direction, quantity: i32) -> StockDirective {
        StockDirective {
            product_id,
            direction,
            quantity,
            description: "test".into(),
        }
    }

    #[test]
    fn movement_updates_counter_and_ledger_together() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 10);

        let applied = transaction(&store, |uow| {
            InventoryService::apply_movement(
                uow,
                product,
                None,
                Direction::Out,
                3,
                "manual",
                Utc::now(),
            )
        })
        .unwrap();

        assert_eq!(applied.stock_after, 7);
        assert_eq!(store.stock_of(product), Some(7));
        assert_eq!(store.movements_for(product).len(), 1);
        let report = transaction(&store, |uow| InventoryService::reconcile(uow, product)).unwrap();
        assert!(report.consistent);
    }

    #[test]
    fn out_beyond_stock_is_clamped_and_reported() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 2);

        let applied = transaction(&store, |uow| {
            InventoryService::apply_movement(
                uow,
                product,
                None,
                Direction::Out,
                5,
                "oversold",
                Utc::now(),
            )
        })
        .unwrap();

        assert_eq!(applied.applied, 2);
        assert_eq!(applied.shortfall(), 3);
        assert_eq!(store.stock_of(product), Some(0));
        let movements = store.movements_for(product);
        assert_eq!(movements[0].quantity, 2);
        assert!(movements[0].description.contains("short by 3"));
    }

    #[test]
    fn out_on_empty_stock_writes_nothing() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 0);

        let applied = transaction(&store, |uow| {
            InventoryService::apply_movement(
                uow,
                product,
                None,
                Direction::Out,
                1,
                "oversold",
                Utc::now(),
            )
        })
        .unwrap();

        assert_eq!(applied.applied, 0);
        assert!(store.movements_for(product).is_empty());
        assert_eq!(store.stock_of(product), Some(0));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", 5);
        let err = transaction(&store, |uow| {
            InventoryService::apply_movement(uow, product, None, Direction::In, 0, "x", Utc::now())
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let first = store.add_product("Mug", 10);
        let second = store.add_product("Plate", 10);
        let missing = Uuid::new_v4();

        let err = transaction(&store, |uow| {
            InventoryService::apply_batch(
                uow,
                Uuid::new_v4(),
                &[
                    directive(first, Direction::Out, 1),
                    directive(second, Direction::Out, 1),
                    directive(missing, Direction::Out, 1),
                ],
                Utc::now(),
            )
        })
        .unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(store.stock_of(first), Some(10));
        assert_eq!(store.stock_of(second), Some(10));
        assert!(store.movements_for(first).is_empty());
    }

    #[test]
    fn batch_applies_mixed_directions_in_order() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", 0);

        let applied = transaction(&store, |uow| {
            InventoryService::apply_batch(
                uow,
                Uuid::new_v4(),
                &[
                    directive(product, Direction::In, 1),
                    directive(product, Direction::Out, 1),
                ],
                Utc::now(),
            )
        })
        .unwrap();

        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].shortfall(), 0);
        assert_eq!(store.stock_of(product), Some(0));
        assert_eq!(store.movements_for(product).len(), 2);
    }
}
