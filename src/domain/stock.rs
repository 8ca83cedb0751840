use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    /// Signed counter delta for `quantity` units moving in this direction.
    pub fn signed(&self, quantity: i32) -> i32 {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            other => Err(DomainError::Internal(format!(
                "unknown stock direction '{other}'"
            ))),
        }
    }
}

/// Stock-relevant view of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
    pub initial_stock: i32,
}

/// One append-only ledger row. `quantity` is always positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub order_id: Option<Uuid>,
    pub direction: Direction,
    pub quantity: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// What a single movement request actually did to the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMovement {
    pub product_id: Uuid,
    pub direction: Direction,
    pub requested: i32,
    pub applied: i32,
    pub stock_after: i32,
}

impl AppliedMovement {
    /// Units that could not leave stock because the counter hit zero.
    pub fn shortfall(&self) -> i32 {
        self.requested - self.applied
    }
}

/// Ledger totals for one product, checked against the live counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockReconciliation {
    pub product_id: Uuid,
    pub initial_stock: i32,
    pub total_in: i64,
    pub total_out: i64,
    pub current_stock: i32,
    pub expected_stock: i64,
    pub consistent: bool,
}

impl StockReconciliation {
    pub fn compute(product: &Product, movements: &[StockMovement]) -> Self {
        let (total_in, total_out) =
            movements
                .iter()
                .fold((0i64, 0i64), |(inn, out), m| match m.direction {
                    Direction::In => (inn + i64::from(m.quantity), out),
                    Direction::Out => (inn, out + i64::from(m.quantity)),
                });
        let expected_stock = i64::from(product.initial_stock) + total_in - total_out;
        StockReconciliation {
            product_id: product.id,
            initial_stock: product.initial_stock,
            total_in,
            total_out,
            current_stock: product.stock,
            expected_stock,
            consistent: expected_stock == i64::from(product.stock),
        }
    }
}
