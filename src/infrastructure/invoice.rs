use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderItem};
use crate::domain::ports::{CompanyInfo, InvoiceGenerator};

/// Writes a plain-text invoice per order into a directory and returns the
/// file name as the artifact reference.
pub struct FileInvoiceGenerator {
    dir: PathBuf,
}

impl FileInvoiceGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl InvoiceGenerator for FileInvoiceGenerator {
    fn generate(
        &self,
        order: &Order,
        items: &[OrderItem],
        company: &CompanyInfo,
    ) -> Result<String, DomainError> {
        let reference = format!("INV-{}", order.id.simple());
        fs::create_dir_all(&self.dir)
            .map_err(|e| DomainError::SideEffect(format!("cannot create {:?}: {e}", self.dir)))?;

        let path = self.dir.join(format!("{reference}.txt"));
        fs::write(&path, render(&reference, order, items, company))
            .map_err(|e| DomainError::SideEffect(format!("cannot write {path:?}: {e}")))?;
        Ok(reference)
    }
}

fn render(reference: &str, order: &Order, items: &[OrderItem], company: &CompanyInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", company.name);
    let _ = writeln!(out, "{}", company.address);
    let _ = writeln!(out, "Tax ID: {}", company.tax_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "Invoice {reference}");
    let _ = writeln!(out, "Order {}", order.id);
    if let Some(paid_at) = order.milestones.paid_at {
        let _ = writeln!(out, "Paid {}", paid_at.format("%Y-%m-%d"));
    }
    let _ = writeln!(out);
    for item in items {
        let _ = writeln!(
            out,
            "{:>3} x {} @ {} = {}",
            item.quantity,
            item.product_id,
            item.unit_price,
            item.subtotal()
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Shipping: {}", order.shipping_cost);
    let _ = writeln!(out, "Discount: {}", order.discount);
    let _ = writeln!(out, "Total: {}", order.total_amount);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Milestones, OrderStatus, Tracking};
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn writes_invoice_file_named_after_reference() {
        let dir = std::env::temp_dir().join(format!("invoices-{}", Uuid::new_v4()));
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            guest: None,
            status: OrderStatus::Approved,
            total_amount: BigDecimal::from(20),
            shipping_cost: BigDecimal::from(0),
            discount: BigDecimal::from(0),
            payment_method: None,
            tracking: Tracking::default(),
            exchange: Default::default(),
            admin_notes: String::new(),
            invoice_reference: None,
            milestones: Milestones::default(),
            created_at: now,
            updated_at: now,
        };
        let company = CompanyInfo {
            name: "Shop Ltd".into(),
            address: "1 Market St".into(),
            tax_id: "123".into(),
        };

        let reference = FileInvoiceGenerator::new(&dir)
            .generate(&order, &[], &company)
            .unwrap();

        let text = fs::read_to_string(dir.join(format!("{reference}.txt"))).unwrap();
        assert!(text.contains("Shop Ltd"));
        assert!(text.contains("Total: 20"));
        fs::remove_dir_all(dir).ok();
    }
}
