use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Confirmed => "CONFIRMED",
            TransferStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransferStatus::Pending),
            "CONFIRMED" => Ok(TransferStatus::Confirmed),
            "REJECTED" => Ok(TransferStatus::Rejected),
            other => Err(DomainError::Internal(format!(
                "unknown transfer status '{other}'"
            ))),
        }
    }
}

/// Admin verdict on a declared transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferDecision {
    Confirmed,
    Rejected,
}

/// Receiving account of the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankAccount {
    pub bank_name: String,
    pub iban: String,
    pub account_holder: String,
}

/// What the customer says they sent.
#[derive(Debug, Clone)]
pub struct TransferDeclaration {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub amount: BigDecimal,
    pub transfer_date: NaiveDate,
    pub note: Option<String>,
}

impl TransferDeclaration {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::InvalidInput("customer name is required".into()));
        }
        if !self.customer_email.contains('@') {
            return Err(DomainError::InvalidInput(format!(
                "'{}' is not an email address",
                self.customer_email
            )));
        }
        if self.amount <= BigDecimal::from(0) {
            return Err(DomainError::InvalidInput(
                "transfer amount must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferNotification {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub amount: BigDecimal,
    pub transfer_date: NaiveDate,
    pub note: Option<String>,
    pub status: TransferStatus,
    pub admin_note: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Bank details frozen at submission time.
    pub bank: BankAccount,
    pub created_at: DateTime<Utc>,
}

impl TransferNotification {
    pub fn new(
        order_id: Uuid,
        declaration: TransferDeclaration,
        bank: BankAccount,
        now: DateTime<Utc>,
    ) -> Self {
        TransferNotification {
            id: Uuid::new_v4(),
            order_id,
            customer_name: declaration.customer_name,
            customer_email: declaration.customer_email,
            customer_phone: declaration.customer_phone,
            amount: declaration.amount,
            transfer_date: declaration.transfer_date,
            note: declaration.note,
            status: TransferStatus::Pending,
            admin_note: None,
            confirmed_at: None,
            decided_at: None,
            bank,
            created_at: now,
        }
    }

    /// Records the admin verdict. A notification is decided exactly once.
    pub fn decide(
        &mut self,
        decision: TransferDecision,
        admin_note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != TransferStatus::Pending {
            return Err(DomainError::StaleRecord(format!(
                "transfer notification {} is already {}",
                self.id, self.status
            )));
        }
        self.status = match decision {
            TransferDecision::Confirmed => {
                self.confirmed_at = Some(now);
                TransferStatus::Confirmed
            }
            TransferDecision::Rejected => TransferStatus::Rejected,
        };
        self.admin_note = admin_note;
        self.decided_at = Some(now);
        Ok(())
    }
}
