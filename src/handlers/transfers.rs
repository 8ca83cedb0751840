use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::bank_transfer::TransferReceipt;
use crate::domain::transfer::TransferDeclaration;
use crate::errors::AppError;
use crate::handlers::orders::parse_amount;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferSubmission {
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Decimal amount as a string, e.g. "249.90"
    pub transfer_amount: String,
    /// `YYYY-MM-DD`
    #[schema(value_type = String, format = Date)]
    pub transfer_date: NaiveDate,
    pub transfer_note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsResponse {
    pub bank_name: String,
    pub iban: String,
    pub account_holder: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceiptResponse {
    pub transfer_id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub bank: BankDetailsResponse,
}

impl From<TransferReceipt> for TransferReceiptResponse {
    fn from(receipt: TransferReceipt) -> Self {
        TransferReceiptResponse {
            transfer_id: receipt.transfer_id,
            order_id: receipt.order_id,
            status: "PENDING".to_string(),
            bank: BankDetailsResponse {
                bank_name: receipt.bank.bank_name,
                iban: receipt.bank.iban,
                account_holder: receipt.bank.account_holder,
            },
        }
    }
}

/// POST /payments/bank-transfer
///
/// Records the customer's declaration and moves the order to
/// `AWAITING_PAYMENT`. The response carries the receiving account as frozen
/// on the notification.
#[utoipa::path(
    post,
    path = "/payments/bank-transfer",
    request_body = TransferSubmission,
    responses(
        (status = 201, description = "Transfer declared", body = TransferReceiptResponse),
        (status = 400, description = "Invalid declaration"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order cannot take a transfer in its current status"),
    ),
    tag = "payments"
)]
pub async fn submit_transfer(
    state: web::Data<AppState>,
    body: web::Json<TransferSubmission>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let order_id = body.order_id;
    let declaration = TransferDeclaration {
        amount: parse_amount("transferAmount", &body.transfer_amount)?,
        customer_name: body.customer_name,
        customer_email: body.customer_email,
        customer_phone: body.customer_phone,
        transfer_date: body.transfer_date,
        note: body.transfer_note,
    };

    let receipt = web::block(move || state.transfers.submit(order_id, declaration)).await??;
    Ok(HttpResponse::Created().json(TransferReceiptResponse::from(receipt)))
}
