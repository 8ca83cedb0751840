//! Admin surface. Every handler takes an [`AdminIdentity`]; the id ends up in
//! the order's audit notes through the transition origin.

use std::str::FromStr;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::bank_transfer::DecisionResult;
use crate::application::order_service::{OrderDetails, OrderPage, TransitionOutcome};
use crate::domain::order::{ExchangeRequest, Order, OrderStatus};
use crate::domain::stock::StockReconciliation;
use crate::domain::transfer::TransferDecision;
use crate::domain::transition::{TrackingInput, TransitionCommand, TransitionOrigin};
use crate::errors::AppError;
use crate::handlers::auth::AdminIdentity;
use crate::handlers::orders::OrderResponse;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDecisionRequest {
    pub order_action: AdminAction,
    /// Required when rejecting.
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDecisionRequest {
    pub return_action: AdminAction,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeDecisionRequest {
    pub exchange_action: AdminAction,
    /// Defaults to the order's first item when absent.
    pub new_product_id: Option<Uuid>,
    pub new_size: Option<String>,
    pub new_color: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    pub tracking_number: String,
    pub shipping_company: String,
    pub shipping_tracking_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferDecisionRequest {
    /// `CONFIRMED` or `REJECTED`.
    #[schema(value_type = String)]
    pub decision: TransferDecision,
    pub admin_note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Only orders in this status, e.g. `PAID`.
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

// ── Response DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct ShortfallResponse {
    pub product_id: Uuid,
    pub short_by: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    pub order_id: Uuid,
    pub status: String,
    /// False when the order already reflected the action.
    pub changed: bool,
    /// Units that could not leave stock; also recorded in the admin notes.
    pub shortfalls: Vec<ShortfallResponse>,
}

impl TransitionResponse {
    fn new(order_id: Uuid, outcome: &TransitionOutcome) -> Self {
        let (changed, shortfalls) = match outcome {
            TransitionOutcome::Applied { movements, .. } => (
                true,
                movements
                    .iter()
                    .filter(|m| m.shortfall() > 0)
                    .map(|m| ShortfallResponse {
                        product_id: m.product_id,
                        short_by: m.shortfall(),
                    })
                    .collect(),
            ),
            TransitionOutcome::Unchanged { .. } => (false, vec![]),
        };
        TransitionResponse {
            order_id,
            status: outcome.status().as_str().to_string(),
            changed,
            shortfalls,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExchangeResponse {
    pub product_id: Option<Uuid>,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Customer view plus the audit trail and back-office fields.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub contact: ContactResponse,
    pub admin_notes: String,
    pub invoice_reference: Option<String>,
    pub exchange: ExchangeResponse,
    pub return_approved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub exchange_approved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cancelled_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AdminOrderResponse {
    fn new(order: &Order, view: OrderResponse) -> Self {
        AdminOrderResponse {
            order: view,
            contact: ContactResponse {
                user_id: order.user_id,
                guest_name: order.guest.as_ref().map(|g| g.name.clone()),
                guest_email: order.guest.as_ref().map(|g| g.email.clone()),
                guest_phone: order.guest.as_ref().and_then(|g| g.phone.clone()),
            },
            admin_notes: order.admin_notes.clone(),
            invoice_reference: order.invoice_reference.clone(),
            exchange: ExchangeResponse {
                product_id: order.exchange.product_id,
                size: order.exchange.size.clone(),
                color: order.exchange.color.clone(),
            },
            return_approved_at: order.milestones.return_approved_at,
            exchange_approved_at: order.milestones.exchange_approved_at,
            cancelled_at: order.milestones.cancelled_at,
        }
    }

    fn from_details(details: OrderDetails) -> Self {
        let order = details.order.clone();
        Self::new(&order, OrderResponse::from_details(details))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<AdminOrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl From<OrderPage> for ListOrdersResponse {
    fn from(page: OrderPage) -> Self {
        ListOrdersResponse {
            items: page
                .orders
                .iter()
                .map(|o| AdminOrderResponse::new(o, OrderResponse::summary(o)))
                .collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferDecisionResponse {
    pub transfer_id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    /// Order status after a confirmation; absent for rejections.
    pub order_status: Option<String>,
}

impl From<DecisionResult> for TransferDecisionResponse {
    fn from(result: DecisionResult) -> Self {
        TransferDecisionResponse {
            transfer_id: result.transfer.id,
            order_id: result.transfer.order_id,
            status: result.transfer.status.as_str().to_string(),
            order_status: result.order.map(|o| o.status().as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLedgerResponse {
    pub product_id: Uuid,
    pub initial_stock: i32,
    pub total_in: i64,
    pub total_out: i64,
    pub current_stock: i32,
    pub expected_stock: i64,
    pub consistent: bool,
}

impl From<StockReconciliation> for StockLedgerResponse {
    fn from(r: StockReconciliation) -> Self {
        StockLedgerResponse {
            product_id: r.product_id,
            initial_stock: r.initial_stock,
            total_in: r.total_in,
            total_out: r.total_out,
            current_stock: r.current_stock,
            expected_stock: r.expected_stock,
            consistent: r.consistent,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn run_transition(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    order_id: Uuid,
    command: TransitionCommand,
) -> Result<HttpResponse, AppError> {
    let origin = TransitionOrigin::Admin { admin_id: admin.0 };
    let outcome =
        web::block(move || state.orders.transition(order_id, command, origin)).await??;
    Ok(HttpResponse::Ok().json(TransitionResponse::new(order_id, &outcome)))
}

/// GET /admin/orders
#[utoipa::path(
    get,
    path = "/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "No admin identity"),
    ),
    tag = "admin"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let status = params
        .status
        .as_deref()
        .map(|s| {
            OrderStatus::from_str(&s.to_uppercase())
                .map_err(|_| AppError::BadRequest(format!("unknown order status '{s}'")))
        })
        .transpose()?;

    let page =
        web::block(move || state.orders.list_orders(status, params.page, params.limit)).await??;
    Ok(HttpResponse::Ok().json(ListOrdersResponse::from(page)))
}

/// GET /admin/orders/{id}
#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Order with admin notes", body = AdminOrderResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
    ),
    tag = "admin"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    match web::block(move || state.orders.get_order(order_id)).await?? {
        Some(details) => Ok(HttpResponse::Ok().json(AdminOrderResponse::from_details(details))),
        None => Err(AppError::NotFound(format!("Order {order_id} not found"))),
    }
}

/// POST /admin/orders/{id}/decision
///
/// Approves or rejects a `PENDING`/`PAID` order. A repeated decision is a 409.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/decision",
    request_body = OrderDecisionRequest,
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Order moved", body = TransitionResponse),
        (status = 400, description = "Rejection without a reason"),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in a decidable status"),
    ),
    tag = "admin"
)]
pub async fn decide_order(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<OrderDecisionRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let command = match body.order_action {
        AdminAction::Approve => TransitionCommand::Approve,
        AdminAction::Reject => TransitionCommand::Reject {
            reason: body.reason.unwrap_or_default(),
        },
    };
    run_transition(state, admin, path.into_inner(), command).await
}

/// POST /admin/orders/{id}/return
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/return",
    request_body = ReturnDecisionRequest,
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Return decided", body = TransitionResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order was never paid or is already closed"),
    ),
    tag = "admin"
)]
pub async fn decide_return(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<ReturnDecisionRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let command = match body.return_action {
        AdminAction::Approve => TransitionCommand::ApproveReturn { note: body.note },
        AdminAction::Reject => TransitionCommand::RejectReturn { note: body.note },
    };
    run_transition(state, admin, path.into_inner(), command).await
}

/// POST /admin/orders/{id}/exchange
///
/// Approval returns every original item to stock and sends one unit of the
/// replacement, in the same transaction.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/exchange",
    request_body = ExchangeDecisionRequest,
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Exchange decided", body = TransitionResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order or replacement product not found"),
        (status = 409, description = "Order was never paid or is already closed"),
    ),
    tag = "admin"
)]
pub async fn decide_exchange(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<ExchangeDecisionRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let command = match body.exchange_action {
        AdminAction::Approve => TransitionCommand::ApproveExchange {
            replacement: ExchangeRequest {
                product_id: body.new_product_id,
                size: body.new_size,
                color: body.new_color,
            },
            note: body.note,
        },
        AdminAction::Reject => TransitionCommand::RejectExchange { note: body.note },
    };
    run_transition(state, admin, path.into_inner(), command).await
}

/// POST /admin/orders/{id}/shipment
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/shipment",
    request_body = ShipmentRequest,
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Order shipped", body = TransitionResponse),
        (status = 400, description = "Missing tracking data"),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not ready to ship"),
    ),
    tag = "admin"
)]
pub async fn ship_order(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<ShipmentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let command = TransitionCommand::Ship(TrackingInput {
        shipping_company: body.shipping_company,
        tracking_number: body.tracking_number,
        tracking_url: body.shipping_tracking_url.filter(|url| !url.trim().is_empty()),
    });
    run_transition(state, admin, path.into_inner(), command).await
}

/// POST /admin/orders/{id}/delivered
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/delivered",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Order delivered (or already was)", body = TransitionResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order has not shipped"),
    ),
    tag = "admin"
)]
pub async fn mark_delivered(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    run_transition(state, admin, path.into_inner(), TransitionCommand::MarkDelivered).await
}

/// POST /admin/orders/{id}/cancel
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/cancel",
    request_body = CancelRequest,
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = TransitionResponse),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order has already shipped or closed"),
    ),
    tag = "admin"
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<CancelRequest>,
) -> Result<HttpResponse, AppError> {
    let command = TransitionCommand::Cancel {
        reason: body.into_inner().reason,
    };
    run_transition(state, admin, path.into_inner(), command).await
}

/// POST /admin/transfers/{id}/decision
///
/// Decides a declared bank transfer exactly once; confirmation moves the order
/// to `PAID` in the same transaction.
#[utoipa::path(
    post,
    path = "/admin/transfers/{id}/decision",
    request_body = TransferDecisionRequest,
    params(
        ("id" = Uuid, Path, description = "Transfer notification UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Transfer decided", body = TransferDecisionResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Transfer notification not found"),
        (status = 409, description = "Already decided, or the order cannot be paid"),
    ),
    tag = "admin"
)]
pub async fn decide_transfer(
    state: web::Data<AppState>,
    admin: AdminIdentity,
    path: web::Path<Uuid>,
    body: web::Json<TransferDecisionRequest>,
) -> Result<HttpResponse, AppError> {
    let transfer_id = path.into_inner();
    let body = body.into_inner();
    let result = web::block(move || {
        state
            .transfers
            .decide(transfer_id, body.decision, body.admin_note, &admin.0)
    })
    .await??;
    Ok(HttpResponse::Ok().json(TransferDecisionResponse::from(result)))
}

/// GET /admin/products/{id}/stock-ledger
///
/// Ledger totals against the live counter for one product.
#[utoipa::path(
    get,
    path = "/admin/products/{id}/stock-ledger",
    params(
        ("id" = Uuid, Path, description = "Product UUID"),
        ("X-Admin-Id" = String, Header, description = "Authenticated admin"),
    ),
    responses(
        (status = 200, description = "Reconciliation report", body = StockLedgerResponse),
        (status = 401, description = "No admin identity"),
        (status = 404, description = "Product not found"),
    ),
    tag = "admin"
)]
pub async fn stock_ledger(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let report = web::block(move || state.orders.stock_report(product_id)).await??;
    Ok(HttpResponse::Ok().json(StockLedgerResponse::from(report)))
}
