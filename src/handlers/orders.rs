use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::OrderDetails;
use crate::domain::order::{GuestContact, NewOrder, Order, OrderLineInput, PaymentMethod};
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct GuestContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Registered customer. Exactly one of `user_id` and `guest` is required.
    pub user_id: Option<Uuid>,
    pub guest: Option<GuestContactRequest>,
    pub lines: Vec<CreateOrderLineRequest>,
    #[serde(default = "zero")]
    pub shipping_cost: String,
    #[serde(default = "zero")]
    pub discount: String,
    pub total_amount: String,
    /// `HOSTED_CARD` or `BANK_TRANSFER`.
    pub payment_method: Option<String>,
}

fn zero() -> String {
    "0".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: String,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingResponse {
    pub shipping_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub carrier_status: Option<String>,
}

/// Customer view of an order.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: String,
    pub status_description: String,
    pub total_amount: String,
    pub shipping_cost: String,
    pub discount: String,
    pub payment_method: Option<String>,
    pub tracking: TrackingResponse,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_details(details: OrderDetails) -> Self {
        let OrderDetails { order, items } = details;
        let mut response = Self::summary(&order);
        response.items = items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.to_string(),
                size: item.size,
                color: item.color,
            })
            .collect();
        response
    }

    pub fn summary(order: &Order) -> Self {
        OrderResponse {
            id: order.id,
            status: order.status.as_str().to_string(),
            status_description: order.status.customer_description().to_string(),
            total_amount: order.total_amount.to_string(),
            shipping_cost: order.shipping_cost.to_string(),
            discount: order.discount.to_string(),
            payment_method: order.payment_method.map(|m| m.as_str().to_string()),
            tracking: TrackingResponse {
                shipping_company: order.tracking.shipping_company.clone(),
                tracking_number: order.tracking.tracking_number.clone(),
                tracking_url: order.tracking.tracking_url.clone(),
                carrier_status: order.tracking.carrier_status.clone(),
            },
            paid_at: order.milestones.paid_at,
            shipped_at: order.milestones.shipped_at,
            delivered_at: order.milestones.delivered_at,
            created_at: order.created_at,
            items: vec![],
        }
    }
}

pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid {field} '{raw}': {e}")))
}

impl TryFrom<CreateOrderRequest> for NewOrder {
    type Error = AppError;

    fn try_from(body: CreateOrderRequest) -> Result<Self, Self::Error> {
        let lines = body
            .lines
            .into_iter()
            .map(|l| {
                Ok(OrderLineInput {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price: parse_amount("unit_price", &l.unit_price)?,
                    size: l.size,
                    color: l.color,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        let payment_method = body
            .payment_method
            .as_deref()
            .map(PaymentMethod::from_str)
            .transpose()?;

        Ok(NewOrder {
            user_id: body.user_id,
            guest: body.guest.map(|g| GuestContact {
                name: g.name,
                email: g.email,
                phone: g.phone,
            }),
            lines,
            shipping_cost: parse_amount("shipping_cost", &body.shipping_cost)?,
            discount: parse_amount("discount", &body.discount)?,
            total_amount: parse_amount("total_amount", &body.total_amount)?,
            payment_method,
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Creates a `PENDING` order together with its items and an `OrderReceived`
/// outbox intent, all in one transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = CreateOrderResponse),
        (status = 400, description = "Invalid order"),
        (status = 404, description = "Unknown product"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let new_order = NewOrder::try_from(body.into_inner())?;
    let id = web::block(move || state.orders.create_order(new_order)).await??;
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// GET /orders/{id}
///
/// Returns the order, its items and a human-readable status explanation.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let details = web::block(move || state.orders.get_order(order_id)).await??;
    match details {
        Some(details) => Ok(HttpResponse::Ok().json(OrderResponse::from_details(details))),
        None => Err(AppError::NotFound(format!("Order {order_id} not found"))),
    }
}
