use std::net::{IpAddr, SocketAddr};

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::hosted_gateway::{PaymentCallback, PaymentInit};
use crate::application::order_service::TransitionOutcome;
use crate::domain::errors::DomainError;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    pub order_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitializePaymentResponse {
    pub token: String,
    pub iframe_url: String,
}

/// POST /payments/hosted/initialize
///
/// Signs the order for the hosted card page and returns the provider token.
#[utoipa::path(
    post,
    path = "/payments/hosted/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Token issued", body = InitializePaymentResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not awaiting card payment"),
        (status = 500, description = "Gateway unavailable or misconfigured"),
    ),
    tag = "payments"
)]
pub async fn initialize_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<InitializePaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(client_ip)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let init = PaymentInit {
        order_id: body.order_id,
        customer_email: body.customer_email,
        customer_name: body.customer_name,
        customer_address: body.customer_address,
        customer_phone: body.customer_phone,
        client_ip,
    };

    let prepared = {
        let state = state.clone();
        web::block(move || state.gateway.prepare(&init)).await??
    };
    let token = state.gateway.request_token(&prepared).await?;
    let iframe_url = state.gateway.iframe_url(&token);

    Ok(HttpResponse::Ok().json(InitializePaymentResponse { token, iframe_url }))
}

/// POST /payments/hosted/callback
///
/// The provider retries until it reads `OK`, so every outcome answers `OK`;
/// failures are only logged.
#[utoipa::path(
    post,
    path = "/payments/hosted/callback",
    request_body(content = PaymentCallback, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Always `OK`", body = String, content_type = "text/plain"),
    ),
    tag = "payments"
)]
pub async fn payment_callback(
    state: web::Data<AppState>,
    form: Result<web::Form<PaymentCallback>, actix_web::Error>,
) -> HttpResponse {
    let callback = match form {
        Ok(form) => form.into_inner(),
        Err(e) => {
            log::warn!(target: "storefront_orders::security", "malformed payment callback: {e}");
            return ok();
        }
    };

    let merchant_oid = callback.merchant_oid.clone();
    let result = web::block(move || state.gateway.handle_callback(&callback)).await;
    match result {
        Ok(Ok(TransitionOutcome::Applied { from, to, .. })) => {
            log::info!("payment callback for {merchant_oid}: {from} -> {to}");
        }
        Ok(Ok(TransitionOutcome::Unchanged { status })) => {
            log::info!("payment callback for {merchant_oid} acknowledged; order stays {status}");
        }
        Ok(Err(DomainError::Signature(detail))) => {
            log::warn!(
                target: "storefront_orders::security",
                "rejected payment callback with invalid signature: {detail}"
            );
        }
        Ok(Err(e)) => log::error!("payment callback for {merchant_oid} failed: {e}"),
        Err(e) => log::error!("payment callback for {merchant_oid} failed: {e}"),
    }
    ok()
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

/// Strips the port from a peer or forwarded address; handles bracketed IPv6.
fn client_ip(addr: &str) -> String {
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return socket.ip().to_string();
    }
    let bare = addr.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::client_ip;

    #[test]
    fn client_ip_drops_port_for_both_families() {
        assert_eq!(client_ip("10.0.0.1:5555"), "10.0.0.1");
        assert_eq!(client_ip("10.0.0.1"), "10.0.0.1");
        assert_eq!(client_ip("[::1]:8080"), "::1");
        assert_eq!(client_ip("[2001:db8::1]"), "2001:db8::1");
        assert_eq!(client_ip("2001:db8::1"), "2001:db8::1");
        assert_eq!(client_ip("proxy.internal"), "proxy.internal");
    }
}
