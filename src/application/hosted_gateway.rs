//! Hosted card gateway: signed payment initialization and callback handling.
//!
//! Both directions are authenticated with base64(HMAC-SHA256(merchant key, …)).
//! The merchant order reference is the order id in simple (hyphen-less) form.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::{execute_transition, TransitionOutcome};
use crate::config::HostedGatewayConfig;
use crate::domain::errors::DomainError;
use crate::domain::order::{OrderStatus, PaymentMethod};
use crate::domain::ports::{transaction, Store};
use crate::domain::transition::{TransitionCommand, TransitionOrigin};

type HmacSha256 = Hmac<Sha256>;

/// Customer details the provider needs alongside the order.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub order_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_phone: String,
    pub client_ip: String,
}

/// Form fields for the provider's token endpoint, `paytr_token` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationRequest {
    pub merchant_oid: String,
    pub fields: Vec<(&'static str, String)>,
}

impl InitializationRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Asynchronous result notification posted by the provider.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentCallback {
    pub merchant_oid: String,
    pub status: String,
    pub total_amount: String,
    pub hash: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub failed_reason_code: Option<String>,
    #[serde(default)]
    pub failed_reason_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    status: String,
    token: Option<String>,
    reason: Option<String>,
}

pub struct HostedGateway {
    config: HostedGatewayConfig,
    store: Arc<dyn Store>,
    http: reqwest::Client,
}

impl HostedGateway {
    /// Fails with `Configuration` when any merchant credential is blank.
    pub fn new(config: HostedGatewayConfig, store: Arc<dyn Store>) -> Result<Self, DomainError> {
        for (name, value) in [
            ("merchant id", &config.merchant_id),
            ("merchant key", &config.merchant_key),
            ("merchant salt", &config.merchant_salt),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Configuration(format!(
                    "payment gateway {name} is not set"
                )));
            }
        }
        Ok(Self {
            config,
            store,
            http: reqwest::Client::new(),
        })
    }

    /// Builds the signed initialization request for a `PENDING` order.
    pub fn prepare(&self, init: &PaymentInit) -> Result<InitializationRequest, DomainError> {
        let (order, basket) = transaction(self.store.as_ref(), |uow| {
            let order = uow
                .find_order(init.order_id)?
                .ok_or_else(|| DomainError::not_found("Order", init.order_id))?;
            let mut basket = Vec::new();
            for item in uow.order_items(order.id)? {
                let name = uow
                    .find_product(item.product_id)?
                    .map(|p| p.name)
                    .unwrap_or_else(|| item.product_id.to_string());
                basket.push(json!([
                    name,
                    item.unit_price.with_scale_round(2, RoundingMode::HalfUp).to_string(),
                    item.quantity
                ]));
            }
            Ok((order, basket))
        })?;

        if order.status != OrderStatus::Pending {
            return Err(DomainError::Conflict {
                action: "start card payment",
                current: order.status,
            });
        }

        let merchant_oid = merchant_reference(order.id);
        let payment_amount = to_minor_units(&order.total_amount)?.to_string();
        let user_basket = BASE64.encode(serde_json::Value::Array(basket).to_string());
        let no_installment = flag(self.config.no_installment);
        let max_installment = self.config.max_installment.to_string();
        let test_mode = flag(self.config.test_mode);

        let token = self.initialization_token(&[
            self.config.merchant_id.as_str(),
            init.client_ip.as_str(),
            merchant_oid.as_str(),
            init.customer_email.as_str(),
            payment_amount.as_str(),
            user_basket.as_str(),
            no_installment.as_str(),
            max_installment.as_str(),
            self.config.currency.as_str(),
            test_mode.as_str(),
        ])?;

        let fields = vec![
            ("merchant_id", self.config.merchant_id.clone()),
            ("user_ip", init.client_ip.clone()),
            ("merchant_oid", merchant_oid.clone()),
            ("email", init.customer_email.clone()),
            ("payment_amount", payment_amount),
            ("paytr_token", token),
            ("user_basket", user_basket),
            ("debug_on", flag(self.config.test_mode)),
            ("no_installment", no_installment),
            ("max_installment", max_installment),
            ("user_name", init.customer_name.clone()),
            ("user_address", init.customer_address.clone()),
            ("user_phone", init.customer_phone.clone()),
            ("merchant_ok_url", self.config.ok_url.clone()),
            ("merchant_fail_url", self.config.fail_url.clone()),
            ("timeout_limit", self.config.timeout_limit.to_string()),
            ("currency", self.config.currency.clone()),
            ("test_mode", test_mode),
        ];

        Ok(InitializationRequest {
            merchant_oid,
            fields,
        })
    }

    /// Posts the request to the provider and returns its opaque redirect token.
    pub async fn request_token(&self, request: &InitializationRequest) -> Result<String, DomainError> {
        let response: TokenResponse = self
            .http
            .post(&self.config.token_url)
            .form(&request.fields)
            .send()
            .await
            .map_err(|e| DomainError::Internal(format!("payment gateway unreachable: {e}")))?
            .json()
            .await
            .map_err(|e| DomainError::Internal(format!("unreadable gateway response: {e}")))?;

        if response.status == "success" {
            if let Some(token) = response.token {
                return Ok(token);
            }
        }
        Err(DomainError::Internal(format!(
            "gateway refused order {}: {}",
            request.merchant_oid,
            response.reason.unwrap_or(response.status)
        )))
    }

    pub fn iframe_url(&self, token: &str) -> String {
        format!("{}/{}", self.config.iframe_base_url.trim_end_matches('/'), token)
    }

    /// Verifies and applies a provider callback.
    ///
    /// A bad signature is a `Signature` error and nothing is written. Duplicate
    /// deliveries come back as [`TransitionOutcome::Unchanged`].
    pub fn handle_callback(&self, callback: &PaymentCallback) -> Result<TransitionOutcome, DomainError> {
        self.verify_callback(callback)?;

        let order_id = Uuid::parse_str(&callback.merchant_oid).map_err(|_| {
            DomainError::NotFound(format!("Order reference {}", callback.merchant_oid))
        })?;

        let command = if callback.status == "success" {
            TransitionCommand::ConfirmPayment {
                method: PaymentMethod::HostedCard,
                reference: format!(
                    "{} payment, total {}",
                    callback.payment_type.as_deref().unwrap_or("card"),
                    callback.total_amount
                ),
            }
        } else {
            let reason = match (&callback.failed_reason_code, &callback.failed_reason_msg) {
                (Some(code), Some(msg)) => format!("{msg} (code {code})"),
                (None, Some(msg)) => msg.clone(),
                (Some(code), None) => format!("code {code}"),
                (None, None) => format!("gateway reported status '{}'", callback.status),
            };
            TransitionCommand::FailPayment { reason }
        };

        transaction(self.store.as_ref(), |uow| {
            execute_transition(
                uow,
                order_id,
                &command,
                &TransitionOrigin::PaymentGateway,
                Utc::now(),
            )
        })
    }

    fn verify_callback(&self, callback: &PaymentCallback) -> Result<(), DomainError> {
        let provided = BASE64
            .decode(callback.hash.trim())
            .map_err(|_| DomainError::Signature(format!("callback for {}", callback.merchant_oid)))?;
        let mut mac = self.mac()?;
        for part in [
            &callback.merchant_oid,
            &self.config.merchant_salt,
            &callback.status,
            &callback.total_amount,
        ] {
            mac.update(part.as_bytes());
        }
        mac.verify_slice(&provided)
            .map_err(|_| DomainError::Signature(format!("callback for {}", callback.merchant_oid)))
    }

    fn initialization_token(&self, parts: &[&str]) -> Result<String, DomainError> {
        let mut mac = self.mac()?;
        for part in parts {
            mac.update(part.as_bytes());
        }
        mac.update(self.config.merchant_salt.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256, DomainError> {
        HmacSha256::new_from_slice(self.config.merchant_key.as_bytes())
            .map_err(|_| DomainError::Configuration("invalid merchant key".into()))
    }
}

/// External reference for an order: its id without hyphens.
pub fn merchant_reference(order_id: Uuid) -> String {
    order_id.simple().to_string()
}

/// Amount in minor units (kuruş/cents), rounded half-up.
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, DomainError> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .ok_or_else(|| DomainError::InvalidInput(format!("amount {amount} is out of range")))
}

fn flag(value: bool) -> String {
    let flag = if value { "1" } else { "0" };
    flag.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;

    fn config() -> HostedGatewayConfig {
        HostedGatewayConfig {
            merchant_id: "123456".into(),
            merchant_key: "key-abc".into(),
            merchant_salt: "salt-xyz".into(),
            token_url: "http://localhost/token".into(),
            iframe_base_url: "https://gateway.example/iframe/".into(),
            ok_url: "https://shop.example/ok".into(),
            fail_url: "https://shop.example/fail".into(),
            currency: "TL".into(),
            test_mode: true,
            timeout_limit: 30,
            max_installment: 0,
            no_installment: false,
        }
    }

    fn sign(key: &str, parts: &[&str]) -> String {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        for part in parts {
            mac.update(part.as_bytes());
        }
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn blank_credentials_are_a_configuration_error() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut cfg = config();
        cfg.merchant_key = String::new();
        let err = HostedGateway::new(cfg, store).err().unwrap();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn minor_units_round_half_up() {
        assert_eq!(to_minor_units(&"12.345".parse().unwrap()).unwrap(), 1235);
        assert_eq!(to_minor_units(&"100".parse().unwrap()).unwrap(), 10000);
        assert_eq!(to_minor_units(&"0.1".parse().unwrap()).unwrap(), 10);
    }

    #[test]
    fn initialization_token_signs_fields_then_salt() {
        let store = Arc::new(MemoryStore::new());
        let product = store.add_product("Mug", 5);
        let user = store.add_user("Ada", "ada@example.com");
        let order_id = store.add_order(user, &[(product, 2, "10.00")], OrderStatus::Pending);
        let gateway = HostedGateway::new(config(), store.clone()).unwrap();

        let request = gateway
            .prepare(&PaymentInit {
                order_id,
                customer_email: "ada@example.com".into(),
                customer_name: "Ada".into(),
                customer_address: "1 Main St".into(),
                customer_phone: "555".into(),
                client_ip: "10.0.0.1".into(),
            })
            .unwrap();

        assert_eq!(request.field("payment_amount"), Some("2000"));
        assert_eq!(request.field("merchant_oid"), Some(merchant_reference(order_id).as_str()));
        let basket = BASE64.decode(request.field("user_basket").unwrap()).unwrap();
        let basket: serde_json::Value = serde_json::from_slice(&basket).unwrap();
        assert_eq!(basket[0][0], "Mug");
        assert_eq!(basket[0][1], "10.00");
        assert_eq!(basket[0][2], 2);

        let oid = merchant_reference(order_id);
        let expected = sign(
            "key-abc",
            &[
                "123456",
                "10.0.0.1",
                &oid,
                "ada@example.com",
                "2000",
                request.field("user_basket").unwrap(),
                "0",
                "0",
                "TL",
                "1",
                "salt-xyz",
            ],
        );
        assert_eq!(request.field("paytr_token"), Some(expected.as_str()));
    }

    #[test]
    fn prepare_refuses_orders_past_pending() {
        let store = Arc::new(MemoryStore::new());
        let product = store.add_product("Mug", 5);
        let user = store.add_user("Ada", "ada@example.com");
        let order_id = store.add_order(user, &[(product, 1, "10.00")], OrderStatus::Paid);
        let gateway = HostedGateway::new(config(), store).unwrap();

        let err = gateway
            .prepare(&PaymentInit {
                order_id,
                customer_email: "ada@example.com".into(),
                customer_name: "Ada".into(),
                customer_address: "-".into(),
                customer_phone: "-".into(),
                client_ip: "10.0.0.1".into(),
            })
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn callback_signature_covers_oid_salt_status_total() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let gateway = HostedGateway::new(config(), store).unwrap();
        let hash = sign("key-abc", &["abc123", "salt-xyz", "success", "2000"]);
        let callback = PaymentCallback {
            merchant_oid: "abc123".into(),
            status: "success".into(),
            total_amount: "2000".into(),
            hash,
            payment_type: None,
            failed_reason_code: None,
            failed_reason_msg: None,
        };
        assert!(gateway.verify_callback(&callback).is_ok());

        let tampered = PaymentCallback {
            total_amount: "1".into(),
            ..callback.clone()
        };
        assert!(matches!(
            gateway.verify_callback(&tampered),
            Err(DomainError::Signature(_))
        ));

        let garbage = PaymentCallback {
            hash: "not base64 !!".into(),
            ..callback
        };
        assert!(matches!(
            gateway.verify_callback(&garbage),
            Err(DomainError::Signature(_))
        ));
    }

    #[test]
    fn iframe_url_joins_token() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let gateway = HostedGateway::new(config(), store).unwrap();
        assert_eq!(
            gateway.iframe_url("tok"),
            "https://gateway.example/iframe/tok"
        );
    }
}
