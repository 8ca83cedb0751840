use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::ports::{CarrierStatus, CarrierStatusSource, ShipmentStatus};

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    description: Option<String>,
}

/// Queries `GET {endpoint}?tracking_number=...`, expecting
/// `{"status": "...", "description": "..."}`.
pub struct HttpCarrierSource {
    endpoint: String,
    // Built on first use: the blocking client may not be created on an async
    // runtime thread.
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpCarrierSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, DomainError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DomainError::Configuration(format!("carrier client: {e}")))?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl CarrierStatusSource for HttpCarrierSource {
    fn get_status(&self, tracking_number: &str) -> Result<CarrierStatus, DomainError> {
        let reply: StatusReply = self
            .client()?
            .get(&self.endpoint)
            .query(&[("tracking_number", tracking_number)])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| DomainError::SideEffect(format!("carrier request failed: {e}")))?;
        parse_reply(reply)
    }
}

fn parse_reply(reply: StatusReply) -> Result<CarrierStatus, DomainError> {
    let status = ShipmentStatus::from_carrier_label(&reply.status).ok_or_else(|| {
        DomainError::SideEffect(format!("unrecognised carrier status '{}'", reply.status))
    })?;
    Ok(CarrierStatus {
        status,
        description: reply.description.unwrap_or(reply.status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_maps_onto_shipment_status() {
        let reply: StatusReply =
            serde_json::from_str(r#"{"status":"out for delivery","description":"On the van"}"#)
                .unwrap();
        let status = parse_reply(reply).unwrap();
        assert_eq!(status.status, ShipmentStatus::OutForDelivery);
        assert_eq!(status.description, "On the van");
    }

    #[test]
    fn unknown_label_is_a_side_effect_error() {
        let reply: StatusReply = serde_json::from_str(r#"{"status":"lost at sea"}"#).unwrap();
        assert!(matches!(parse_reply(reply), Err(DomainError::SideEffect(_))));
    }
}
