use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use serde_json::Value;

use crate::config::SmtpConfig;
use crate::domain::errors::DomainError;
use crate::domain::outbox::NotificationKind;
use crate::domain::ports::Notifier;

/// Writes notifications to the log instead of sending them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, kind: NotificationKind, recipient: &str, data: &Value) -> Result<(), DomainError> {
        log::info!("notification {kind} for {recipient}: {data}");
        Ok(())
    }
}

pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, DomainError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| DomainError::Configuration(format!("invalid SMTP relay: {e}")))?
            .credentials(creds)
            .port(config.port)
            .build();
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DomainError::Configuration(format!("invalid SMTP_FROM: {e}")))?;
        Ok(Self { mailer, from })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, kind: NotificationKind, recipient: &str, data: &Value) -> Result<(), DomainError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| DomainError::SideEffect(format!("invalid recipient {recipient}: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(kind.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(render_body(kind, data))
            .map_err(|e| DomainError::SideEffect(format!("failed to build email: {e}")))?;

        self.mailer
            .send(&email)
            .map_err(|e| DomainError::SideEffect(format!("failed to send {kind} to {recipient}: {e}")))?;
        log::info!("{kind} sent to {recipient}");
        Ok(())
    }
}

/// Plain-text body: a greeting, the subject line, then one `key: value` line
/// per scalar field.
pub fn render_body(kind: NotificationKind, data: &Value) -> String {
    let mut body = String::new();
    if let Some(name) = data.get("customer_name").and_then(Value::as_str) {
        body.push_str(&format!("Hello {name},\n\n"));
    }
    body.push_str(kind.subject());
    body.push_str(".\n\n");

    if let Some(fields) = data.as_object() {
        for (key, value) in fields {
            if key == "customer_name" {
                continue;
            }
            let rendered = match value {
                Value::Null | Value::Array(_) | Value::Object(_) => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            body.push_str(&format!("{}: {rendered}\n", key.replace('_', " ")));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_lists_scalar_fields_and_skips_nulls() {
        let body = render_body(
            NotificationKind::OrderShipped,
            &json!({
                "customer_name": "Ada",
                "tracking_number": "T-1",
                "tracking_url": null,
                "lines": [1, 2],
            }),
        );
        assert!(body.starts_with("Hello Ada,"));
        assert!(body.contains("Your order has shipped"));
        assert!(body.contains("tracking number: T-1"));
        assert!(!body.contains("tracking url"));
        assert!(!body.contains("lines"));
    }

    #[test]
    fn log_notifier_always_succeeds() {
        assert!(LogNotifier
            .send(NotificationKind::OrderPaid, "ada@example.com", &json!({}))
            .is_ok());
    }
}
