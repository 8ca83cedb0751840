use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::errors::DomainError;
use crate::domain::ports::CompanyInfo;

const DEFAULT_TOKEN_URL: &str = "https://www.paytr.com/odeme/api/get-token";
const DEFAULT_IFRAME_URL: &str = "https://www.paytr.com/odeme/guvenli";

/// Hosted card gateway credentials and request options.
#[derive(Debug, Clone)]
pub struct HostedGatewayConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub merchant_salt: String,
    pub token_url: String,
    pub iframe_base_url: String,
    pub ok_url: String,
    pub fail_url: String,
    pub currency: String,
    pub test_mode: bool,
    pub timeout_limit: u32,
    pub max_installment: u32,
    pub no_installment: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_secs: u64,
    pub batch_size: usize,
    pub max_attempts: i32,
}

#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub poll_secs: u64,
    /// Lower-cased shipping company name to status endpoint.
    pub endpoints: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gateway: HostedGatewayConfig,
    pub business_email: String,
    pub company: CompanyInfo,
    pub invoice_dir: String,
    pub outbox: OutboxConfig,
    pub carrier: CarrierConfig,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, DomainError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Secrets have no defaults: a
    /// missing one is a `Configuration` error naming the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let gateway = HostedGatewayConfig {
            merchant_id: env.required("PAYTR_MERCHANT_ID")?,
            merchant_key: env.required("PAYTR_MERCHANT_KEY")?,
            merchant_salt: env.required("PAYTR_MERCHANT_SALT")?,
            token_url: env.or("PAYTR_TOKEN_URL", DEFAULT_TOKEN_URL),
            iframe_base_url: env.or("PAYTR_IFRAME_URL", DEFAULT_IFRAME_URL),
            ok_url: env.or("PAYTR_OK_URL", ""),
            fail_url: env.or("PAYTR_FAIL_URL", ""),
            currency: env.or("PAYTR_CURRENCY", "TL"),
            test_mode: env.flag("PAYTR_TEST_MODE")?,
            timeout_limit: env.parsed("PAYTR_TIMEOUT_LIMIT", 30)?,
            max_installment: env.parsed("PAYTR_MAX_INSTALLMENT", 0)?,
            no_installment: env.flag("PAYTR_NO_INSTALLMENT")?,
        };

        let smtp = match env.optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: env.parsed("SMTP_PORT", 587)?,
                username: env.required("SMTP_USERNAME")?,
                password: env.required("SMTP_PASSWORD")?,
                from: env.required("SMTP_FROM")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url: env.required("DATABASE_URL")?,
            host: env.or("HOST", "0.0.0.0"),
            port: env.parsed("PORT", 8080)?,
            gateway,
            business_email: env.required("BUSINESS_NOTIFICATION_EMAIL")?,
            company: CompanyInfo {
                name: env.or("COMPANY_NAME", ""),
                address: env.or("COMPANY_ADDRESS", ""),
                tax_id: env.or("COMPANY_TAX_ID", ""),
            },
            invoice_dir: env.or("INVOICE_DIR", "./invoices"),
            outbox: OutboxConfig {
                poll_secs: env.parsed("OUTBOX_POLL_SECS", 5)?,
                batch_size: env.parsed("OUTBOX_BATCH_SIZE", 50)?,
                max_attempts: env.parsed("OUTBOX_MAX_ATTEMPTS", 8)?,
            },
            carrier: CarrierConfig {
                poll_secs: env.parsed("CARRIER_POLL_SECS", 900)?,
                endpoints: parse_endpoints(&env.or("CARRIER_ENDPOINTS", ""))?,
            },
            smtp,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, DomainError> {
        self.optional(key)
            .ok_or_else(|| DomainError::Configuration(format!("{key} must be set")))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, DomainError> {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| {
                DomainError::Configuration(format!("{key} has an invalid value '{raw}'"))
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, DomainError> {
        match self.optional(key).as_deref() {
            None => Ok(false),
            Some("1") | Some("true") | Some("TRUE") | Some("yes") => Ok(true),
            Some("0") | Some("false") | Some("FALSE") | Some("no") => Ok(false),
            Some(other) => Err(DomainError::Configuration(format!(
                "{key} must be a boolean, got '{other}'"
            ))),
        }
    }
}

/// Parses `"company=url,company=url"`.
fn parse_endpoints(raw: &str) -> Result<HashMap<String, String>, DomainError> {
    let mut endpoints = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (company, url) = entry.split_once('=').ok_or_else(|| {
            DomainError::Configuration(format!("CARRIER_ENDPOINTS entry '{entry}' is not company=url"))
        })?;
        endpoints.insert(company.trim().to_lowercase(), url.trim().to_string());
    }
    Ok(endpoints)
}
