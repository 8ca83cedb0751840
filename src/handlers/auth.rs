use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};

use crate::errors::AppError;

/// Header set by the authenticating proxy in front of the admin surface.
pub const ADMIN_HEADER: &str = "X-Admin-Id";

/// The authenticated admin performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity(pub String);

impl FromRequest for AdminIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let admin = req
            .headers()
            .get(ADMIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        ready(match admin {
            Some(admin) => Ok(AdminIdentity(admin.to_string())),
            None => Err(AppError::Unauthorized(format!("missing {ADMIN_HEADER} header"))),
        })
    }
}
