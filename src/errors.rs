use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(_) => AppError::NotFound(e.to_string()),
            DomainError::Conflict { .. } | DomainError::StaleRecord(_) => {
                AppError::Conflict(e.to_string())
            }
            DomainError::InvalidInput(_) | DomainError::Signature(_) => {
                AppError::BadRequest(e.to_string())
            }
            DomainError::Unauthorized(_) => AppError::Unauthorized(e.to_string()),
            DomainError::Configuration(_)
            | DomainError::InsufficientStock { .. }
            | DomainError::SideEffect(_)
            | DomainError::Internal(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Internal(detail) => {
                log::error!("request failed: {detail}");
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
            _ => HttpResponse::build(self.status_code()).json(serde_json::json!({
                "error": self.to_string()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound("Order 1 not found".into()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn internal_error_body_hides_details() {
        let resp = AppError::Internal("password=hunter2".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"));
    }

    #[test]
    fn domain_conflict_maps_to_409() {
        let app_err: AppError = DomainError::Conflict {
            action: "ship",
            current: OrderStatus::Pending,
        }
        .into();
        assert_eq!(app_err.status_code(), StatusCode::CONFLICT);
        assert_eq!(app_err.to_string(), "Cannot ship while order is PENDING");
    }

    #[test]
    fn domain_stale_record_maps_to_409() {
        let app_err: AppError = DomainError::StaleRecord("already decided".into()).into();
        assert!(matches!(app_err, AppError::Conflict(_)));
    }

    #[test]
    fn domain_not_found_maps_to_app_not_found() {
        let app_err: AppError = DomainError::not_found("Order", "x").into();
        assert!(matches!(app_err, AppError::NotFound(_)));
    }

    #[test]
    fn domain_invalid_input_and_signature_map_to_400() {
        let app_err: AppError = DomainError::InvalidInput("bad value".to_string()).into();
        assert_eq!(app_err.status_code(), StatusCode::BAD_REQUEST);
        let app_err: AppError = DomainError::Signature("callback".to_string()).into();
        assert_eq!(app_err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn domain_configuration_maps_to_500() {
        let app_err: AppError = DomainError::Configuration("PAYTR_MERCHANT_KEY".into()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }
}
