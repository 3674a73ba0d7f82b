use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// 兑换失败分类（对外暴露的错误码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedeemErrorKind {
    InvalidCode,
    AlreadyRedeemed,
    MissingFields,
    InvalidFields,
    AllocationExhausted,
    DeadlineExceeded,
    StoreUnavailable,
}

/// 兑换引擎对外的错误
///
/// 前四类为永久性错误（用户可见，不应重试）；其余为暂时性错误，
/// 调用方可以整体重试一次新的兑换尝试。存储层的版本冲突在引擎内部
/// 重试消化，不会出现在这里。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedeemError {
    #[error("Invalid redeem code")]
    InvalidCode,

    #[error("Redeem code has already been redeemed")]
    AlreadyRedeemed,

    #[error("Missing redeemer fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Redeemer fields too long: {}", .0.join(", "))]
    InvalidFields(Vec<&'static str>),

    #[error("Prize allocation still contended after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("Redemption deadline exceeded")]
    DeadlineExceeded,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl RedeemError {
    pub fn kind(&self) -> RedeemErrorKind {
        match self {
            RedeemError::InvalidCode => RedeemErrorKind::InvalidCode,
            RedeemError::AlreadyRedeemed => RedeemErrorKind::AlreadyRedeemed,
            RedeemError::MissingFields(_) => RedeemErrorKind::MissingFields,
            RedeemError::InvalidFields(_) => RedeemErrorKind::InvalidFields,
            RedeemError::AllocationExhausted { .. } => RedeemErrorKind::AllocationExhausted,
            RedeemError::DeadlineExceeded => RedeemErrorKind::DeadlineExceeded,
            RedeemError::StoreUnavailable(_) => RedeemErrorKind::StoreUnavailable,
        }
    }

    /// 暂时性错误：整个兑换可以从头重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RedeemError::AllocationExhausted { .. }
                | RedeemError::DeadlineExceeded
                | RedeemError::StoreUnavailable(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RedeemError::InvalidCode => StatusCode::NOT_FOUND,
            RedeemError::AlreadyRedeemed => StatusCode::CONFLICT,
            RedeemError::MissingFields(_) | RedeemError::InvalidFields(_) => {
                StatusCode::BAD_REQUEST
            }
            RedeemError::AllocationExhausted { .. }
            | RedeemError::DeadlineExceeded
            | RedeemError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for RedeemError {
    fn from(err: StoreError) -> Self {
        RedeemError::StoreUnavailable(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::StoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                ("VALIDATION_ERROR", msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                ("AUTH_ERROR", msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                ("AUTH_ERROR", "Invalid access token".to_string())
            }
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => {
                log::warn!("Conflict: {msg}");
                ("CONFLICT", msg.clone())
            }
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                ("FORBIDDEN", "Forbidden".to_string())
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                ("DATABASE_ERROR", "Database error".to_string())
            }
            AppError::StoreError(err) => {
                log::error!("Store error: {err}");
                ("STORE_UNAVAILABLE", "Store unavailable".to_string())
            }
            AppError::InternalError(msg) => {
                log::error!("Internal error: {msg}");
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}
