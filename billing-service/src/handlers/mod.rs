pub mod health;
pub mod invoices;
pub mod items;
pub mod settings;

use crate::services::{Caller, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Extract the caller identity the external authentication layer placed in
/// the request headers. The engine never verifies credentials itself.
#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let user_id = header("x-user-id")
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("missing or invalid x-user-id header"))
            })?;
        let role = header("x-role")
            .and_then(|v| v.parse::<Role>().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("missing or invalid x-role header"))
            })?;
        let customer_id = match header("x-customer-id") {
            Some(v) => Some(Uuid::parse_str(v).map_err(|_| {
                AppError::Unauthorized(anyhow::anyhow!("invalid x-customer-id header"))
            })?),
            None => None,
        };

        Ok(Caller {
            user_id,
            role,
            customer_id,
        })
    }
}

/// Guard for admin-only endpoints.
pub(crate) fn require_admin(caller: &Caller) -> Result<(), AppError> {
    if caller.role != Role::Admin {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "admin role required"
        )));
    }
    Ok(())
}
