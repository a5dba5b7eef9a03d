use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    config::Config,
    database::Database,
    error::AppError,
    models::UserRole,
    utils::verify_token,
};

const AUTH_COOKIE: &str = "auth_token";

/// Identity taken from a verified token. Requests without one are rejected
/// with 401 before reaching the handler.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<Config>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<Config>::from_ref(state);

        let token = match bearer_token(parts) {
            Some(token) => token,
            None => {
                let cookies = Cookies::from_request_parts(parts, state)
                    .await
                    .map_err(|_| AppError::Unauthorized)?;
                cookies
                    .get(AUTH_COOKIE)
                    .map(|c| c.value().to_string())
                    .ok_or(AppError::Unauthorized)?
            }
        };

        let claims = verify_token(&token, &config.jwt_secret).map_err(|e| {
            log::debug!("rejected token: {}", e);
            AppError::Unauthorized
        })?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

        Ok(CurrentUser {
            id,
            email: claims.email.map(|e| e.trim().to_lowercase()),
        })
    }
}

/// What the caller may do inside one shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShopAccess {
    pub role: UserRole,
    pub is_owner: bool,
}

impl ShopAccess {
    pub fn resolve(owner_id: Uuid, user_id: Uuid, employee_role: Option<UserRole>) -> Option<Self> {
        if owner_id == user_id {
            return Some(ShopAccess {
                role: UserRole::Admin,
                is_owner: true,
            });
        }
        employee_role.map(|role| ShopAccess {
            role,
            is_owner: false,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Only shop admins can do this".to_string()))
        }
    }
}

/// Looks up the caller's standing in `shop_id`: owners are admins, active
/// employees get their role, everyone else is refused.
pub async fn shop_access(db: &Database, shop_id: Uuid, user: &CurrentUser) -> Result<ShopAccess, AppError> {
    let owner_id = sqlx::query_scalar::<_, Uuid>("SELECT owner_id FROM shops WHERE id = $1")
        .bind(shop_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Shop"))?;

    let employee_role = if owner_id == user.id {
        None
    } else {
        sqlx::query_scalar::<_, UserRole>(
            "SELECT role FROM shop_employees WHERE shop_id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(shop_id)
        .bind(user.id)
        .fetch_optional(db)
        .await?
    };

    ShopAccess::resolve(owner_id, user.id, employee_role)
        .ok_or_else(|| AppError::Forbidden("You do not have access to this shop".to_string()))
}

/// Shorthand for handlers that are admin-only.
pub async fn shop_admin(db: &Database, shop_id: Uuid, user: &CurrentUser) -> Result<ShopAccess, AppError> {
    let access = shop_access(db, shop_id, user).await?;
    access.require_admin()?;
    Ok(access)
}
