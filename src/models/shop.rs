use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Cashier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "employee_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Pending,
    Active,
    Inactive,
}

/// Account record mirrored from the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub name_tamil: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gstin: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AccessibleShop {
    #[serde(flatten)]
    pub shop: Shop,
    pub role: UserRole,
    pub is_owner: bool,
}

#[derive(Debug, Deserialize)]
pub struct ShopInput {
    pub name: String,
    pub name_tamil: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gstin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShopEmployee {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Option<Uuid>,
    pub invited_email: String,
    pub role: UserRole,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct EmployeeDisplay {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub invited_email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
}

/// Normalises an invitation address; `None` when it cannot be an email.
pub fn normalize_invite_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_email_is_trimmed_and_lowercased() {
        assert_eq!(
            normalize_invite_email("  Ravi.K@Example.COM "),
            Some("ravi.k@example.com".to_string())
        );
    }

    #[test]
    fn rejects_addresses_that_cannot_be_emails() {
        assert_eq!(normalize_invite_email("ravi"), None);
        assert_eq!(normalize_invite_email("@example.com"), None);
        assert_eq!(normalize_invite_email("ravi@localhost"), None);
        assert_eq!(normalize_invite_email("ravi k@example.com"), None);
    }
}
