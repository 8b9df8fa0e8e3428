//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.
//!
//! Account creation and credential management belong to the upstream
//! identity service; this service only loads users to authenticate
//! requests and resolve display fields, so the repository is read-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// User roles matching the PostgreSQL ENUM `user_role`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE user_role AS ENUM ('customer', 'support', 'doctor', 'admin');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// A platform customer
    #[default]
    Customer,
    /// A support agent
    Support,
    /// A medical professional (for medical-category chats)
    Doctor,
    /// A platform administrator
    Admin,
}

impl UserRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "customer" => Self::Customer,
            "support" => Self::Support,
            "doctor" => Self::Doctor,
            "admin" => Self::Admin,
            _ => Self::Customer,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Support => "support",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
        }
    }

    /// Staff roles may act on resources they do not own.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Support | Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(50) NOT NULL
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - role: user_role NOT NULL DEFAULT 'customer'
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - is_email_verified: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Display name
    pub name: String,

    /// Email address (unique)
    pub email: String,

    /// Platform role
    pub role: UserRole,

    /// Deactivated accounts cannot authenticate
    pub is_active: bool,

    /// Whether the email address has been verified
    pub is_email_verified: bool,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: String::new(),
            role: UserRole::default(),
            is_active: true,
            is_email_verified: false,
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for User data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Load display fields (id, name, email) for a set of users.
    async fn find_display_fields(&self, ids: Vec<i64>) -> Result<Vec<User>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_conversion() {
        assert!(matches!(UserRole::from_str("support"), UserRole::Support));
        assert!(matches!(UserRole::from_str("DOCTOR"), UserRole::Doctor));
        assert!(matches!(UserRole::from_str("unknown"), UserRole::Customer));
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Support.is_staff());
        assert!(UserRole::Admin.is_staff());
        assert!(!UserRole::Customer.is_staff());
        assert!(!UserRole::Doctor.is_staff());
    }
}
