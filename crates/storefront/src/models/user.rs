//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use partshop_core::{CartId, Email, UserId};

/// Display name given to users created implicitly by cart activity.
pub const GENERATED_USER_NAME: &str = "Auto Generated User";

/// A shop user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity key issued by the identity provider.
    pub id: UserId,
    /// Contact address.
    pub email: Email,
    /// Optional display name.
    pub name: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
}

impl NewUser {
    /// A placeholder user for an id first seen through the cart API.
    #[must_use]
    pub fn generated(id: UserId) -> Self {
        Self {
            email: Email::generated_for(&id),
            name: Some(GENERATED_USER_NAME.to_owned()),
            id,
        }
    }
}

/// Cart information shown in the users overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub id: CartId,
    pub item_count: i64,
}

/// A user together with a summary of their cart, if they have one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCartSummary {
    #[serde(flatten)]
    pub user: User,
    pub cart: Option<CartSummary>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_user() {
        let user = NewUser::generated(UserId::parse("u-17").unwrap());
        assert_eq!(user.email.as_str(), "user_u-17@example.com");
        assert_eq!(user.name.as_deref(), Some(GENERATED_USER_NAME));
    }
}
