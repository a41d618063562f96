//! User profiles.

use petverse_core::{Email, UserId, UserRole};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::{Access, ApiClient};
use crate::error::ApiError;

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Profile changes for `PATCH /updateuser`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UserUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.photo.is_none() && self.phone.is_none() && self.address.is_none()
    }
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    email: &'a Email,
    #[serde(flatten)]
    update: &'a UserUpdate,
}

#[derive(Serialize)]
struct EmailQuery<'a> {
    email: &'a Email,
}

/// Client for user profiles.
#[derive(Clone)]
pub struct UserClient {
    api: ApiClient,
}

impl UserClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Look up a user by email (`GET /singleuser?email=`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn single_user(&self, email: &Email) -> Result<User, ApiError> {
        self.api
            .get_json(Access::Secure, &["singleuser"], &EmailQuery { email })
            .await
    }

    /// Update the profile of `email` (`PATCH /updateuser`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, update), fields(email = %email))]
    pub async fn update_user(&self, email: &Email, update: &UserUpdate) -> Result<(), ApiError> {
        self.api
            .patch(Access::Secure, &["updateuser"], &UpdateRequest { email, update })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_user_defaults() {
        let user: User =
            serde_json::from_str(r#"{"_id":"u1","email":"Ann@Example.com","name":"Ann"}"#).unwrap();
        assert_eq!(user.email.as_str(), "ann@example.com");
        assert_eq!(user.role, UserRole::User);
        assert!(user.photo.is_none());
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let email = Email::parse("ann@example.com").unwrap();
        let update = UserUpdate {
            phone: Some("555-0142".to_string()),
            ..UserUpdate::default()
        };
        assert!(!update.is_empty());

        let value = serde_json::to_value(UpdateRequest {
            email: &email,
            update: &update,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"email": "ann@example.com", "phone": "555-0142"}));
    }
}
