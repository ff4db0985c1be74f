//! Authentication port and the site's account flows.
//!
//! The identity provider owns credentials and sessions; the site keeps roles
//! and email verification codes in the database. [`AccountService`] ties the
//! two together.

mod account;
mod identity_toolkit;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CongregationError, CongregationResult};

pub use account::{AccountService, Profile, SignupRequest, VerificationRecord};
pub use identity_toolkit::IdentityToolkit;
pub use memory::MemoryAuth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Roles are stored as plain strings; anything unrecognised is a regular user.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> CongregationResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CongregationError::Forbidden)
        }
    }
}

/// A user as the identity provider knows them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
}

/// A signed-in user and the token that proves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub id_token: String,
    pub user: AuthUser,
}

// Error codes shared by the providers
pub const EMAIL_EXISTS: &str = "EMAIL_EXISTS";
pub const WEAK_PASSWORD: &str = "WEAK_PASSWORD";
pub const INVALID_EMAIL: &str = "INVALID_EMAIL";
pub const INVALID_LOGIN_CREDENTIALS: &str = "INVALID_LOGIN_CREDENTIALS";
pub const INVALID_ID_TOKEN: &str = "INVALID_ID_TOKEN";
pub const INVALID_IDP_RESPONSE: &str = "INVALID_IDP_RESPONSE";

/// The identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_user(&self, email: &str, password: &str) -> CongregationResult<AuthSession>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> CongregationResult<AuthSession>;

    /// Sign in (creating the account on first use) with a Google ID token.
    async fn sign_in_with_google(&self, google_id_token: &str) -> CongregationResult<AuthSession>;

    async fn update_profile(
        &self,
        id_token: &str,
        display_name: &str,
        photo_url: &str,
    ) -> CongregationResult<AuthUser>;

    async fn send_email_verification(&self, id_token: &str) -> CongregationResult<()>;

    /// The user a token belongs to; `None` for unknown or expired tokens.
    async fn lookup(&self, id_token: &str) -> CongregationResult<Option<AuthUser>>;

    async fn sign_out(&self, id_token: &str) -> CongregationResult<()>;
}
