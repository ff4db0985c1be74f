//! Hosted identity provider over its REST API (`accounts:*` endpoints).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AuthProvider, AuthSession, AuthUser, INVALID_ID_TOKEN};
use crate::error::{CongregationError, CongregationResult};

const API_BASE: &str = "https://identitytoolkit.googleapis.com/v1/accounts:";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the provider pretends the Google sign-in was started from.
const IDP_REQUEST_URI: &str = "http://localhost";

#[derive(Debug)]
pub struct IdentityToolkit {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

impl From<AccountInfo> for AuthUser {
    fn from(info: AccountInfo) -> Self {
        AuthUser {
            uid: info.local_id,
            email: info.email,
            display_name: info.display_name,
            photo_url: info.photo_url,
            email_verified: info.email_verified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Split "WEAK_PASSWORD : Password should be at least 6 characters" into code and detail.
fn split_error_message(message: &str) -> (String, String) {
    match message.split_once(" : ") {
        Some((code, detail)) => (code.trim().to_string(), detail.trim().to_string()),
        None => (message.trim().to_string(), message.trim().to_string()),
    }
}

impl IdentityToolkit {
    pub fn new(api_key: impl Into<String>) -> CongregationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(IdentityToolkit {
            http,
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Point at an emulator or proxy instead of the hosted API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}{method}", self.base_url)
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> CongregationResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.endpoint(method))
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = match resp.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => status.to_string(),
            };
            let (code, detail) = split_error_message(&message);
            tracing::debug!(method, %status, %code, "Identity request rejected");
            return Err(CongregationError::Auth {
                code,
                message: detail,
            });
        }

        Ok(resp.json().await?)
    }

    async fn lookup_required(&self, id_token: &str) -> CongregationResult<AuthUser> {
        self.lookup(id_token).await?.ok_or_else(|| CongregationError::Auth {
            code: INVALID_ID_TOKEN.into(),
            message: "Token does not belong to any user".into(),
        })
    }

    /// Finish a sign-in: resolve the full user behind a fresh token.
    async fn session(&self, tokens: TokenResponse) -> CongregationResult<AuthSession> {
        let user = self.lookup_required(&tokens.id_token).await?;
        Ok(AuthSession {
            id_token: tokens.id_token,
            user,
        })
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkit {
    async fn create_user(&self, email: &str, password: &str) -> CongregationResult<AuthSession> {
        let tokens: TokenResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.session(tokens).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> CongregationResult<AuthSession> {
        let tokens: TokenResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.session(tokens).await
    }

    async fn sign_in_with_google(&self, google_id_token: &str) -> CongregationResult<AuthSession> {
        let body = json!({
            "postBody": format!("id_token={google_id_token}&providerId=google.com"),
            "requestUri": IDP_REQUEST_URI,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        let tokens: TokenResponse = self.call("signInWithIdp", &body).await?;
        self.session(tokens).await
    }

    async fn update_profile(
        &self,
        id_token: &str,
        display_name: &str,
        photo_url: &str,
    ) -> CongregationResult<AuthUser> {
        let body = json!({
            "idToken": id_token,
            "displayName": display_name,
            "photoUrl": photo_url,
            "returnSecureToken": false,
        });
        let _: serde_json::Value = self.call("update", &body).await?;
        self.lookup_required(id_token).await
    }

    async fn send_email_verification(&self, id_token: &str) -> CongregationResult<()> {
        let body = json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token });
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> CongregationResult<Option<AuthUser>> {
        let body = json!({ "idToken": id_token });
        match self.call::<_, LookupResponse>("lookup", &body).await {
            Ok(resp) => Ok(resp.users.into_iter().next().map(AuthUser::from)),
            Err(CongregationError::Auth { code, .. })
                if code == INVALID_ID_TOKEN || code == "TOKEN_EXPIRED" || code == "USER_NOT_FOUND" =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self, _id_token: &str) -> CongregationResult<()> {
        // ID tokens are bearer tokens; signing out means the site drops it.
        tracing::debug!("Signed out (token discarded by client)");
        Ok(())
    }
}
