//! In-process identity provider for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuthProvider, AuthSession, AuthUser, EMAIL_EXISTS, INVALID_EMAIL, INVALID_ID_TOKEN,
    INVALID_IDP_RESPONSE, INVALID_LOGIN_CREDENTIALS, WEAK_PASSWORD,
};
use crate::error::{CongregationError, CongregationResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug)]
struct Account {
    password_digest: Option<String>,
    user: AuthUser,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by uid
    accounts: HashMap<String, Account>,
    /// Google ID token -> (email, display name)
    google_tokens: HashMap<String, (String, String)>,
    /// Session token -> uid
    sessions: HashMap<String, String>,
    /// Emails a verification message was sent to, oldest first
    verification_outbox: Vec<String>,
}

impl State {
    fn uid_for_email(&self, email: &str) -> Option<String> {
        self.accounts
            .iter()
            .find(|(_, a)| a.user.email.as_deref() == Some(email))
            .map(|(uid, _)| uid.clone())
    }

    fn open_session(&mut self, uid: &str) -> CongregationResult<AuthSession> {
        let user = self
            .accounts
            .get(uid)
            .map(|a| a.user.clone())
            .ok_or_else(|| CongregationError::auth(INVALID_LOGIN_CREDENTIALS, "No such user"))?;
        let id_token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(id_token.clone(), uid.to_string());
        Ok(AuthSession { id_token, user })
    }

    fn account_for_token(&mut self, id_token: &str) -> CongregationResult<&mut Account> {
        let uid = self
            .sessions
            .get(id_token)
            .cloned()
            .ok_or_else(|| CongregationError::auth(INVALID_ID_TOKEN, "Unknown session"))?;
        self.accounts
            .get_mut(&uid)
            .ok_or_else(|| CongregationError::auth(INVALID_ID_TOKEN, "Unknown session"))
    }
}

fn digest(uid: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct MemoryAuth {
    state: Mutex<State>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `google_id_token` sign in as `email`.
    pub async fn register_google_account(&self, google_id_token: &str, email: &str, name: &str) {
        self.state.lock().await.google_tokens.insert(
            google_id_token.to_string(),
            (email.to_string(), name.to_string()),
        );
    }

    /// Addresses verification emails were sent to.
    pub async fn verification_outbox(&self) -> Vec<String> {
        self.state.lock().await.verification_outbox.clone()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn create_user(&self, email: &str, password: &str) -> CongregationResult<AuthSession> {
        if !email.contains('@') {
            return Err(CongregationError::auth(INVALID_EMAIL, "Invalid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CongregationError::auth(
                WEAK_PASSWORD,
                "Password should be at least 6 characters",
            ));
        }

        let mut state = self.state.lock().await;
        if state.uid_for_email(email).is_some() {
            return Err(CongregationError::auth(EMAIL_EXISTS, "Email already in use"));
        }

        let uid = Uuid::new_v4().simple().to_string();
        state.accounts.insert(
            uid.clone(),
            Account {
                password_digest: Some(digest(&uid, password)),
                user: AuthUser {
                    uid: uid.clone(),
                    email: Some(email.to_string()),
                    ..AuthUser::default()
                },
            },
        );
        tracing::debug!(uid = %uid, "Created user");
        state.open_session(&uid)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> CongregationResult<AuthSession> {
        let mut state = self.state.lock().await;
        let uid = state.uid_for_email(email);

        let valid = uid.as_ref().is_some_and(|uid| {
            state.accounts.get(uid).and_then(|a| a.password_digest.as_deref())
                == Some(digest(uid, password).as_str())
        });

        match uid {
            Some(uid) if valid => state.open_session(&uid),
            _ => Err(CongregationError::auth(
                INVALID_LOGIN_CREDENTIALS,
                "Invalid email or password",
            )),
        }
    }

    async fn sign_in_with_google(&self, google_id_token: &str) -> CongregationResult<AuthSession> {
        let mut state = self.state.lock().await;
        let (email, name) = state
            .google_tokens
            .get(google_id_token)
            .cloned()
            .ok_or_else(|| CongregationError::auth(INVALID_IDP_RESPONSE, "Unknown Google token"))?;

        let uid = match state.uid_for_email(&email) {
            Some(uid) => uid,
            None => {
                let uid = Uuid::new_v4().simple().to_string();
                state.accounts.insert(
                    uid.clone(),
                    Account {
                        password_digest: None,
                        user: AuthUser {
                            uid: uid.clone(),
                            email: Some(email),
                            display_name: Some(name),
                            photo_url: None,
                            email_verified: true,
                        },
                    },
                );
                uid
            }
        };

        state.open_session(&uid)
    }

    async fn update_profile(
        &self,
        id_token: &str,
        display_name: &str,
        photo_url: &str,
    ) -> CongregationResult<AuthUser> {
        let mut state = self.state.lock().await;
        let account = state.account_for_token(id_token)?;
        account.user.display_name = Some(display_name.to_string());
        account.user.photo_url = Some(photo_url.to_string());
        Ok(account.user.clone())
    }

    async fn send_email_verification(&self, id_token: &str) -> CongregationResult<()> {
        let mut state = self.state.lock().await;
        let email = state
            .account_for_token(id_token)?
            .user
            .email
            .clone()
            .unwrap_or_default();
        state.verification_outbox.push(email);
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> CongregationResult<Option<AuthUser>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(id_token)
            .and_then(|uid| state.accounts.get(uid))
            .map(|a| a.user.clone()))
    }

    async fn sign_out(&self, id_token: &str) -> CongregationResult<()> {
        self.state.lock().await.sessions.remove(id_token);
        Ok(())
    }
}
