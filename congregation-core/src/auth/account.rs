//! Sign-up, verification-code login, Google sign-in and identity lookup.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AuthProvider, AuthSession, Identity, Role};
use crate::constants::{
    DEFAULT_PROFILE_PIC, PROFILE_PICS_PREFIX, USERS_PATH, VERIFICATION_CODES_PATH,
};
use crate::error::{CongregationError, CongregationResult};
use crate::storage::{BlobStorage, Upload, UploadKind, store_upload};
use crate::store::{DataStore, join_path};

/// What a new member fills in.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_pic: Option<Upload>,
}

/// The code record kept at `verificationCodes/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub code: String,
    pub email: String,
    pub verified: bool,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub created_at: i64,
}

/// The signed-in user as the site shows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
    pub role: Role,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn DataStore>,
    auth: Arc<dyn AuthProvider>,
    storage: Arc<dyn BlobStorage>,
}

fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl AccountService {
    pub fn new(
        store: Arc<dyn DataStore>,
        auth: Arc<dyn AuthProvider>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        AccountService {
            store,
            auth,
            storage,
        }
    }

    /// Create the account, its role record and its verification code, then
    /// set up the profile and send the verification email.
    pub async fn signup(&self, request: SignupRequest) -> CongregationResult<AuthSession> {
        if let Some(pic) = &request.profile_pic {
            pic.validate(UploadKind::Image)?;
        }

        let session = self
            .auth
            .create_user(&request.email, &request.password)
            .await?;
        let uid = session.user.uid.clone();
        let now = Utc::now().timestamp_millis();

        self.store
            .write(
                &join_path(&[USERS_PATH, &uid]),
                json!({ "role": Role::User, "email": request.email, "createdAt": now }),
            )
            .await?;

        let record = VerificationRecord {
            code: generate_verification_code(),
            email: request.email.clone(),
            verified: false,
            created_at: now,
        };
        self.store
            .write(
                &join_path(&[VERIFICATION_CODES_PATH, &uid]),
                serde_json::to_value(&record)?,
            )
            .await?;

        let photo_url = match &request.profile_pic {
            Some(pic) => {
                let path = join_path(&[PROFILE_PICS_PREFIX, &uid]);
                store_upload(self.storage.as_ref(), &path, pic).await?
            }
            None => DEFAULT_PROFILE_PIC.to_string(),
        };

        let display_name = format!("{} {}", request.first_name, request.last_name);
        let user = self
            .auth
            .update_profile(&session.id_token, display_name.trim(), &photo_url)
            .await?;

        self.auth.send_email_verification(&session.id_token).await?;

        tracing::info!(uid = %uid, "Signed up; verification code sent");
        Ok(AuthSession {
            id_token: session.id_token,
            user,
        })
    }

    /// Password sign-in gated by the emailed verification code.
    ///
    /// A missing or mismatched code signs the user straight back out.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        verification_code: &str,
    ) -> CongregationResult<AuthSession> {
        let session = self.auth.sign_in_with_password(email, password).await?;
        let uid = &session.user.uid;
        let path = join_path(&[VERIFICATION_CODES_PATH, uid]);

        let snapshot = self.store.read(&path).await?;
        if !snapshot.exists() {
            self.abandon(&session).await;
            return Err(CongregationError::VerificationCodeNotFound);
        }

        let record: VerificationRecord =
            serde_json::from_value(snapshot.into_value()).map_err(|e| {
                CongregationError::MalformedRecord {
                    key: path.clone(),
                    reason: e.to_string(),
                }
            })?;

        if record.code != verification_code.trim() {
            self.abandon(&session).await;
            return Err(CongregationError::InvalidVerificationCode);
        }

        if !record.verified {
            let verified = VerificationRecord {
                verified: true,
                ..record
            };
            self.store
                .write(&path, serde_json::to_value(&verified)?)
                .await?;
            tracing::info!(uid = %uid, "Verification code confirmed");
        }

        Ok(session)
    }

    async fn abandon(&self, session: &AuthSession) {
        if let Err(e) = self.auth.sign_out(&session.id_token).await {
            tracing::warn!(uid = %session.user.uid, error = %e, "Sign-out after failed verification failed");
        }
    }

    pub async fn login_with_google(&self, google_id_token: &str) -> CongregationResult<AuthSession> {
        let session = self.auth.sign_in_with_google(google_id_token).await?;
        tracing::info!(uid = %session.user.uid, "Signed in with Google");
        Ok(session)
    }

    pub async fn logout(&self, id_token: &str) -> CongregationResult<()> {
        self.auth.sign_out(id_token).await
    }

    /// The id and role behind a token, or `None` when nobody is signed in.
    pub async fn current_identity(&self, id_token: &str) -> CongregationResult<Option<Identity>> {
        let Some(user) = self.auth.lookup(id_token).await? else {
            return Ok(None);
        };
        let role = self.role_of(&user.uid).await?;
        Ok(Some(Identity { id: user.uid, role }))
    }

    pub async fn profile(&self, id_token: &str) -> CongregationResult<Option<Profile>> {
        let Some(user) = self.auth.lookup(id_token).await? else {
            return Ok(None);
        };
        let role = self.role_of(&user.uid).await?;
        Ok(Some(Profile {
            uid: user.uid,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            email_verified: user.email_verified,
            role,
        }))
    }

    async fn role_of(&self, uid: &str) -> CongregationResult<Role> {
        let snapshot = self.store.read(&join_path(&[USERS_PATH, uid, "role"])).await?;
        Ok(Role::from_stored(snapshot.value().as_str()))
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::auth::{AuthUser, MemoryAuth, MockAuthProvider};
    use crate::storage::LocalBlobStorage;
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        auth: Arc<MemoryAuth>,
        accounts: AccountService,
        _blobs: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let blobs = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(MemoryAuth::new());
        let storage = Arc::new(LocalBlobStorage::new(blobs.path(), "http://localhost/media/").unwrap());
        let accounts = AccountService::new(store.clone(), auth.clone(), storage);
        Harness {
            store,
            auth,
            accounts,
            _blobs: blobs,
        }
    }

    fn signup_request() -> SignupRequest {
        SignupRequest {
            email: "ruth@example.org".into(),
            password: "hunter22".into(),
            first_name: "Ruth".into(),
            last_name: "Moab".into(),
            profile_pic: None,
        }
    }

    async fn stored_code(h: &Harness, uid: &str) -> VerificationRecord {
        let snapshot = h
            .store
            .read(&format!("verificationCodes/{uid}"))
            .await
            .unwrap();
        serde_json::from_value(snapshot.into_value()).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn signup_writes_role_code_and_profile() {
        let h = harness();
        let session = h.accounts.signup(signup_request()).await.unwrap();
        let uid = session.user.uid.clone();

        let user = h.store.read(&format!("users/{uid}")).await.unwrap();
        assert_eq!(user.value()["role"], "user");
        assert_eq!(user.value()["email"], "ruth@example.org");

        let record = stored_code(&h, &uid).await;
        assert_eq!(record.code.len(), 6);
        let code: u32 = record.code.parse().unwrap();
        assert!((100_000..=999_999).contains(&code));
        assert!(!record.verified);

        assert_eq!(session.user.display_name.as_deref(), Some("Ruth Moab"));
        assert_eq!(session.user.photo_url.as_deref(), Some(DEFAULT_PROFILE_PIC));
        assert_eq!(h.auth.verification_outbox().await, ["ruth@example.org"]);
    }

    #[test_log::test(tokio::test)]
    async fn signup_uploads_profile_picture() {
        let h = harness();
        let mut request = signup_request();
        request.profile_pic = Some(Upload {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            bytes: vec![137, 80, 78, 71],
        });

        let session = h.accounts.signup(request).await.unwrap();
        let photo = session.user.photo_url.unwrap();
        assert_eq!(photo, format!("http://localhost/media/profilePics/{}", session.user.uid));
    }

    #[test_log::test(tokio::test)]
    async fn login_with_correct_code_marks_verified() {
        let h = harness();
        let session = h.accounts.signup(signup_request()).await.unwrap();
        let code = stored_code(&h, &session.user.uid).await.code;

        let login = h
            .accounts
            .login("ruth@example.org", "hunter22", &code)
            .await
            .unwrap();
        assert_eq!(login.user.uid, session.user.uid);
        assert!(stored_code(&h, &session.user.uid).await.verified);

        // Still accepted once verified
        h.accounts
            .login("ruth@example.org", "hunter22", &code)
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn login_with_wrong_code_is_rejected() {
        let h = harness();
        let session = h.accounts.signup(signup_request()).await.unwrap();
        let code = stored_code(&h, &session.user.uid).await.code;
        let wrong = if code == "123456" { "654321" } else { "123456" };

        let err = h
            .accounts
            .login("ruth@example.org", "hunter22", wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, CongregationError::InvalidVerificationCode));
        assert!(!stored_code(&h, &session.user.uid).await.verified);
    }

    #[test_log::test(tokio::test)]
    async fn login_without_code_record_is_rejected() {
        let h = harness();
        h.auth.create_user("naomi@example.org", "hunter22").await.unwrap();

        let err = h
            .accounts
            .login("naomi@example.org", "hunter22", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, CongregationError::VerificationCodeNotFound));
    }

    #[test_log::test(tokio::test)]
    async fn failed_verification_signs_out() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(
                "verificationCodes/u1",
                json!({ "code": "111111", "email": "ruth@example.org", "verified": false }),
            )
            .await
            .unwrap();

        let mut auth = MockAuthProvider::new();
        auth.expect_sign_in_with_password().returning(|email, _| {
            Ok(AuthSession {
                id_token: "t1".into(),
                user: AuthUser {
                    uid: "u1".into(),
                    email: Some(email.to_string()),
                    ..AuthUser::default()
                },
            })
        });
        auth.expect_sign_out()
            .with(eq("t1"))
            .times(1)
            .returning(|_| Ok(()));

        let blobs = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalBlobStorage::new(blobs.path(), "http://localhost/").unwrap());
        let accounts = AccountService::new(store, Arc::new(auth), storage);

        let err = accounts
            .login("ruth@example.org", "pw", "999999")
            .await
            .unwrap_err();
        assert!(matches!(err, CongregationError::InvalidVerificationCode));
    }

    #[test_log::test(tokio::test)]
    async fn identity_carries_stored_role() {
        let h = harness();
        let session = h.accounts.signup(signup_request()).await.unwrap();

        let identity = h
            .accounts
            .current_identity(&session.id_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.role, Role::User);

        h.store
            .write(&format!("users/{}/role", identity.id), json!("admin"))
            .await
            .unwrap();
        let profile = h.accounts.profile(&session.id_token).await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Admin);

        h.accounts.logout(&session.id_token).await.unwrap();
        assert!(h
            .accounts
            .current_identity(&session.id_token)
            .await
            .unwrap()
            .is_none());
    }

    #[test_log::test(tokio::test)]
    async fn google_users_default_to_user_role() {
        let h = harness();
        h.auth
            .register_google_account("g1", "boaz@example.org", "Boaz")
            .await;
        let session = h.accounts.login_with_google("g1").await.unwrap();
        let identity = h
            .accounts
            .current_identity(&session.id_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.role, Role::User);
    }
}
