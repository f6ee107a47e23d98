//! crates/study_core/src/verification.rs
//!
//! One-time-code signup. The [`PendingVerificationStore`] holds at most one
//! provisional registration per contact address; the [`VerificationService`]
//! drives the send / verify / resend protocol on top of it.
//!
//! Per contact key the lifecycle is
//! `NONE -> PENDING -> { VERIFIED, EXPIRED, PENDING (resend) }`, where the
//! terminal states leave no record behind.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::{ContactKey, NewAccount, PendingUserData, PendingVerification, User};
use crate::error::{CoreError, CoreResult};
use crate::ports::{CodeDispatcher, UserStore};

/// How long a freshly issued code stays valid unless configured otherwise.
pub const DEFAULT_CODE_TTL_SECS: i64 = 5 * 60;

/// Minimum accepted length of a phone number.
const MIN_PHONE_LEN: usize = 10;

//=========================================================================================
// Pending-Verification Store
//=========================================================================================

/// Process-wide table of in-flight verifications.
///
/// Records are never persisted, so a restart drops every pending signup.
/// Concurrent `put`s for the same key race with last-write-wins.
pub struct PendingVerificationStore {
    entries: RwLock<HashMap<String, PendingVerification>>,
    clock: Arc<dyn Clock>,
}

impl PendingVerificationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Stores a record for `key`, replacing any previous one.
    pub async fn put(
        &self,
        key: &ContactKey,
        user_data: PendingUserData,
        otp: String,
        expires_at: DateTime<Utc>,
    ) {
        let record = PendingVerification {
            user_data,
            auth_method: key.auth_method(),
            otp,
            expires_at,
        };
        self.entries
            .write()
            .await
            .insert(key.as_str().to_string(), record);
        info!(contact = %key, "Stored pending verification");
    }

    /// Returns the record for `key`, expired or not.
    ///
    /// Expiry is only enforced by [`sweep`](Self::sweep); callers must compare
    /// `expires_at` against the clock themselves.
    pub async fn get(&self, key: &ContactKey) -> Option<PendingVerification> {
        self.entries.read().await.get(key.as_str()).cloned()
    }

    pub async fn remove(&self, key: &ContactKey) {
        if self.entries.write().await.remove(key.as_str()).is_some() {
            info!(contact = %key, "Removed pending verification");
        }
    }

    /// Drops every record whose expiry has passed and returns how many went.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

//=========================================================================================
// Contact Validation and Codes
//=========================================================================================

/// Validates an email address well enough to route a code to it.
pub fn email_contact(raw: &str) -> CoreResult<ContactKey> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(ContactKey::Email(email.to_string()))
        }
        _ => Err(CoreError::InvalidInput("Please enter a valid email address".to_string())),
    }
}

pub fn phone_contact(raw: &str) -> CoreResult<ContactKey> {
    let phone = raw.trim();
    if phone.len() < MIN_PHONE_LEN {
        return Err(CoreError::InvalidInput("Please enter a valid phone number".to_string()));
    }
    Ok(ContactKey::Phone(phone.to_string()))
}

/// Generate a 6-digit verification code.
pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

fn is_well_formed_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

//=========================================================================================
// Verification Protocol
//=========================================================================================

pub struct VerificationService {
    store: Arc<PendingVerificationStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Arc<dyn CodeDispatcher>,
    clock: Arc<dyn Clock>,
    code_ttl: Duration,
}

impl VerificationService {
    pub fn new(
        store: Arc<PendingVerificationStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Arc<dyn CodeDispatcher>,
        clock: Arc<dyn Clock>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
            clock,
            code_ttl,
        }
    }

    pub fn store(&self) -> &Arc<PendingVerificationStore> {
        &self.store
    }

    /// Starts a signup: holds the user's details and sends them a fresh code.
    ///
    /// If the code cannot be delivered the pending record is discarded.
    pub async fn send_code(
        &self,
        contact: &ContactKey,
        user_data: PendingUserData,
    ) -> CoreResult<()> {
        if user_data.first_name.trim().is_empty() {
            return Err(CoreError::InvalidInput("First name is required".to_string()));
        }
        self.ensure_unclaimed(contact).await?;

        let code = generate_code();
        let first_name = user_data.first_name.clone();
        let expires_at = self.clock.now() + self.code_ttl;
        self.store.put(contact, user_data, code.clone(), expires_at).await;

        if let Err(e) = self.dispatcher.send_code(contact, &code, &first_name).await {
            warn!(%contact, error = %e, "Code delivery failed; discarding pending signup");
            self.store.remove(contact).await;
            return Err(CoreError::DispatchFailed(e.to_string()));
        }
        Ok(())
    }

    /// Checks a submitted code and, on a match, creates the account.
    ///
    /// A wrong code leaves the pending record in place so the user can retype it.
    pub async fn verify_code(&self, contact: &ContactKey, submitted: &str) -> CoreResult<User> {
        let submitted = submitted.trim();
        if !is_well_formed_code(submitted) {
            return Err(CoreError::InvalidInput(
                "Verification code must be 6 digits".to_string(),
            ));
        }

        let pending = self
            .store
            .get(contact)
            .await
            .ok_or(CoreError::SessionExpired)?;

        if pending.is_expired(self.clock.now()) {
            self.store.remove(contact).await;
            return Err(CoreError::CodeExpired);
        }
        if pending.otp != submitted {
            return Err(CoreError::InvalidCode);
        }

        if let Err(e) = self.ensure_unclaimed(contact).await {
            self.store.remove(contact).await;
            return Err(e);
        }

        let data = pending.user_data;
        let user = self
            .users
            .create_account(NewAccount {
                first_name: data.first_name,
                last_name: data.last_name,
                contact: contact.clone(),
                password_hash: data.password_hash,
                user_type: data.user_type,
            })
            .await?;
        self.store.remove(contact).await;

        info!(%contact, user_id = %user.user_id, "Contact verified; account created");
        Ok(user)
    }

    /// Issues a new code for an in-flight signup, replacing the old one.
    pub async fn resend_code(&self, contact: &ContactKey) -> CoreResult<()> {
        let pending = self
            .store
            .get(contact)
            .await
            .ok_or(CoreError::SessionExpired)?;

        let code = generate_code();
        let first_name = pending.user_data.first_name.clone();
        let expires_at = self.clock.now() + self.code_ttl;
        self.store
            .put(contact, pending.user_data, code.clone(), expires_at)
            .await;

        self.dispatcher
            .send_code(contact, &code, &first_name)
            .await
            .map_err(|e| CoreError::DispatchFailed(e.to_string()))
    }

    async fn ensure_unclaimed(&self, contact: &ContactKey) -> CoreResult<()> {
        match self.users.find_user_by_contact(contact).await? {
            Some(existing) if existing.is_verified_for(contact) => {
                Err(CoreError::AlreadyRegistered(contact.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::UserType;
    use crate::testing::{MemoryUsers, RecordingDispatcher};
    use chrono::TimeZone;

    struct Harness {
        service: VerificationService,
        store: Arc<PendingVerificationStore>,
        users: Arc<MemoryUsers>,
        dispatcher: Arc<RecordingDispatcher>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let store = Arc::new(PendingVerificationStore::new(clock.clone()));
        let users = Arc::new(MemoryUsers::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = VerificationService::new(
            store.clone(),
            users.clone(),
            dispatcher.clone(),
            clock.clone(),
            Duration::seconds(DEFAULT_CODE_TTL_SECS),
        );
        Harness {
            service,
            store,
            users,
            dispatcher,
            clock,
        }
    }

    fn signup_data() -> PendingUserData {
        PendingUserData {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            user_type: UserType::Guest,
        }
    }

    fn email() -> ContactKey {
        ContactKey::Email("a@x.com".to_string())
    }

    #[tokio::test]
    async fn put_then_get_returns_same_code() {
        let h = harness();
        let expires = h.clock.now() + Duration::minutes(5);
        h.store.put(&email(), signup_data(), "123456".to_string(), expires).await;

        let record = h.store.get(&email()).await.unwrap();
        assert_eq!(record.otp, "123456");
        assert_eq!(record.expires_at, expires);
    }

    #[tokio::test]
    async fn put_overwrites_previous_record() {
        let h = harness();
        let expires = h.clock.now() + Duration::minutes(5);
        h.store.put(&email(), signup_data(), "111111".to_string(), expires).await;
        h.store.put(&email(), signup_data(), "222222".to_string(), expires).await;

        assert_eq!(h.store.len().await, 1);
        assert_eq!(h.store.get(&email()).await.unwrap().otp, "222222");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let h = harness();
        h.store.remove(&email()).await;
        h.store
            .put(&email(), signup_data(), "123456".to_string(), h.clock.now())
            .await;
        h.store.remove(&email()).await;
        h.store.remove(&email()).await;
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_records() {
        let h = harness();
        let now = h.clock.now();
        let stale = ContactKey::Email("old@x.com".to_string());
        h.store
            .put(&stale, signup_data(), "111111".to_string(), now - Duration::seconds(1))
            .await;
        h.store
            .put(&email(), signup_data(), "222222".to_string(), now + Duration::minutes(5))
            .await;

        assert_eq!(h.store.sweep().await, 1);
        assert!(h.store.get(&stale).await.is_none());
        assert!(h.store.get(&email()).await.is_some());
    }

    #[tokio::test]
    async fn expired_record_remains_visible_until_swept() {
        let h = harness();
        h.store
            .put(&email(), signup_data(), "123456".to_string(), h.clock.now())
            .await;
        h.clock.advance(Duration::minutes(1));
        assert!(h.store.get(&email()).await.is_some());
    }

    #[tokio::test]
    async fn wrong_code_keeps_record_then_correct_code_succeeds_once() {
        let h = harness();
        let expires = h.clock.now() + Duration::minutes(5);
        h.store.put(&email(), signup_data(), "123456".to_string(), expires).await;

        let err = h.service.verify_code(&email(), "000000").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCode));
        assert!(h.store.get(&email()).await.is_some());

        let user = h.service.verify_code(&email(), "123456").await.unwrap();
        assert_eq!(user.first_name, "Grace");
        assert!(user.email_verified);
        assert!(h.store.get(&email()).await.is_none());

        let err = h.service.verify_code(&email(), "123456").await.unwrap_err();
        assert!(matches!(err, CoreError::SessionExpired));
        assert_eq!(h.users.count(), 1);
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_removed() {
        let h = harness();
        h.service.send_code(&email(), signup_data()).await.unwrap();
        let code = h.dispatcher.last_code().unwrap();

        h.clock.advance(Duration::minutes(6));
        let err = h.service.verify_code(&email(), &code).await.unwrap_err();
        assert!(matches!(err, CoreError::CodeExpired));
        assert!(h.store.get(&email()).await.is_none());
    }

    #[tokio::test]
    async fn malformed_code_is_invalid_input() {
        let h = harness();
        h.service.send_code(&email(), signup_data()).await.unwrap();
        for bad in ["12345", "abcdef", "1234567", ""] {
            let err = h.service.verify_code(&email(), bad).await.unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)));
        }
        assert!(h.store.get(&email()).await.is_some());
    }

    #[tokio::test]
    async fn send_stores_and_dispatches_code() {
        let h = harness();
        h.service.send_code(&email(), signup_data()).await.unwrap();

        let record = h.store.get(&email()).await.unwrap();
        assert_eq!(Some(record.otp.clone()), h.dispatcher.last_code());
        assert_eq!(record.expires_at, h.clock.now() + Duration::minutes(5));
        assert!(is_well_formed_code(&record.otp));
    }

    #[tokio::test]
    async fn failed_dispatch_discards_pending_signup() {
        let h = harness();
        h.dispatcher.fail(true);
        let err = h.service.send_code(&email(), signup_data()).await.unwrap_err();
        assert!(matches!(err, CoreError::DispatchFailed(_)));
        assert!(h.store.get(&email()).await.is_none());
    }

    #[tokio::test]
    async fn send_rejects_verified_contact() {
        let h = harness();
        h.users.add_user("Existing", "User", "a@x.com");
        let err = h.service.send_code(&email(), signup_data()).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyRegistered(_)));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn resend_requires_pending_session() {
        let h = harness();
        let err = h.service.resend_code(&email()).await.unwrap_err();
        assert!(matches!(err, CoreError::SessionExpired));
    }

    #[tokio::test]
    async fn resend_refreshes_code_and_expiry() {
        let h = harness();
        h.service.send_code(&email(), signup_data()).await.unwrap();
        let first = h.store.get(&email()).await.unwrap();

        h.clock.advance(Duration::minutes(4));
        h.service.resend_code(&email()).await.unwrap();
        let second = h.store.get(&email()).await.unwrap();

        assert_eq!(second.user_data, first.user_data);
        assert_eq!(second.expires_at, h.clock.now() + Duration::minutes(5));
        assert_eq!(h.dispatcher.sent.lock().unwrap().len(), 2);

        h.clock.advance(Duration::minutes(3));
        let user = h.service.verify_code(&email(), &second.otp).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn phone_signup_creates_phone_verified_account() {
        let h = harness();
        let phone = phone_contact("+15550001234").unwrap();
        h.service.send_code(&phone, signup_data()).await.unwrap();
        let code = h.dispatcher.last_code().unwrap();

        let user = h.service.verify_code(&phone, &code).await.unwrap();
        assert!(user.phone_verified);
        assert_eq!(user.phone_number.as_deref(), Some("+15550001234"));
    }

    #[test]
    fn contact_validation() {
        assert!(email_contact("a@x.com").is_ok());
        assert!(email_contact("not-an-email").is_err());
        assert!(email_contact("@x.com").is_err());
        assert!(phone_contact("12345").is_err());
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            assert!(is_well_formed_code(&generate_code()));
        }
    }
}
