//! crates/study_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases, clocks
//! or message gateways.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthSession, ContactKey, NewAccount, Notebook, NotebookUpdate, UsageRecord, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    // --- User Records ---
    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    /// Replaces the user's usage record in a single write.
    async fn save_usage(&self, user_id: Uuid, usage: &UsageRecord) -> PortResult<()>;

    async fn find_user_by_contact(&self, contact: &ContactKey) -> PortResult<Option<User>>;

    /// Persists a verified account. An unverified account holding the same
    /// contact is replaced.
    async fn create_account(&self, account: NewAccount) -> PortResult<User>;

    // --- Auth Methods ---
    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Password Reset ---
    /// Records the digest of a reset token for the user, replacing any earlier one.
    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// The user holding a reset token with this digest that is still valid at `now`.
    async fn find_reset_token(&self, token_hash: &str, now: DateTime<Utc>)
        -> PortResult<Option<Uuid>>;

    /// Sets a new password for the holder of a valid token and clears the token
    /// in the same write. `None` if no valid token has this digest.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>>;
}

#[async_trait]
pub trait NotebookStore: Send + Sync {
    async fn insert_notebook(&self, notebook: &Notebook) -> PortResult<()>;

    async fn get_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<Notebook>;

    /// Newest first. `featured_only` restricts the listing to featured notebooks.
    async fn list_notebooks(
        &self,
        owner: Uuid,
        featured_only: bool,
        limit: usize,
    ) -> PortResult<Vec<Notebook>>;

    /// Case-insensitive literal match against title, summary, category or any tag.
    /// Newest first.
    async fn search_notebooks(
        &self,
        owner: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Notebook>>;

    async fn update_notebook(
        &self,
        owner: Uuid,
        notebook_id: Uuid,
        update: &NotebookUpdate,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Notebook>;

    async fn delete_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait CodeDispatcher: Send + Sync {
    /// Delivers a one-time code to the given contact address.
    async fn send_code(&self, contact: &ContactKey, code: &str, first_name: &str)
        -> PortResult<()>;

    /// Delivers a password reset link.
    async fn send_reset_link(&self, contact: &ContactKey, link: &str, first_name: &str)
        -> PortResult<()>;
}
