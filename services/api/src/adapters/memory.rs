//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the storage ports. Used when no database is
//! configured and by the integration tests. Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use study_core::domain::{
    AuthSession, ContactKey, NewAccount, Notebook, NotebookUpdate, UsageRecord, User,
    UserCredentials,
};
use study_core::notebooks::matches_query;
use study_core::ports::{NotebookStore, PortError, PortResult, UserStore};
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredUser {
    user: User,
    password_hash: Option<String>,
    reset_token: Option<ResetToken>,
}

struct ResetToken {
    hash: String,
    expires_at: DateTime<Utc>,
}

impl StoredUser {
    fn holds_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        self.reset_token
            .as_ref()
            .is_some_and(|t| t.hash == token_hash && t.expires_at > now)
    }
}

#[derive(Default)]
pub struct MemoryAdapter {
    users: RwLock<HashMap<Uuid, StoredUser>>,
    sessions: RwLock<HashMap<String, AuthSession>>,
    notebooks: RwLock<HashMap<Uuid, Notebook>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn holds_contact(user: &User, contact: &ContactKey) -> bool {
    match contact {
        ContactKey::Email(e) => user.email.as_deref() == Some(e.as_str()),
        ContactKey::Phone(p) => user.phone_number.as_deref() == Some(p.as_str()),
    }
}

fn notebook_not_found(notebook_id: Uuid) -> PortError {
    PortError::NotFound(format!("Notebook {} not found", notebook_id))
}

/// Newest first, capped at `limit`.
fn newest_first(mut notebooks: Vec<Notebook>, limit: usize) -> Vec<Notebook> {
    notebooks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notebooks.truncate(limit);
    notebooks
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for MemoryAdapter {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn save_usage(&self, user_id: Uuid, usage: &UsageRecord) -> PortResult<()> {
        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.user.usage = Some(usage.clone());
        Ok(())
    }

    async fn find_user_by_contact(&self, contact: &ContactKey) -> PortResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|stored| holds_contact(&stored.user, contact))
            .map(|stored| stored.user.clone()))
    }

    async fn create_account(&self, account: NewAccount) -> PortResult<User> {
        let mut users = self.users.write().await;
        users.retain(|_, stored| {
            !(holds_contact(&stored.user, &account.contact)
                && !stored.user.is_verified_for(&account.contact))
        });

        let (email, phone_number) = match &account.contact {
            ContactKey::Email(e) => (Some(e.clone()), None),
            ContactKey::Phone(p) => (None, Some(p.clone())),
        };
        let user = User {
            user_id: Uuid::new_v4(),
            first_name: account.first_name,
            last_name: account.last_name,
            email_verified: email.is_some(),
            phone_verified: phone_number.is_some(),
            email,
            phone_number,
            user_type: account.user_type,
            auth_method: account.contact.auth_method(),
            usage: None,
        };
        users.insert(
            user.user_id,
            StoredUser {
                user: user.clone(),
                password_hash: Some(account.password_hash),
                reset_token: None,
            },
        );
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .read()
            .await
            .values()
            .find_map(|stored| match (&stored.user.email, &stored.password_hash) {
                (Some(e), Some(hash)) if e == email => Some(UserCredentials {
                    user_id: stored.user.user_id,
                    email: e.clone(),
                    hashed_password: hash.clone(),
                }),
                _ => None,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            Some(_) => {
                sessions.remove(session_id);
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.reset_token = Some(ResetToken {
            hash: token_hash.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn find_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|stored| stored.holds_reset_token(token_hash, now))
            .map(|stored| stored.user.user_id))
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        let mut users = self.users.write().await;
        let Some(stored) = users
            .values_mut()
            .find(|stored| stored.holds_reset_token(token_hash, now))
        else {
            return Ok(None);
        };
        stored.password_hash = Some(password_hash.to_string());
        stored.reset_token = None;
        Ok(Some(stored.user.user_id))
    }
}

//=========================================================================================
// `NotebookStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotebookStore for MemoryAdapter {
    async fn insert_notebook(&self, notebook: &Notebook) -> PortResult<()> {
        self.notebooks
            .write()
            .await
            .insert(notebook.id, notebook.clone());
        Ok(())
    }

    async fn get_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<Notebook> {
        self.notebooks
            .read()
            .await
            .get(&notebook_id)
            .filter(|nb| nb.owner == owner)
            .cloned()
            .ok_or_else(|| notebook_not_found(notebook_id))
    }

    async fn list_notebooks(
        &self,
        owner: Uuid,
        featured_only: bool,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        let owned = self
            .notebooks
            .read()
            .await
            .values()
            .filter(|nb| nb.owner == owner && (!featured_only || nb.is_featured))
            .cloned()
            .collect();
        Ok(newest_first(owned, limit))
    }

    async fn search_notebooks(
        &self,
        owner: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        let found = self
            .notebooks
            .read()
            .await
            .values()
            .filter(|nb| nb.owner == owner && matches_query(nb, query))
            .cloned()
            .collect();
        Ok(newest_first(found, limit))
    }

    async fn update_notebook(
        &self,
        owner: Uuid,
        notebook_id: Uuid,
        update: &NotebookUpdate,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Notebook> {
        let mut notebooks = self.notebooks.write().await;
        let notebook = notebooks
            .get_mut(&notebook_id)
            .filter(|nb| nb.owner == owner)
            .ok_or_else(|| notebook_not_found(notebook_id))?;

        if let Some(title) = &update.title {
            notebook.title = title.clone();
        }
        if let Some(summary) = &update.summary {
            notebook.summary = summary.clone();
        }
        if let Some(category) = &update.category {
            notebook.category = category.clone();
        }
        if let Some(tags) = &update.tags {
            notebook.tags = tags.clone();
        }
        if let Some(is_featured) = update.is_featured {
            notebook.is_featured = is_featured;
        }
        notebook.updated_at = updated_at;
        Ok(notebook.clone())
    }

    async fn delete_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<()> {
        let mut notebooks = self.notebooks.write().await;
        match notebooks.get(&notebook_id) {
            Some(nb) if nb.owner == owner => {
                notebooks.remove(&notebook_id);
                Ok(())
            }
            _ => Err(notebook_not_found(notebook_id)),
        }
    }
}
