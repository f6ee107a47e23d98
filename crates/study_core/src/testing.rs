//! In-process fakes for the core's unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    AuthMethod, AuthSession, ContactKey, NewAccount, Notebook, NotebookUpdate, UsageRecord, User,
    UserCredentials, UserType,
};
use crate::notebooks::matches_query;
use crate::ports::{CodeDispatcher, NotebookStore, PortError, PortResult, UserStore};

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
    passwords: Mutex<HashMap<Uuid, String>>,
    reset_tokens: Mutex<HashMap<Uuid, (String, DateTime<Utc>)>>,
    fail_writes: AtomicBool,
}

impl MemoryUsers {
    pub fn add_user(&self, first: &str, last: &str, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.users.lock().unwrap().insert(
            user_id,
            User {
                user_id,
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: Some(email.to_string()),
                phone_number: None,
                user_type: UserType::Guest,
                auth_method: AuthMethod::Email,
                email_verified: true,
                phone_verified: false,
                usage: None,
            },
        );
        user_id
    }

    pub fn usage_of(&self, user_id: Uuid) -> Option<UsageRecord> {
        self.users.lock().unwrap().get(&user_id)?.usage.clone()
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn password_of(&self, user_id: Uuid) -> Option<String> {
        self.passwords.lock().unwrap().get(&user_id).cloned()
    }

    pub fn reset_token_of(&self, user_id: Uuid) -> Option<(String, DateTime<Utc>)> {
        self.reset_tokens.lock().unwrap().get(&user_id).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        // Yield so concurrent callers interleave between read and write.
        tokio::task::yield_now().await;
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))
    }

    async fn save_usage(&self, user_id: Uuid, usage: &UsageRecord) -> PortResult<()> {
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))?;
        user.usage = Some(usage.clone());
        Ok(())
    }

    async fn find_user_by_contact(&self, contact: &ContactKey) -> PortResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| match contact {
                ContactKey::Email(e) => u.email.as_deref() == Some(e.as_str()),
                ContactKey::Phone(p) => u.phone_number.as_deref() == Some(p.as_str()),
            })
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> PortResult<User> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
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
        self.users.lock().unwrap().insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        Err(PortError::NotFound(format!("No credentials for {email}")))
    }

    async fn create_auth_session(&self, _session: AuthSession) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        Ok(())
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
        self.reset_tokens
            .lock()
            .unwrap()
            .insert(user_id, (token_hash.to_string(), expires_at));
        Ok(())
    }

    async fn find_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        Ok(self
            .reset_tokens
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (hash, expires_at))| hash == token_hash && *expires_at > now)
            .map(|(user_id, _)| *user_id))
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        let mut tokens = self.reset_tokens.lock().unwrap();
        let Some(user_id) = tokens
            .iter()
            .find(|(_, (hash, expires_at))| hash == token_hash && *expires_at > now)
            .map(|(user_id, _)| *user_id)
        else {
            return Ok(None);
        };
        tokens.remove(&user_id);
        self.passwords
            .lock()
            .unwrap()
            .insert(user_id, password_hash.to_string());
        Ok(Some(user_id))
    }
}

/// Records every code and link it is asked to send.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<(String, String)>>,
    pub links: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }

    pub fn last_link(&self) -> Option<String> {
        self.links.lock().unwrap().last().map(|(_, link)| link.clone())
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CodeDispatcher for RecordingDispatcher {
    async fn send_code(
        &self,
        contact: &ContactKey,
        code: &str,
        _first_name: &str,
    ) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("gateway down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((contact.to_string(), code.to_string()));
        Ok(())
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        _first_name: &str,
    ) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("gateway down".to_string()));
        }
        self.links
            .lock()
            .unwrap()
            .push((contact.to_string(), link.to_string()));
        Ok(())
    }
}

/// Notebooks kept in insertion order.
#[derive(Default)]
pub struct MemoryNotebooks {
    notebooks: Mutex<Vec<Notebook>>,
}

impl MemoryNotebooks {
    pub fn count(&self) -> usize {
        self.notebooks.lock().unwrap().len()
    }

    fn owned(&self, owner: Uuid, keep: impl Fn(&Notebook) -> bool, limit: usize) -> Vec<Notebook> {
        let mut found: Vec<Notebook> = self
            .notebooks
            .lock()
            .unwrap()
            .iter()
            .filter(|nb| nb.owner == owner && keep(nb))
            .cloned()
            .collect();
        found.reverse();
        found.truncate(limit);
        found
    }
}

fn missing(notebook_id: Uuid) -> PortError {
    PortError::NotFound(format!("Notebook {notebook_id} not found"))
}

#[async_trait]
impl NotebookStore for MemoryNotebooks {
    async fn insert_notebook(&self, notebook: &Notebook) -> PortResult<()> {
        self.notebooks.lock().unwrap().push(notebook.clone());
        Ok(())
    }

    async fn get_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<Notebook> {
        self.notebooks
            .lock()
            .unwrap()
            .iter()
            .find(|nb| nb.owner == owner && nb.id == notebook_id)
            .cloned()
            .ok_or_else(|| missing(notebook_id))
    }

    async fn list_notebooks(
        &self,
        owner: Uuid,
        featured_only: bool,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        Ok(self.owned(owner, |nb| !featured_only || nb.is_featured, limit))
    }

    async fn search_notebooks(
        &self,
        owner: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        Ok(self.owned(owner, |nb| matches_query(nb, query), limit))
    }

    async fn update_notebook(
        &self,
        owner: Uuid,
        notebook_id: Uuid,
        update: &NotebookUpdate,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Notebook> {
        let mut notebooks = self.notebooks.lock().unwrap();
        let nb = notebooks
            .iter_mut()
            .find(|nb| nb.owner == owner && nb.id == notebook_id)
            .ok_or_else(|| missing(notebook_id))?;
        if let Some(featured) = update.is_featured {
            nb.is_featured = featured;
        }
        if let Some(title) = &update.title {
            nb.title = title.clone();
        }
        nb.updated_at = updated_at;
        Ok(nb.clone())
    }

    async fn delete_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<()> {
        let mut notebooks = self.notebooks.lock().unwrap();
        let before = notebooks.len();
        notebooks.retain(|nb| !(nb.owner == owner && nb.id == notebook_id));
        if notebooks.len() == before {
            return Err(missing(notebook_id));
        }
        Ok(())
    }
}
