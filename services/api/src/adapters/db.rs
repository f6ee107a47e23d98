//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `UserStore` and `NotebookStore` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use study_core::domain::{
    AuthSession, ContactKey, NewAccount, Notebook, NotebookUpdate, UsageRecord, User,
    UserCredentials,
};
use study_core::ports::{NotebookStore, PortError, PortResult, UserStore};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_db(value: u64) -> PortResult<i64> {
    i64::try_from(value).map_err(|_| PortError::Unexpected(format!("counter {value} overflows")))
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn parse_enum<T: std::str::FromStr<Err = String>>(raw: &str) -> PortResult<T> {
    raw.parse::<T>().map_err(PortError::Unexpected)
}

/// Escapes LIKE metacharacters so user input is matched literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "u.user_id, u.first_name, u.last_name, u.email, u.phone_number, \
     u.user_type, u.auth_method, u.email_verified, u.phone_verified, \
     s.total_minutes, s.weekly_minutes, s.week_start, s.activity_dates, s.current_streak, \
     s.quizzes_completed, s.materials_reviewed, s.ai_conversations, s.last_activity_at";

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone_number: Option<String>,
    user_type: String,
    auth_method: String,
    email_verified: bool,
    phone_verified: bool,
    // Columns from the LEFT JOIN on user_stats; all NULL until first touch.
    total_minutes: Option<i64>,
    weekly_minutes: Option<i64>,
    week_start: Option<DateTime<Utc>>,
    activity_dates: Option<Vec<NaiveDate>>,
    current_streak: Option<i32>,
    quizzes_completed: Option<i64>,
    materials_reviewed: Option<i64>,
    ai_conversations: Option<i64>,
    last_activity_at: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let usage = match (self.week_start, self.last_activity_at) {
            (Some(week_start), Some(last_activity_at)) => Some(UsageRecord {
                total_minutes: from_db(self.total_minutes.unwrap_or(0)),
                weekly_minutes: from_db(self.weekly_minutes.unwrap_or(0)),
                week_start,
                activity_dates: self.activity_dates.unwrap_or_default(),
                current_streak: u32::try_from(self.current_streak.unwrap_or(0)).unwrap_or(0),
                quizzes_completed: from_db(self.quizzes_completed.unwrap_or(0)),
                materials_reviewed: from_db(self.materials_reviewed.unwrap_or(0)),
                ai_conversations: from_db(self.ai_conversations.unwrap_or(0)),
                last_activity_at,
            }),
            _ => None,
        };
        Ok(User {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            user_type: parse_enum(&self.user_type)?,
            auth_method: parse_enum(&self.auth_method)?,
            email_verified: self.email_verified,
            phone_verified: self.phone_verified,
            usage,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.password_hash,
        }
    }
}

const NOTEBOOK_COLUMNS: &str = "id, user_id, title, original_text, summary, summary_length, \
     category, tags, is_featured, source_type, source_file_name, created_at, updated_at";

#[derive(FromRow)]
struct NotebookRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    original_text: String,
    summary: String,
    summary_length: String,
    category: String,
    tags: Vec<String>,
    is_featured: bool,
    source_type: String,
    source_file_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl NotebookRecord {
    fn to_domain(self) -> PortResult<Notebook> {
        Ok(Notebook {
            id: self.id,
            owner: self.user_id,
            title: self.title,
            original_text: self.original_text,
            summary: self.summary,
            summary_length: parse_enum(&self.summary_length)?,
            category: self.category,
            tags: self.tags,
            is_featured: self.is_featured,
            source_type: parse_enum(&self.source_type)?,
            source_file_name: self.source_file_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn notebooks_to_domain(records: Vec<NotebookRecord>) -> PortResult<Vec<Notebook>> {
    records.into_iter().map(NotebookRecord::to_domain).collect()
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN user_stats s ON s.user_id = u.user_id \
             WHERE u.user_id = $1"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("User {} not found", user_id)))?;
        record.to_domain()
    }

    async fn save_usage(&self, user_id: Uuid, usage: &UsageRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_stats (user_id, total_minutes, weekly_minutes, week_start, \
             activity_dates, current_streak, quizzes_completed, materials_reviewed, \
             ai_conversations, last_activity_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id) DO UPDATE SET \
             total_minutes = EXCLUDED.total_minutes, weekly_minutes = EXCLUDED.weekly_minutes, \
             week_start = EXCLUDED.week_start, activity_dates = EXCLUDED.activity_dates, \
             current_streak = EXCLUDED.current_streak, \
             quizzes_completed = EXCLUDED.quizzes_completed, \
             materials_reviewed = EXCLUDED.materials_reviewed, \
             ai_conversations = EXCLUDED.ai_conversations, \
             last_activity_at = EXCLUDED.last_activity_at",
        )
        .bind(user_id)
        .bind(to_db(usage.total_minutes)?)
        .bind(to_db(usage.weekly_minutes)?)
        .bind(usage.week_start)
        .bind(&usage.activity_dates)
        .bind(i32::try_from(usage.current_streak).unwrap_or(i32::MAX))
        .bind(to_db(usage.quizzes_completed)?)
        .bind(to_db(usage.materials_reviewed)?)
        .bind(to_db(usage.ai_conversations)?)
        .bind(usage.last_activity_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_user_by_contact(&self, contact: &ContactKey) -> PortResult<Option<User>> {
        let column = match contact {
            ContactKey::Email(_) => "email",
            ContactKey::Phone(_) => "phone_number",
        };
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN user_stats s ON s.user_id = u.user_id \
             WHERE u.{column} = $1"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(contact.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn create_account(&self, account: NewAccount) -> PortResult<User> {
        let (email, phone_number) = match &account.contact {
            ContactKey::Email(e) => (Some(e.as_str()), None),
            ContactKey::Phone(p) => (None, Some(p.as_str())),
        };
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // An earlier, never-verified signup for the same contact gives way.
        let stale = match &account.contact {
            ContactKey::Email(_) => "DELETE FROM users WHERE email = $1 AND email_verified = FALSE",
            ContactKey::Phone(_) => {
                "DELETE FROM users WHERE phone_number = $1 AND phone_verified = FALSE"
            }
        };
        sqlx::query(stale)
            .bind(account.contact.as_str())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (user_id, first_name, last_name, email, phone_number, \
             password_hash, user_type, auth_method, email_verified, phone_verified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user_id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(email)
        .bind(phone_number)
        .bind(&account.password_hash)
        .bind(account.user_type.as_str())
        .bind(account.contact.auth_method().as_str())
        .bind(email.is_some())
        .bind(phone_number.is_some())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        self.get_user(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, password_hash FROM users \
             WHERE email = $1 AND password_hash IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn find_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM users \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE users SET password_hash = $2, \
             reset_token_hash = NULL, reset_token_expires_at = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $3 \
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }
}

//=========================================================================================
// `NotebookStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotebookStore for DbAdapter {
    async fn insert_notebook(&self, notebook: &Notebook) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO notebooks (id, user_id, title, original_text, summary, summary_length, \
             category, tags, is_featured, source_type, source_file_name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(notebook.id)
        .bind(notebook.owner)
        .bind(&notebook.title)
        .bind(&notebook.original_text)
        .bind(&notebook.summary)
        .bind(notebook.summary_length.as_str())
        .bind(&notebook.category)
        .bind(&notebook.tags)
        .bind(notebook.is_featured)
        .bind(notebook.source_type.as_str())
        .bind(&notebook.source_file_name)
        .bind(notebook.created_at)
        .bind(notebook.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<Notebook> {
        let sql = format!("SELECT {NOTEBOOK_COLUMNS} FROM notebooks WHERE id = $1 AND user_id = $2");
        let record = sqlx::query_as::<_, NotebookRecord>(&sql)
            .bind(notebook_id)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Notebook {} not found", notebook_id)))?;
        record.to_domain()
    }

    async fn list_notebooks(
        &self,
        owner: Uuid,
        featured_only: bool,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        let sql = format!(
            "SELECT {NOTEBOOK_COLUMNS} FROM notebooks \
             WHERE user_id = $1 AND ($2 = FALSE OR is_featured) \
             ORDER BY created_at DESC LIMIT $3"
        );
        let records = sqlx::query_as::<_, NotebookRecord>(&sql)
            .bind(owner)
            .bind(featured_only)
            .bind(to_db(limit as u64)?)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        notebooks_to_domain(records)
    }

    async fn search_notebooks(
        &self,
        owner: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Notebook>> {
        let sql = format!(
            "SELECT {NOTEBOOK_COLUMNS} FROM notebooks \
             WHERE user_id = $1 AND ( \
                 title ILIKE $2 ESCAPE '\\' OR summary ILIKE $2 ESCAPE '\\' \
                 OR category ILIKE $2 ESCAPE '\\' \
                 OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE $2 ESCAPE '\\')) \
             ORDER BY created_at DESC LIMIT $3"
        );
        let records = sqlx::query_as::<_, NotebookRecord>(&sql)
            .bind(owner)
            .bind(like_pattern(query))
            .bind(to_db(limit as u64)?)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        notebooks_to_domain(records)
    }

    async fn update_notebook(
        &self,
        owner: Uuid,
        notebook_id: Uuid,
        update: &NotebookUpdate,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Notebook> {
        let sql = format!(
            "UPDATE notebooks SET title = COALESCE($3, title), summary = COALESCE($4, summary), \
             category = COALESCE($5, category), tags = COALESCE($6, tags), \
             is_featured = COALESCE($7, is_featured), updated_at = $8 \
             WHERE id = $1 AND user_id = $2 RETURNING {NOTEBOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, NotebookRecord>(&sql)
            .bind(notebook_id)
            .bind(owner)
            .bind(&update.title)
            .bind(&update.summary)
            .bind(&update.category)
            .bind(&update.tags)
            .bind(update.is_featured)
            .bind(updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Notebook {} not found", notebook_id)))?;
        record.to_domain()
    }

    async fn delete_notebook(&self, owner: Uuid, notebook_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM notebooks WHERE id = $1 AND user_id = $2")
            .bind(notebook_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Notebook {} not found", notebook_id)));
        }
        Ok(())
    }
}
