//! crates/study_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of distinct activity days kept on a usage record.
pub const MAX_ACTIVITY_DAYS: usize = 30;

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserType {
    #[default]
    Guest,
    Host,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Host => "host",
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "host" => Ok(Self::Host),
            other => Err(format!("unknown user type '{other}'")),
        }
    }
}

/// Which contact channel an account was registered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Email,
    Phone,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            other => Err(format!("unknown auth method '{other}'")),
        }
    }
}

/// A contact address that identifies a pending signup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContactKey {
    Email(String),
    Phone(String),
}

impl ContactKey {
    /// The raw key under which pending verifications are stored.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(v) | Self::Phone(v) => v,
        }
    }

    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Email(_) => AuthMethod::Email,
            Self::Phone(_) => AuthMethod::Phone,
        }
    }
}

impl fmt::Display for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub user_type: UserType,
    pub auth_method: AuthMethod,
    pub email_verified: bool,
    pub phone_verified: bool,
    /// Absent until the first stats read or write for this user.
    pub usage: Option<UsageRecord>,
}

impl User {
    /// Whether this account has proven ownership of the given contact.
    pub fn is_verified_for(&self, key: &ContactKey) -> bool {
        match key {
            ContactKey::Email(email) => {
                self.email_verified && self.email.as_deref() == Some(email.as_str())
            }
            ContactKey::Phone(phone) => {
                self.phone_verified && self.phone_number.as_deref() == Some(phone.as_str())
            }
        }
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Everything needed to persist a freshly verified account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub contact: ContactKey,
    pub password_hash: String,
    pub user_type: UserType,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Engagement
//=========================================================================================

/// Per-user engagement counters, embedded in the user record.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub total_minutes: u64,
    pub weekly_minutes: u64,
    pub week_start: DateTime<Utc>,
    /// Distinct calendar days with activity, oldest first.
    pub activity_dates: Vec<NaiveDate>,
    /// Cached projection of `activity_dates`; recomputed on every read.
    pub current_streak: u32,
    pub quizzes_completed: u64,
    pub materials_reviewed: u64,
    pub ai_conversations: u64,
    pub last_activity_at: DateTime<Utc>,
}

impl UsageRecord {
    /// A zero-valued record whose week starts now.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_minutes: 0,
            weekly_minutes: 0,
            week_start: now,
            activity_dates: Vec::new(),
            current_streak: 0,
            quizzes_completed: 0,
            materials_reviewed: 0,
            ai_conversations: 0,
            last_activity_at: now,
        }
    }
}

/// The figures reported to a user about their own engagement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub weekly_time_hours: f64,
    pub current_streak: u32,
    pub quizzes_completed: u64,
    pub materials_reviewed: u64,
    pub ai_conversations: u64,
    pub total_time_hours: f64,
}

/// A stats snapshot together with the identity of the user it belongs to.
#[derive(Debug, Clone)]
pub struct UserStats {
    pub stats: StatsSnapshot,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

//=========================================================================================
// Verification
//=========================================================================================

/// The signup fields held while a contact address is being verified.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUserData {
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub user_type: UserType,
}

/// A provisional registration waiting for its one-time code.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVerification {
    pub user_data: PendingUserData,
    pub auth_method: AuthMethod,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingVerification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

//=========================================================================================
// Notebooks
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown summary length '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    #[default]
    Text,
    Pdf,
    File,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::File => "file",
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "file" => Ok(Self::File),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

/// A summarised study document owned by one user.
#[derive(Debug, Clone)]
pub struct Notebook {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub summary_length: SummaryLength,
    pub category: String,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub source_type: SourceType,
    pub source_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a notebook is first saved.
#[derive(Debug, Clone, Default)]
pub struct NewNotebook {
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub summary_length: Option<SummaryLength>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub source_type: Option<SourceType>,
    pub source_file_name: Option<String>,
}

/// Owner-editable notebook fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct NotebookUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}
