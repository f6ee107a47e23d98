//! crates/study_core/src/tracker.rs
//!
//! The streak/usage tracker. Each operation is one read of the user record
//! followed by at most one write of its usage record, so a failed write leaves
//! nothing partially applied.

use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{StatsSnapshot, UsageRecord, User, UserStats};
use crate::error::{CoreError, CoreResult};
use crate::ports::UserStore;
use crate::streak::{current_streak, mark_active_day, minutes_to_hours};

/// Length of the rolling usage window, in days.
pub const WEEK_DAYS: i64 = 7;

/// How long an idle per-user lock is kept around.
const LOCK_IDLE: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// The counters that can be bumped by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityCounter {
    Quiz,
    Material,
    Conversation,
}

impl ActivityCounter {
    /// Conversations bump their counter without marking the day as active.
    fn marks_active_day(self) -> bool {
        !matches!(self, Self::Conversation)
    }

    fn bump(self, usage: &mut UsageRecord) -> u64 {
        let counter = match self {
            Self::Quiz => &mut usage.quizzes_completed,
            Self::Material => &mut usage.materials_reviewed,
            Self::Conversation => &mut usage.ai_conversations,
        };
        *counter += 1;
        *counter
    }
}

/// The reply to a `track_time` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTime {
    pub weekly_time_hours: f64,
    pub current_streak: u32,
}

pub struct UsageTracker {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    // Serialises read-modify-write cycles for the same user within this process.
    locks: Cache<Uuid, Arc<Mutex<()>>>,
}

impl UsageTracker {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            clock,
            locks: Cache::builder().time_to_idle(LOCK_IDLE).build(),
        }
    }

    /// Current engagement figures for a user.
    ///
    /// Creates a zeroed usage record on first use and resets the weekly window
    /// if it has run its course; either change is persisted before returning.
    pub async fn get_stats(&self, user_id: Uuid) -> CoreResult<UserStats> {
        let _guard = self.lock_user(user_id).await;
        let (user, mut usage, mut dirty) = self.load(user_id).await?;

        let streak = current_streak(&usage.activity_dates, self.clock.today());
        if usage.current_streak != streak {
            usage.current_streak = streak;
            dirty = true;
        }
        if dirty {
            self.users.save_usage(user_id, &usage).await?;
        }

        Ok(UserStats {
            stats: snapshot(&usage),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        })
    }

    /// Adds `minutes` of usage and marks today as active.
    ///
    /// `minutes` must be finite and non-negative; fractions round to the nearest
    /// whole minute. Repeated calls keep adding minutes but mark the day once.
    /// An amount that would overflow the stored totals is rejected and nothing
    /// is written.
    pub async fn track_time(&self, user_id: Uuid, minutes: f64) -> CoreResult<TrackedTime> {
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "minutes must be a non-negative number, got {minutes}"
            )));
        }
        let rounded = minutes.round();
        if rounded >= u64::MAX as f64 {
            return Err(too_many_minutes(minutes));
        }
        let minutes = rounded as u64;

        let _guard = self.lock_user(user_id).await;
        let (_, mut usage, _) = self.load(user_id).await?;
        let now = self.clock.now();

        let (Some(total), Some(weekly)) = (
            usage.total_minutes.checked_add(minutes),
            usage.weekly_minutes.checked_add(minutes),
        ) else {
            return Err(too_many_minutes(minutes as f64));
        };
        usage.total_minutes = total;
        usage.weekly_minutes = weekly;
        usage.last_activity_at = now;
        mark_active_day(&mut usage.activity_dates, self.clock.day_of(now));
        usage.current_streak = current_streak(&usage.activity_dates, self.clock.day_of(now));

        self.users.save_usage(user_id, &usage).await?;
        debug!(%user_id, minutes, total = usage.total_minutes, "Tracked usage time");

        Ok(TrackedTime {
            weekly_time_hours: minutes_to_hours(usage.weekly_minutes),
            current_streak: usage.current_streak,
        })
    }

    pub async fn increment_quiz(&self, user_id: Uuid) -> CoreResult<u64> {
        self.increment(user_id, ActivityCounter::Quiz).await
    }

    pub async fn increment_material(&self, user_id: Uuid) -> CoreResult<u64> {
        self.increment(user_id, ActivityCounter::Material).await
    }

    pub async fn increment_conversation(&self, user_id: Uuid) -> CoreResult<u64> {
        self.increment(user_id, ActivityCounter::Conversation).await
    }

    /// Bumps one counter and returns its new value.
    pub async fn increment(&self, user_id: Uuid, counter: ActivityCounter) -> CoreResult<u64> {
        let _guard = self.lock_user(user_id).await;
        let (_, mut usage, _) = self.load(user_id).await?;
        let now = self.clock.now();

        let value = counter.bump(&mut usage);
        usage.last_activity_at = now;
        if counter.marks_active_day() {
            mark_active_day(&mut usage.activity_dates, self.clock.day_of(now));
            usage.current_streak = current_streak(&usage.activity_dates, self.clock.day_of(now));
        }

        self.users.save_usage(user_id, &usage).await?;
        debug!(%user_id, ?counter, value, "Incremented activity counter");
        Ok(value)
    }

    /// Reads the user and a normalised copy of their usage record.
    ///
    /// The flag reports whether the copy differs from what is stored.
    async fn load(&self, user_id: Uuid) -> CoreResult<(User, UsageRecord, bool)> {
        let mut user = self.users.get_user(user_id).await?;
        let now = self.clock.now();

        let (mut usage, mut dirty) = match user.usage.take() {
            Some(usage) => (usage, false),
            None => {
                info!(%user_id, "Initialising usage record");
                (UsageRecord::new(now), true)
            }
        };
        if roll_week(&mut usage, now) {
            info!(%user_id, "Weekly usage window reset");
            dirty = true;
        }
        Ok((user, usage, dirty))
    }

    async fn lock_user(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.get_with(user_id, || Arc::new(Mutex::new(())));
        lock.lock_owned().await
    }
}

fn too_many_minutes(minutes: f64) -> CoreError {
    CoreError::InvalidInput(format!("minutes value {minutes} is too large to record"))
}

/// Starts a fresh weekly window once the current one is a week old.
fn roll_week(usage: &mut UsageRecord, now: DateTime<Utc>) -> bool {
    if now - usage.week_start >= Duration::days(WEEK_DAYS) {
        usage.weekly_minutes = 0;
        usage.week_start = now;
        true
    } else {
        false
    }
}

fn snapshot(usage: &UsageRecord) -> StatsSnapshot {
    StatsSnapshot {
        weekly_time_hours: minutes_to_hours(usage.weekly_minutes),
        current_streak: usage.current_streak,
        quizzes_completed: usage.quizzes_completed,
        materials_reviewed: usage.materials_reviewed,
        ai_conversations: usage.ai_conversations,
        total_time_hours: minutes_to_hours(usage.total_minutes),
    }
}
