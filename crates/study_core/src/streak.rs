//! crates/study_core/src/streak.rs
//!
//! Pure calendar-day arithmetic behind the engagement figures: the current
//! streak, activity-day marking and hour rounding.

use chrono::NaiveDate;

use crate::domain::MAX_ACTIVITY_DAYS;

/// Counts consecutive active days ending at the most recent one.
///
/// The chain only counts if its most recent day is `today` or the day before;
/// otherwise the streak is broken and the result is zero.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut distinct = days.to_vec();
    distinct.sort_unstable_by(|a, b| b.cmp(a));
    distinct.dedup();

    let Some(&latest) = distinct.first() else {
        return 0;
    };
    if latest != today && Some(latest) != today.pred_opt() {
        return 0;
    }

    let mut streak = 0;
    let mut expected = Some(latest);
    for day in distinct {
        if Some(day) != expected {
            break;
        }
        streak += 1;
        expected = day.pred_opt();
    }
    streak
}

/// Records `day` as active unless it is already present.
///
/// Keeps the list ascending and capped at [`MAX_ACTIVITY_DAYS`], dropping the
/// oldest entries first. Returns whether the day was newly added.
pub fn mark_active_day(days: &mut Vec<NaiveDate>, day: NaiveDate) -> bool {
    if days.contains(&day) {
        return false;
    }
    days.push(day);
    days.sort_unstable();
    if days.len() > MAX_ACTIVITY_DAYS {
        let excess = days.len() - MAX_ACTIVITY_DAYS;
        days.drain(..excess);
    }
    true
}

/// Converts minutes to hours rounded to one decimal place.
pub fn minutes_to_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}
