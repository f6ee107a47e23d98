//! services/api/src/web/sweep_task.rs
//!
//! Background task that periodically drops expired pending verifications.

use std::sync::Arc;
use std::time::Duration;
use study_core::PendingVerificationStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs `sweep` on the store every `every` until the token is cancelled.
pub async fn sweep_process(
    store: Arc<PendingVerificationStore>,
    every: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval_secs = every.as_secs(), "Pending verification sweeper started");
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                info!("Pending verification sweeper stopped");
                break;
            }
            _ = ticker.tick() => {
                let removed = store.sweep().await;
                if removed > 0 {
                    info!(removed, "Expired pending verifications swept");
                } else {
                    debug!("Sweep found nothing to remove");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use study_core::{Clock, ContactKey, ManualClock, PendingUserData, UserType};

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_swept_until_cancelled() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(PendingVerificationStore::new(clock.clone()));
        let contact = ContactKey::Email("a@x.com".to_string());
        let user_data = PendingUserData {
            first_name: "Ada".to_string(),
            last_name: "L".to_string(),
            password_hash: "hash".to_string(),
            user_type: UserType::Guest,
        };
        store
            .put(&contact, user_data, "123456".to_string(), clock.now())
            .await;
        clock.advance(ChronoDuration::seconds(1));

        let token = CancellationToken::new();
        let task = tokio::spawn(sweep_process(
            store.clone(),
            Duration::from_secs(60),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.is_empty().await);

        token.cancel();
        task.await.unwrap();
    }
}
