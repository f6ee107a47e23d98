//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chrono::Duration;
use std::sync::Arc;
use study_core::{
    Clock, CodeDispatcher, NotebookService, NotebookStore, PasswordResetService,
    PendingVerificationStore, UsageTracker, UserStore, VerificationService,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<Config>,
    pub tracker: Arc<UsageTracker>,
    pub verification: Arc<VerificationService>,
    pub notebooks: Arc<NotebookService>,
    pub password_reset: Arc<PasswordResetService>,
}

impl AppState {
    /// Wires the core services onto the given adapters.
    pub fn new(
        config: Arc<Config>,
        users: Arc<dyn UserStore>,
        notebook_store: Arc<dyn NotebookStore>,
        dispatcher: Arc<dyn CodeDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = Arc::new(UsageTracker::new(users.clone(), clock.clone()));
        let pending = Arc::new(PendingVerificationStore::new(clock.clone()));
        let verification = Arc::new(VerificationService::new(
            pending,
            users.clone(),
            dispatcher.clone(),
            clock.clone(),
            Duration::seconds(config.otp_ttl_secs),
        ));
        let password_reset = Arc::new(PasswordResetService::new(
            users.clone(),
            dispatcher,
            clock.clone(),
            config.frontend_url.clone(),
        ));
        let notebooks = Arc::new(NotebookService::new(notebook_store, tracker.clone(), clock));

        Self {
            users,
            config,
            tracker,
            verification,
            notebooks,
            password_reset,
        }
    }

    pub fn pending_store(&self) -> Arc<PendingVerificationStore> {
        self.verification.store().clone()
    }
}
