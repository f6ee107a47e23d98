//! crates/study_core/src/password_reset.rs
//!
//! Emailed password reset links. A token is 32 random bytes, hex encoded; only
//! its SHA-256 digest is stored, so a leaked table cannot be replayed. Each token
//! lives for [`RESET_TOKEN_TTL_SECS`] and is cleared by the reset that uses it.

use chrono::Duration;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ports::{CodeDispatcher, UserStore};
use crate::verification::email_contact;

pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

const TOKEN_BYTES: usize = 32;

/// A fresh reset token in its emailed (plain) form.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// The stored form of a token.
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct PasswordResetService {
    users: Arc<dyn UserStore>,
    dispatcher: Arc<dyn CodeDispatcher>,
    clock: Arc<dyn Clock>,
    /// Frontend origin the emailed link points at.
    link_base: String,
}

impl PasswordResetService {
    pub fn new(
        users: Arc<dyn UserStore>,
        dispatcher: Arc<dyn CodeDispatcher>,
        clock: Arc<dyn Clock>,
        link_base: impl Into<String>,
    ) -> Self {
        let link_base: String = link_base.into();
        Self {
            users,
            dispatcher,
            clock,
            link_base: link_base.trim_end_matches('/').to_string(),
        }
    }

    /// Emails a reset link to the account registered under `email`.
    ///
    /// An unknown address succeeds without sending anything, so callers cannot
    /// tell which addresses have accounts.
    pub async fn request_reset(&self, email: &str) -> CoreResult<()> {
        let contact = email_contact(email)?;
        let Some(user) = self.users.find_user_by_contact(&contact).await? else {
            info!(contact = %contact, "Password reset requested for unknown address");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = self.clock.now() + Duration::seconds(RESET_TOKEN_TTL_SECS);
        self.users
            .store_reset_token(user.user_id, &hash_reset_token(&token), expires_at)
            .await?;

        let link = format!("{}/reset-password/{}", self.link_base, token);
        if let Err(e) = self
            .dispatcher
            .send_reset_link(&contact, &link, &user.first_name)
            .await
        {
            warn!(user_id = %user.user_id, error = %e, "Failed to send password reset link");
            return Err(CoreError::DispatchFailed(e.to_string()));
        }
        info!(user_id = %user.user_id, "Password reset link sent");
        Ok(())
    }

    /// Checks that `token` is known and unexpired without using it up.
    pub async fn validate_token(&self, token: &str) -> CoreResult<()> {
        self.users
            .find_reset_token(&hash_reset_token(token), self.clock.now())
            .await?
            .map(|_| ())
            .ok_or(CoreError::InvalidResetToken)
    }

    /// Replaces the password of the token's holder. The token cannot be used again.
    pub async fn reset_password(&self, token: &str, password_hash: &str) -> CoreResult<()> {
        let user_id = self
            .users
            .redeem_reset_token(&hash_reset_token(token), password_hash, self.clock.now())
            .await?
            .ok_or(CoreError::InvalidResetToken)?;
        info!(%user_id, "Password reset");
        Ok(())
    }
}
