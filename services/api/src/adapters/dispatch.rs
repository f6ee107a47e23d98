//! services/api/src/adapters/dispatch.rs
//!
//! Adapters for the `CodeDispatcher` port: Resend for email, Twilio for SMS,
//! and a console fallback for development when neither is configured. Each
//! carries both verification codes and password reset links.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use study_core::domain::ContactKey;
use study_core::ports::{CodeDispatcher, PortError, PortResult};
use tracing::{info, warn};

use crate::config::{EmailSettings, SmsSettings};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

fn code_message(code: &str, first_name: &str, ttl_minutes: i64) -> String {
    let name = if first_name.trim().is_empty() { "there" } else { first_name };
    format!(
        "Hello {name}! Your verification code is {code}. It expires in {ttl_minutes} minutes."
    )
}

fn reset_message(link: &str, first_name: &str) -> String {
    let name = if first_name.trim().is_empty() { "there" } else { first_name };
    format!(
        "Hello {name}! Use this link to reset your password: {link} \
         The link expires in 1 hour. If you did not ask for a reset, ignore this message."
    )
}

//=========================================================================================
// Console
//=========================================================================================

/// Writes codes to the log instead of sending them.
pub struct ConsoleDispatcher {
    ttl_minutes: i64,
}

impl ConsoleDispatcher {
    pub fn new(ttl_minutes: i64) -> Self {
        Self { ttl_minutes }
    }
}

#[async_trait]
impl CodeDispatcher for ConsoleDispatcher {
    async fn send_code(
        &self,
        contact: &ContactKey,
        code: &str,
        first_name: &str,
    ) -> PortResult<()> {
        warn!(
            %contact,
            message = %code_message(code, first_name, self.ttl_minutes),
            "No delivery channel configured; verification code written to log"
        );
        Ok(())
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        first_name: &str,
    ) -> PortResult<()> {
        warn!(
            %contact,
            message = %reset_message(link, first_name),
            "No delivery channel configured; reset link written to log"
        );
        Ok(())
    }
}

//=========================================================================================
// Resend (email)
//=========================================================================================

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

pub struct ResendEmailDispatcher {
    client: reqwest::Client,
    settings: EmailSettings,
    ttl_minutes: i64,
}

impl ResendEmailDispatcher {
    pub fn new(client: reqwest::Client, settings: EmailSettings, ttl_minutes: i64) -> Self {
        Self {
            client,
            settings,
            ttl_minutes,
        }
    }

    async fn send_email(&self, contact: &ContactKey, subject: &str, text: String) -> PortResult<()> {
        let body = ResendEmail {
            from: &self.settings.from,
            to: [contact.as_str()],
            subject,
            text,
        };
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Resend rejected the message with status {}",
                response.status()
            )));
        }
        info!(%contact, subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl CodeDispatcher for ResendEmailDispatcher {
    async fn send_code(
        &self,
        contact: &ContactKey,
        code: &str,
        first_name: &str,
    ) -> PortResult<()> {
        let text = code_message(code, first_name, self.ttl_minutes);
        self.send_email(contact, "Verify your email", text).await
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        first_name: &str,
    ) -> PortResult<()> {
        let text = reset_message(link, first_name);
        self.send_email(contact, "Reset your password", text).await
    }
}

//=========================================================================================
// Twilio (SMS)
//=========================================================================================

pub struct TwilioSmsDispatcher {
    client: reqwest::Client,
    settings: SmsSettings,
    ttl_minutes: i64,
}

impl TwilioSmsDispatcher {
    pub fn new(client: reqwest::Client, settings: SmsSettings, ttl_minutes: i64) -> Self {
        Self {
            client,
            settings,
            ttl_minutes,
        }
    }

    async fn send_sms(&self, contact: &ContactKey, body: String) -> PortResult<()> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.settings.account_sid
        );
        let response = self
            .client
            .post(url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", contact.as_str()),
                ("From", self.settings.from_number.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Twilio rejected the message with status {}",
                response.status()
            )));
        }
        info!(%contact, "SMS sent");
        Ok(())
    }
}

#[async_trait]
impl CodeDispatcher for TwilioSmsDispatcher {
    async fn send_code(
        &self,
        contact: &ContactKey,
        code: &str,
        first_name: &str,
    ) -> PortResult<()> {
        self.send_sms(contact, code_message(code, first_name, self.ttl_minutes))
            .await
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        first_name: &str,
    ) -> PortResult<()> {
        self.send_sms(contact, reset_message(link, first_name)).await
    }
}

//=========================================================================================
// Routing by contact kind
//=========================================================================================

/// Sends email contacts and phone contacts through separate channels.
pub struct ContactRouter {
    email: Arc<dyn CodeDispatcher>,
    sms: Arc<dyn CodeDispatcher>,
}

impl ContactRouter {
    pub fn new(email: Arc<dyn CodeDispatcher>, sms: Arc<dyn CodeDispatcher>) -> Self {
        Self { email, sms }
    }
}

#[async_trait]
impl CodeDispatcher for ContactRouter {
    async fn send_code(
        &self,
        contact: &ContactKey,
        code: &str,
        first_name: &str,
    ) -> PortResult<()> {
        match contact {
            ContactKey::Email(_) => self.email.send_code(contact, code, first_name).await,
            ContactKey::Phone(_) => self.sms.send_code(contact, code, first_name).await,
        }
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        first_name: &str,
    ) -> PortResult<()> {
        match contact {
            ContactKey::Email(_) => self.email.send_reset_link(contact, link, first_name).await,
            ContactKey::Phone(_) => self.sms.send_reset_link(contact, link, first_name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_falls_back_to_generic_greeting() {
        assert_eq!(
            code_message("123456", "", 5),
            "Hello there! Your verification code is 123456. It expires in 5 minutes."
        );
        assert!(code_message("123456", "Ada", 5).starts_with("Hello Ada!"));
    }

    #[test]
    fn reset_message_carries_the_link() {
        let text = reset_message("https://app.example.com/reset-password/abc", "Ada");
        assert!(text.starts_with("Hello Ada!"));
        assert!(text.contains("https://app.example.com/reset-password/abc"));
    }

    #[tokio::test]
    async fn console_dispatch_always_succeeds() {
        let dispatcher = ConsoleDispatcher::new(5);
        let contact = ContactKey::Email("a@x.com".to_string());
        assert!(dispatcher.send_code(&contact, "123456", "Ada").await.is_ok());
    }
}
