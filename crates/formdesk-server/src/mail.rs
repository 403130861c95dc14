// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outgoing mail.

use async_trait::async_trait;
use formdesk_core::persistence::User;
use minijinja::context;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::LOGIN_LINK_TTL;
use crate::render::Templates;

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// The transport refused or failed to deliver the message.
    #[error("failed to send mail to {to}: {reason}")]
    Transport {
        /// Recipient address.
        to: String,
        /// Transport-specific reason.
        reason: String,
    },
}

/// A message with plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

/// Delivers messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `email`.
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Sending mail");
        debug!(to = %email.to, body = %email.text, "Mail body");
        Ok(())
    }
}

/// Login link message for `user`.
pub fn login_email(
    templates: &Templates,
    user: &User,
    link: &str,
) -> Result<Email, minijinja::Error> {
    let ctx = context! {
        name => &user.name,
        link,
        valid_minutes => LOGIN_LINK_TTL.as_secs() / 60,
    };
    Ok(Email {
        to: user.email.clone(),
        subject: "Your formdesk login link".to_string(),
        text: templates.render("login_email.txt", &ctx)?,
        html: templates.render("login_email.html", &ctx)?,
    })
}
