//! Blocking SMTP sends offloaded to a bounded worker pool.
//!
//! SMTP sessions are synchronous and slow, so sends run inside
//! `spawn_blocking` gated by a semaphore that bounds concurrent sessions to
//! four. Email is best-effort: failures are logged and swallowed, the
//! caller is never blocked on an error.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;
use tokio::sync::Semaphore;

/// Concurrent SMTP session limit.
const MAIL_POOL_SIZE: usize = 4;

/// Mail server settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailSettings {
    /// SMTP server hostname. STARTTLS on the submission port.
    pub server: String,
    pub username: String,
    pub password: String,
    /// Sender address used when the caller does not supply one.
    pub default_sender: String,
}

/// Sending seam used by the engine, the queue handlers and the reporter.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one mail. Best-effort: errors are handled inside.
    async fn send(&self, email_to: &str, subject: &str, text: &str);
}

/// Production mailer: STARTTLS + LOGIN, one `sendmail` per call.
pub struct SmtpMailer {
    transport: SmtpTransport,
    default_sender: String,
    pool: Arc<Semaphore>,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, lettre::transport::smtp::Error> {
        let transport = SmtpTransport::starttls_relay(&settings.server)?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .authentication(vec![Mechanism::Login])
            .build();

        Ok(Self {
            transport,
            default_sender: settings.default_sender.clone(),
            pool: Arc::new(Semaphore::new(MAIL_POOL_SIZE)),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email_to: &str, subject: &str, text: &str) {
        let message = Message::builder()
            .from(match self.default_sender.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    tracing::error!(sender = %self.default_sender, %err, "invalid sender address");
                    return;
                }
            })
            .to(match email_to.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    tracing::error!(email_to, %err, "invalid recipient address");
                    return;
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string());

        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(email_to, %err, "failed to build mail");
                return;
            }
        };

        // Bounds concurrent SMTP sessions; oversubscription waits here.
        let Ok(permit) = self.pool.clone().acquire_owned().await else {
            return;
        };
        let transport = self.transport.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            transport.send(&message)
        })
        .await;

        match result {
            Ok(Ok(_)) => tracing::debug!(email_to, "mail sent"),
            Ok(Err(err)) => tracing::error!(email_to, %err, "send email error"),
            Err(err) => tracing::error!(email_to, %err, "mail worker panicked"),
        }
    }
}

/// Test mailer that records every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(to, subject, text)` triples sent so far.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email_to: &str, subject: &str, text: &str) {
        self.sent.lock().unwrap().push((
            email_to.to_string(),
            subject.to_string(),
            text.to_string(),
        ));
    }
}
