//! # xopay-notify-delivery
//!
//! Outbound delivery channels shared by the notify service:
//!
//! - [`http`] - authenticated JSON HTTP client with a bounded timeout
//! - [`mailer`] - blocking SMTP sends offloaded to a bounded worker pool
//! - [`sms`] - SMS gateway with the same pool shape (transport is a stub)
//! - [`reporter`] - best-effort failure/success reports to the admin team
//!
//! Email and SMS are best-effort: send failures are logged and swallowed,
//! callers never see them. HTTP errors are returned to the caller, whose
//! policy decides whether to retry.

pub mod error;
pub mod http;
pub mod mailer;
pub mod reporter;
pub mod sms;

pub use error::DeliveryError;
pub use http::{ApiClient, EmailsResponse};
pub use mailer::{MailSettings, Mailer, RecordingMailer, SmtpMailer};
pub use reporter::AdminReporter;
pub use sms::SmsGateway;
