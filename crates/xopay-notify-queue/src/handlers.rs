//! Per-queue message handlers.
//!
//! Every handler validates its payload, performs the side effect and traps
//! its own failures; the consumer acks regardless, so a payment update that
//! still needs work continues in a detached retry task.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use xopay_notify_delivery::{AdminReporter, ApiClient, Mailer, SmsGateway};
use xopay_notify_engine::NotifyEngine;

use crate::consumer::QueueHandler;
use crate::error::QueueResult;

/// Retries scheduled after the initial attempt fails.
const MAX_UPDATE_RETRIES: u32 = 5;

const TRANSACTION_REPORT_SUBJECT: &str = "XOPAY: Transaction update error.";

// Transaction status

/// Pushes payment status updates to the client service, with bounded
/// exponential retry in the background.
pub struct TransactionHandler {
    queue: String,
    client: ApiClient,
    reporter: Arc<AdminReporter>,
    client_base_url: String,
    shutdown: CancellationToken,
    /// Base unit of the retry delay; attempt `k` sleeps `unit * 2^k`.
    /// One second in production, shrunk in tests.
    retry_unit: std::time::Duration,
}

impl TransactionHandler {
    pub fn new(
        queue: String,
        client: ApiClient,
        reporter: Arc<AdminReporter>,
        client_base_url: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            client,
            reporter,
            client_base_url,
            shutdown,
            retry_unit: std::time::Duration::from_secs(1),
        }
    }

    #[doc(hidden)]
    pub fn with_retry_unit(mut self, unit: std::time::Duration) -> Self {
        self.retry_unit = unit;
        self
    }
}

/// Delay before retry `attempt` (1-indexed): 2, 4, 8, 16, 32 units.
fn retry_delay(unit: std::time::Duration, attempt: u32) -> std::time::Duration {
    unit * 2u32.pow(attempt)
}

async fn report_transaction_error(reporter: &AdminReporter, pay_id: &str, error: &str) {
    let text = format!(
        "Failed to update payment [{pay_id}] status!\n\n\
         Problem description:\n{error}\n\nCommit time (UTC): {}",
        Utc::now()
    );
    reporter.report(TRANSACTION_REPORT_SUBJECT, &text).await;
}

/// Detached retry loop. The queue message is long acked by the time this
/// runs; shutdown is observed between sleeps.
#[allow(clippy::too_many_arguments)]
async fn retry_update(
    client: ApiClient,
    reporter: Arc<AdminReporter>,
    shutdown: CancellationToken,
    retry_unit: std::time::Duration,
    pay_id: String,
    url: String,
    body: Value,
    initial_error: String,
) {
    let mut errors = vec![initial_error];

    for attempt in 1..=MAX_UPDATE_RETRIES {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(retry_delay(retry_unit, attempt)) => {}
        }

        tracing::info!(
            pay_id = %pay_id,
            attempt,
            max = MAX_UPDATE_RETRIES,
            "retry payment update"
        );

        match client.put(&url, &body).await {
            Ok(_) => {
                tracing::info!(pay_id = %pay_id, "payment updated successfully");
                return;
            }
            Err(err) => {
                tracing::error!(pay_id = %pay_id, attempt, %err, "error update payment status");
                errors.push(err.to_string());
            }
        }
    }

    tracing::error!(pay_id = %pay_id, "payment NOT updated after all retries");
    let error = format!(
        "Payment NOT UPDATED after {} attempts.\n\nAll errors:\n{}",
        errors.len(),
        errors.join("\n")
    );
    report_transaction_error(&reporter, &pay_id, &error).await;
}

#[async_trait]
impl QueueHandler for TransactionHandler {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn handle(&self, message: Value) -> QueueResult<()> {
        let pay_id = message.get("id").and_then(Value::as_str).unwrap_or_default();
        let pay_status = message
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if pay_id.is_empty() || pay_status.is_empty() {
            tracing::error!(?message, "missing required fields in transaction message, dropped");
            return Ok(());
        }

        let url = format!("{}/payment/{}", self.client_base_url, pay_id);
        let body = json!({
            "status": pay_status,
            "redirect_url": message.get("redirect_url").cloned().unwrap_or(Value::Null),
        });

        match self.client.put(&url, &body).await {
            Ok(_) => {
                tracing::info!(pay_id, status = pay_status, "payment updated successfully");
            }
            Err(err) => {
                tracing::error!(pay_id, %err, "error update payment status, retrying in background");
                let initial_error = err.to_string();

                report_transaction_error(&self.reporter, pay_id, &initial_error).await;

                tokio::spawn(retry_update(
                    self.client.clone(),
                    self.reporter.clone(),
                    self.shutdown.clone(),
                    self.retry_unit,
                    pay_id.to_string(),
                    url,
                    body,
                    initial_error,
                ));
            }
        }

        Ok(())
    }
}

// Email / SMS delivery

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmailMessage {
    email_to: String,
    subject: String,
    text: String,
}

/// Forwards well-formed email requests to the mailer.
pub struct EmailHandler {
    queue: String,
    mailer: Arc<dyn Mailer>,
}

impl EmailHandler {
    pub fn new(queue: String, mailer: Arc<dyn Mailer>) -> Self {
        Self { queue, mailer }
    }
}

#[async_trait]
impl QueueHandler for EmailHandler {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn handle(&self, message: Value) -> QueueResult<()> {
        match serde_json::from_value::<EmailMessage>(message) {
            Ok(email) => {
                self.mailer
                    .send(&email.email_to, &email.subject, &email.text)
                    .await;
            }
            Err(err) => {
                tracing::error!(%err, "wrong fields in email queue request, dropped");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SmsMessage {
    phone: String,
    text: String,
}

/// Forwards well-formed SMS requests to the gateway.
pub struct SmsHandler {
    queue: String,
    gateway: Arc<SmsGateway>,
}

impl SmsHandler {
    pub fn new(queue: String, gateway: Arc<SmsGateway>) -> Self {
        Self { queue, gateway }
    }
}

#[async_trait]
impl QueueHandler for SmsHandler {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn handle(&self, message: Value) -> QueueResult<()> {
        match serde_json::from_value::<SmsMessage>(message) {
            Ok(sms) => self.gateway.send(&sms.phone, &sms.text).await,
            Err(err) => {
                tracing::error!(%err, "wrong fields in sms queue request, dropped");
            }
        }
        Ok(())
    }
}

// Engine requests

/// Feeds arbitrary request-queue events into the notification engine.
pub struct RequestHandler {
    queue: String,
    engine: Arc<NotifyEngine>,
}

impl RequestHandler {
    pub fn new(queue: String, engine: Arc<NotifyEngine>) -> Self {
        Self { queue, engine }
    }
}

#[async_trait]
impl QueueHandler for RequestHandler {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn handle(&self, message: Value) -> QueueResult<()> {
        self.engine.handle_event(&message).await;
        Ok(())
    }
}
