//! SMS gateway with the mailer's worker-pool shape.
//!
//! The actual transport is not wired up yet; sends validate and normalize
//! the input, then run a stub on the pool so the call pattern matches the
//! real gateway once one is configured.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Concurrent SMS transport session limit.
const SMS_POOL_SIZE: usize = 4;

/// Messages at or above this length are dropped.
const MAX_SMS_LEN: usize = 127;

/// Prefix a bare international number with `+`.
fn normalize_phone(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

pub struct SmsGateway {
    pool: Arc<Semaphore>,
}

impl SmsGateway {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Semaphore::new(SMS_POOL_SIZE)),
        }
    }

    /// Send one SMS. Best-effort: errors are handled inside.
    ///
    /// The phone number must be in international format; a missing leading
    /// `+` is added. Messages longer than the SMS limit are dropped.
    pub async fn send(&self, phone: &str, text: &str) {
        if text.len() >= MAX_SMS_LEN {
            tracing::error!(text, "sms message too long, not sent");
            return;
        }

        let phone = normalize_phone(phone);

        let permit = self.pool.clone().acquire_owned().await;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            // TODO: wire up the SMS provider transport once one is chosen.
            tracing::warn!(%phone, "sms transport not implemented, message dropped");
        })
        .await;

        if let Err(err) = result {
            tracing::error!(%err, "sms worker panicked");
        }
    }
}

impl Default for SmsGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_plus() {
        assert_eq!(normalize_phone("380501234567"), "+380501234567");
    }

    #[test]
    fn test_normalize_keeps_existing_plus() {
        assert_eq!(normalize_phone("+380501234567"), "+380501234567");
    }

    #[tokio::test]
    async fn test_long_message_is_dropped() {
        let gateway = SmsGateway::new();
        // Must not panic or block; the message is dropped before the pool.
        gateway.send("380501234567", &"x".repeat(200)).await;
    }
}
