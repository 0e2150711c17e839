//! Scheduled currency refresh daemon.
//!
//! Fires at fixed wall-clock hours in a configured timezone. A refresh
//! fetches every source concurrently, pushes the combined rates to the
//! admin service and mails the admins a success or failure report.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use xopay_notify_delivery::{AdminReporter, ApiClient};

use crate::rates::RateEntry;
use crate::sources::RateSource;

/// Refreshes scheduled closer than this to now are pushed to the next
/// update hour, so a restart inside an update hour does not double-fire.
const MIN_UPDATE_GAP_MINUTES: i64 = 30;

const REPORT_SUBJECT: &str = "XOPAY: Exchange rates update.";

/// Scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencySettings {
    /// Wall-clock hours (0..=23) at which to refresh.
    pub update_hours: Vec<u8>,
    /// IANA timezone name the hours are interpreted in.
    pub timezone: String,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            update_hours: vec![0, 6, 12, 18],
            timezone: "UTC".to_string(),
        }
    }
}

pub struct CurrencyScheduler {
    sources: Vec<Arc<dyn RateSource>>,
    client: ApiClient,
    reporter: Arc<AdminReporter>,
    admin_base_url: String,
    update_hours: Vec<u32>,
    timezone: Tz,
    shutdown: CancellationToken,
}

impl CurrencyScheduler {
    pub fn new(
        sources: Vec<Arc<dyn RateSource>>,
        client: ApiClient,
        reporter: Arc<AdminReporter>,
        admin_base_url: String,
        update_hours: Vec<u8>,
        timezone: Tz,
        shutdown: CancellationToken,
    ) -> Self {
        let mut update_hours: Vec<u32> = update_hours.into_iter().map(u32::from).collect();
        update_hours.sort_unstable();
        update_hours.dedup();

        Self {
            sources,
            client,
            reporter,
            admin_base_url,
            update_hours,
            timezone,
            shutdown,
        }
    }

    /// Time until the next update instant.
    ///
    /// Candidates are today's and tomorrow's update hours in the configured
    /// timezone; the nearest one further than the 30-minute floor wins.
    pub fn next_update_delay(&self, now: DateTime<Utc>) -> std::time::Duration {
        let local_now = now.with_timezone(&self.timezone);
        let today = local_now.date_naive();
        let min_gap = ChronoDuration::minutes(MIN_UPDATE_GAP_MINUTES);

        let mut nearest: Option<ChronoDuration> = None;
        for day in [today, today + ChronoDuration::days(1)] {
            for &hour in &self.update_hours {
                let candidate = match self
                    .timezone
                    .with_ymd_and_hms(day.year(), day.month(), day.day(), hour, 0, 0)
                {
                    LocalResult::Single(dt) => dt,
                    LocalResult::Ambiguous(dt, _) => dt,
                    // The local hour does not exist (DST gap).
                    LocalResult::None => continue,
                };

                let until = candidate.with_timezone(&Utc) - now;
                if until > min_gap && nearest.map_or(true, |n| until < n) {
                    nearest = Some(until);
                }
            }
        }

        nearest
            .expect("update_hours must not be empty")
            .to_std()
            .unwrap_or_default()
    }

    /// Infinite refresh loop, interruptible between sleeps.
    pub async fn run(&self) {
        tracing::info!("start currency update daemon");

        loop {
            let delay = self.next_update_delay(Utc::now());
            tracing::debug!(delay_secs = delay.as_secs(), "next currency update scheduled");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            self.refresh().await;
        }

        tracing::info!("currency update daemon stopped");
    }

    /// One refresh cycle: fetch, push, report.
    pub async fn refresh(&self) {
        tracing::debug!("update currency exchange information");

        let results = join_all(self.sources.iter().map(|source| source.fetch())).await;

        let mut rates = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(mut fetched) => rates.append(&mut fetched),
                Err(err) => failures.push(err.to_string()),
            }
        }

        if !failures.is_empty() {
            tracing::error!(errors = ?failures, "error load currency");
            self.report_error(&format!("Error load currency:\n{}", failures.join("\n")))
                .await;
            return;
        }

        let url = format!("{}/currency/update", self.admin_base_url);
        if let Err(err) = self.client.post(&url, &json!({ "update": rates })).await {
            tracing::error!(%err, "error update currency");
            self.report_error(&format!(
                "Error update currency.\nWrong response from Admin Service.\n{err}"
            ))
            .await;
            return;
        }

        tracing::info!("currency exchange information updated successfully");
        self.report_success(&rates).await;
    }

    async fn report_success(&self, rates: &[RateEntry]) {
        let listing: Vec<String> = rates
            .iter()
            .map(|r| format!("{}/{}:\t {}", r.from_currency, r.to_currency, r.rate))
            .collect();
        let text = format!(
            "Exchange rates was successfully updated.\n\n{}\n\nCommit time (UTC): {}",
            listing.join("\n"),
            Utc::now()
        );
        self.reporter.report(REPORT_SUBJECT, &text).await;
    }

    async fn report_error(&self, error: &str) {
        let text = format!(
            "Failed to upgrade the exchange rate!\n\nProblem description:\n{error}\n\nCommit time (UTC): {}",
            Utc::now()
        );
        self.reporter.report(REPORT_SUBJECT, &text).await;
    }
}
