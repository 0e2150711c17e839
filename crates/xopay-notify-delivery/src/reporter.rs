//! Best-effort reports to the admin team.
//!
//! The current admin email list lives in the admin service; it is fetched
//! per report so membership changes apply immediately. Reporter failures
//! never propagate to callers.

use std::sync::Arc;

use futures::future::join_all;

use crate::http::ApiClient;
use crate::mailer::Mailer;

pub struct AdminReporter {
    client: ApiClient,
    mailer: Arc<dyn Mailer>,
    admin_base_url: String,
}

impl AdminReporter {
    pub fn new(client: ApiClient, mailer: Arc<dyn Mailer>, admin_base_url: String) -> Self {
        Self {
            client,
            mailer,
            admin_base_url,
        }
    }

    /// Mail `subject`/`text` to every current admin.
    ///
    /// If the admin list cannot be fetched the report is dropped with a
    /// warning.
    pub async fn report(&self, subject: &str, text: &str) {
        let url = format!("{}/admins_emails", self.admin_base_url);

        let emails = match self.client.get_emails(&url).await {
            Ok(emails) => emails,
            Err(err) => {
                tracing::warn!(%err, "failed to fetch admin emails, report dropped");
                return;
            }
        };

        if emails.is_empty() {
            tracing::warn!(subject, "admin email list is empty, report dropped");
            return;
        }

        join_all(
            emails
                .iter()
                .map(|email| self.mailer.send(email, subject, text)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::RecordingMailer;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xopay_notify_auth::{AuthSettings, TokenSigner};

    fn api_client() -> ApiClient {
        ApiClient::new(
            TokenSigner::new(&AuthSettings {
                key: "test-key".to_string(),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_report_fans_out_to_all_admins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admins_emails"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"emails": ["ops@x.io", "dev@x.io"]})),
            )
            .mount(&server)
            .await;

        let mailer = Arc::new(RecordingMailer::new());
        let reporter = AdminReporter::new(api_client(), mailer.clone(), server.uri());

        reporter.report("XOPAY: test.", "body").await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, subject, _)| subject == "XOPAY: test."));
    }

    #[tokio::test]
    async fn test_report_dropped_when_list_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mailer = Arc::new(RecordingMailer::new());
        let reporter = AdminReporter::new(api_client(), mailer.clone(), server.uri());

        reporter.report("XOPAY: test.", "body").await;
        assert!(mailer.sent().is_empty());
    }
}
