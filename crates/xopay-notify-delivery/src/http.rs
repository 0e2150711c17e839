//! Authenticated JSON HTTP client.
//!
//! Every internal REST API speaks JSON and expects a Bearer system token.
//! The client enforces a ten-second total timeout and treats anything other
//! than a 200 response with a JSON body as an error. It never retries;
//! retry policy belongs to the caller.

use reqwest::{header, Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use xopay_notify_auth::TokenSigner;

use crate::error::{DeliveryError, DeliveryResult};

/// Total request timeout, connect included.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Response shape of the admin service email endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailsResponse {
    #[serde(default)]
    pub emails: Vec<String>,
}

/// JSON HTTP client for the internal XOPay REST APIs.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    signer: TokenSigner,
}

impl ApiClient {
    /// Create a client with the shared timeout settings.
    pub fn new(signer: TokenSigner) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");

        Self { client, signer }
    }

    /// Perform a JSON request.
    ///
    /// A fresh system token is minted per call. Returns the decoded JSON
    /// body on a 200 response; every other outcome maps to a
    /// [`DeliveryError`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: Option<&[(&str, &str)]>,
    ) -> DeliveryResult<Value> {
        let token = self.signer.system_token()?;

        let mut request = self
            .client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(params) = params {
            request = request.query(params);
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(url, status = status.as_u16(), %detail, "HTTP wrong status");
            return Err(DeliveryError::UpstreamStatus {
                status: status.as_u16(),
                detail,
            });
        }

        response.json().await.map_err(DeliveryError::Decode)
    }

    /// `GET` returning the decoded JSON body.
    pub async fn get(&self, url: &str) -> DeliveryResult<Value> {
        self.request(Method::GET, url, None, None).await
    }

    /// `PUT` with a JSON body.
    pub async fn put(&self, url: &str, body: &Value) -> DeliveryResult<Value> {
        self.request(Method::PUT, url, Some(body), None).await
    }

    /// `POST` with a JSON body.
    pub async fn post(&self, url: &str, body: &Value) -> DeliveryResult<Value> {
        self.request(Method::POST, url, Some(body), None).await
    }

    /// Fetch an `{emails: [..]}` endpoint.
    pub async fn get_emails(&self, url: &str) -> DeliveryResult<Vec<String>> {
        let body = self.get(url).await?;
        let parsed: EmailsResponse =
            serde_json::from_value(body).unwrap_or(EmailsResponse { emails: Vec::new() });
        Ok(parsed.emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xopay_notify_auth::AuthSettings;

    fn client() -> ApiClient {
        let signer = TokenSigner::new(&AuthSettings {
            key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        ApiClient::new(signer)
    }

    #[tokio::test]
    async fn test_get_decodes_json_and_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admins_emails"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"emails": ["a@x.io"]})))
            .expect(1)
            .mount(&server)
            .await;

        let emails = client()
            .get_emails(&format!("{}/admins_emails", server.uri()))
            .await
            .unwrap();
        assert_eq!(emails, vec!["a@x.io".to_string()]);
    }

    #[tokio::test]
    async fn test_non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/payment/p-1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client()
            .put(&format!("{}/payment/p-1", server.uri()), &json!({"status": "done"}))
            .await
            .unwrap_err();

        match err {
            DeliveryError::UpstreamStatus { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client().get(&server.uri()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Decode(_)));
    }
}
