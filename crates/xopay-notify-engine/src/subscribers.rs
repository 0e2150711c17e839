//! Subscriber string parsing and resolution.
//!
//! A rendered `subscribers` string is a comma-separated list of literal
//! email addresses and `kind:id` pattern specifiers. Patterns resolve to
//! email lists through the admin service.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;

use xopay_notify_delivery::ApiClient;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("valid email regex")
});

static PATTERN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(group|user|store_merchants|store_managers):([\w-]+)$")
        .expect("valid pattern regex")
});

/// Union of the URL shapes a pattern specifier resolves to. A rendered
/// case containing one of these is refused before matching, so a template
/// cannot steer the resolver at itself.
pub static RECURSIVE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:/emails/groups/[\w-]+|/emails/users/[\w-]+|/emails/stores/[\w-]+/merchants|/emails/stores/[\w-]+/managers)",
    )
    .expect("valid recursive url regex")
});

/// Resolve a `kind:id` specifier to its admin-service path.
fn pattern_path(kind: &str, id: &str) -> String {
    match kind {
        "group" => format!("/emails/groups/{id}"),
        "user" => format!("/emails/users/{id}"),
        "store_merchants" => format!("/emails/stores/{id}/merchants"),
        "store_managers" => format!("/emails/stores/{id}/managers"),
        _ => unreachable!("pattern regex admits only known kinds"),
    }
}

/// Split a subscribers string into literal emails and pattern paths.
///
/// Tokens that are neither a literal email nor a known pattern are
/// discarded. Duplicates collapse.
pub fn parse_subscribers(subscribers: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut emails = BTreeSet::new();
    let mut paths = BTreeSet::new();

    for token in subscribers.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        if EMAIL_RE.is_match(token) {
            emails.insert(token.to_string());
        } else if let Some(captures) = PATTERN_RE.captures(token) {
            paths.insert(pattern_path(&captures[1], &captures[2]));
        } else {
            tracing::debug!(token, "unrecognized subscriber token discarded");
        }
    }

    (emails, paths)
}

/// Resolve a subscribers string to the final email set.
///
/// Pattern URLs are fetched concurrently; a failed fetch is logged and
/// contributes nothing.
pub async fn resolve_subscribers(
    client: &ApiClient,
    admin_base_url: &str,
    subscribers: &str,
) -> BTreeSet<String> {
    let (mut emails, paths) = parse_subscribers(subscribers);

    let fetches = paths.iter().map(|path| {
        let url = format!("{admin_base_url}{path}");
        async move { (url.clone(), client.get_emails(&url).await) }
    });

    for (url, result) in join_all(fetches).await {
        match result {
            Ok(fetched) => emails.extend(fetched),
            Err(err) => tracing::warn!(%url, %err, "subscriber email request failed"),
        }
    }

    emails
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xopay_notify_auth::{AuthSettings, TokenSigner};

    #[test]
    fn test_parse_partitions_emails_and_patterns() {
        let (emails, paths) =
            parse_subscribers("a@x.io, group:admin, user:32, store_merchants:s1, store_managers:s2");

        assert_eq!(emails.into_iter().collect::<Vec<_>>(), vec!["a@x.io"]);
        assert_eq!(
            paths.into_iter().collect::<Vec<_>>(),
            vec![
                "/emails/groups/admin",
                "/emails/stores/s1/merchants",
                "/emails/stores/s2/managers",
                "/emails/users/32",
            ]
        );
    }

    #[test]
    fn test_parse_discards_junk_tokens() {
        let (emails, paths) = parse_subscribers("not-an-email, owner:12, , a@x.io");
        assert_eq!(emails.len(), 1);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_parse_deduplicates() {
        let (emails, paths) = parse_subscribers("a@x.io, a@x.io, group:g1, group:g1");
        assert_eq!(emails.len(), 1);
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_recursive_url_shapes_are_detected() {
        assert!(RECURSIVE_URL_RE.is_match("text /emails/groups/admin text"));
        assert!(RECURSIVE_URL_RE.is_match("/emails/stores/s-1/managers"));
        assert!(!RECURSIVE_URL_RE.is_match("/emails/everything/else"));
    }

    proptest! {
        /// The parsed sets are invariant under permutation of the input.
        #[test]
        fn prop_parse_is_order_insensitive(mut tokens in proptest::collection::vec(
            prop_oneof![
                Just("a@x.io".to_string()),
                Just("b@y.io".to_string()),
                Just("group:admin".to_string()),
                Just("user:7".to_string()),
                Just("garbage".to_string()),
            ],
            0..8,
        )) {
            let joined = tokens.join(", ");
            let forward = parse_subscribers(&joined);

            tokens.reverse();
            let backward = parse_subscribers(&tokens.join(", "));

            prop_assert_eq!(forward, backward);
        }
    }

    #[tokio::test]
    async fn test_resolution_unions_literals_and_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/emails/groups/admin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"emails": ["ops@x.io", "a@x.io"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let signer = TokenSigner::new(&AuthSettings {
            key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let client = ApiClient::new(signer);

        let emails =
            resolve_subscribers(&client, &server.uri(), "a@x.io, group:admin").await;

        assert_eq!(
            emails.into_iter().collect::<Vec<_>>(),
            vec!["a@x.io", "ops@x.io"]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_literals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let signer = TokenSigner::new(&AuthSettings {
            key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let client = ApiClient::new(signer);

        let emails =
            resolve_subscribers(&client, &server.uri(), "a@x.io, group:admin").await;
        assert_eq!(emails.into_iter().collect::<Vec<_>>(), vec!["a@x.io"]);
    }
}
