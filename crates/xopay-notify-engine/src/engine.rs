//! The notification engine: cache, pipeline, quarantine.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::future::join_all;
use regex::Regex;
use serde_json::Value;

use xopay_notify_delivery::{ApiClient, Mailer};

use crate::error::EngineError;
use crate::rule::{NotifyRule, RenderedNotifyNode};
use crate::store::RuleStore;
use crate::subscribers::{resolve_subscribers, RECURSIVE_URL_RE};

/// In-memory rule engine fed by the request queue.
///
/// The rule cache is an atomically swapped snapshot: readers observe either
/// the pre- or post-reload rule set, never a torn state. Compiled regexes
/// are memoized by source string for the process lifetime; quarantining a
/// rule drops its entry.
pub struct NotifyEngine {
    store: Arc<dyn RuleStore>,
    cache: ArcSwap<Vec<NotifyRule>>,
    compiled_regex: DashMap<String, Regex>,
    templates: minijinja::Environment<'static>,
    client: ApiClient,
    mailer: Arc<dyn Mailer>,
    admin_base_url: String,
}

impl NotifyEngine {
    pub fn new(
        store: Arc<dyn RuleStore>,
        client: ApiClient,
        mailer: Arc<dyn Mailer>,
        admin_base_url: String,
    ) -> Self {
        Self {
            store,
            cache: ArcSwap::from_pointee(Vec::new()),
            compiled_regex: DashMap::new(),
            templates: minijinja::Environment::new(),
            client,
            mailer,
            admin_base_url,
        }
    }

    /// Replace the cache with the store contents.
    ///
    /// Called at startup and after every admin mutation. Uses an atomic
    /// pointer swap so in-flight events keep their snapshot.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let rules = self.store.load_all().await?;
        tracing::info!(count = rules.len(), "notify rules loaded");
        self.cache.store(Arc::new(rules));
        Ok(())
    }

    /// Current cache snapshot.
    pub fn rules(&self) -> Arc<Vec<NotifyRule>> {
        self.cache.load_full()
    }

    /// Process one event from the request queue.
    ///
    /// Renders every cached rule, selects the matching nodes and dispatches
    /// them concurrently. Broken rules are quarantined along the way.
    pub async fn handle_event(&self, event: &Value) {
        let snapshot = self.cache.load_full();

        let mut matched = Vec::new();
        for rule in snapshot.iter() {
            let node = match self.render(rule, event) {
                Ok(node) => node,
                Err(err) => {
                    tracing::warn!(rule = %rule.name, %err, "rule template render error");
                    self.quarantine(rule).await;
                    continue;
                }
            };

            match self.matches(rule, &node).await {
                Some(true) => matched.push(node),
                Some(false) => {}
                // Compile failure; the rule is already quarantined.
                None => {}
            }
        }

        if !matched.is_empty() {
            join_all(matched.into_iter().map(|node| self.dispatch(node))).await;
        }
    }

    /// Render every template of a rule with the event as context.
    fn render(
        &self,
        rule: &NotifyRule,
        event: &Value,
    ) -> Result<RenderedNotifyNode, minijinja::Error> {
        let fill = |template: &str| self.templates.render_str(template, event);

        Ok(RenderedNotifyNode {
            id: rule.id.clone(),
            name: rule.name.clone(),
            case_regex: rule.case_regex.clone(),
            case: fill(&rule.case_template)?,
            header: fill(&rule.header_template)?,
            body: fill(&rule.body_template)?,
            subscribers: fill(&rule.subscribers_template)?,
        })
    }

    /// Check a rendered node against its rule regex.
    ///
    /// Returns `None` when the regex failed to compile (the rule is
    /// quarantined), otherwise whether the node was selected. The match is
    /// anchored at the start of the rendered case.
    async fn matches(&self, rule: &NotifyRule, node: &RenderedNotifyNode) -> Option<bool> {
        if !self.compiled_regex.contains_key(&node.case_regex) {
            match Regex::new(&node.case_regex) {
                Ok(regex) => {
                    self.compiled_regex.insert(node.case_regex.clone(), regex);
                }
                Err(err) => {
                    tracing::warn!(rule = %node.name, %err, "rule regex compile error");
                    self.quarantine(rule).await;
                    return None;
                }
            }
        }

        if RECURSIVE_URL_RE.is_match(&node.case) {
            tracing::warn!(rule = %node.name, case = %node.case, "recursive url in rendered case");
            return Some(false);
        }

        let regex = self.compiled_regex.get(&node.case_regex)?;
        Some(
            regex
                .find(&node.case)
                .map_or(false, |found| found.start() == 0),
        )
    }

    /// Resolve a node's subscribers and send one mail per email.
    async fn dispatch(&self, node: RenderedNotifyNode) {
        let emails =
            resolve_subscribers(&self.client, &self.admin_base_url, &node.subscribers).await;

        if emails.is_empty() {
            tracing::warn!(
                rule = %node.name,
                subscribers = %node.subscribers,
                "no emails found for notification"
            );
            return;
        }

        tracing::info!(rule = %node.name, count = emails.len(), "send notification");
        join_all(
            emails
                .iter()
                .map(|email| self.mailer.send(email, &node.header, &node.body)),
        )
        .await;
    }

    /// Remove a broken rule from the cache and the store.
    ///
    /// Idempotent: the rule may already be gone from either place.
    async fn quarantine(&self, rule: &NotifyRule) {
        tracing::warn!(rule = %rule.name, id = %rule.id, "remove bad notify rule from storage");

        self.cache.rcu(|rules| {
            rules
                .iter()
                .filter(|r| r.id != rule.id)
                .cloned()
                .collect::<Vec<_>>()
        });
        self.compiled_regex.remove(&rule.case_regex);

        match self.store.remove(&rule.id).await {
            Ok(_) => {}
            Err(err) => tracing::error!(id = %rule.id, %err, "failed to remove rule from store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xopay_notify_auth::{AuthSettings, TokenSigner};
    use xopay_notify_delivery::RecordingMailer;

    use crate::store::MemoryRuleStore;

    fn rule(id: &str) -> NotifyRule {
        NotifyRule {
            id: id.to_string(),
            name: format!("rule {id}"),
            case_regex: r"xopay-admin:/api/admin/dev/test/\d+:200".to_string(),
            case_template: "{{service_name}}:{{query.path}}:{{query.status_code}}".to_string(),
            header_template: "Hello {{service_name}}".to_string(),
            body_template: "path={{query.path}}".to_string(),
            subscribers_template: "a@x.io, group:admin".to_string(),
        }
    }

    fn event() -> Value {
        json!({
            "service_name": "xopay-admin",
            "query": {"path": "/api/admin/dev/test/42", "status_code": 200}
        })
    }

    async fn engine_with(
        rules: Vec<NotifyRule>,
        admin_base_url: String,
    ) -> (NotifyEngine, Arc<MemoryRuleStore>, Arc<RecordingMailer>) {
        let store = Arc::new(MemoryRuleStore::new());
        for rule in rules {
            store.insert(rule).await.unwrap();
        }

        let signer = TokenSigner::new(&AuthSettings {
            key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let mailer = Arc::new(RecordingMailer::new());

        let engine = NotifyEngine::new(
            store.clone(),
            ApiClient::new(signer),
            mailer.clone(),
            admin_base_url,
        );
        engine.reload().await.unwrap();

        (engine, store, mailer)
    }

    #[tokio::test]
    async fn test_matched_rule_fans_out_to_resolved_subscribers() {
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

        let (engine, _store, mailer) = engine_with(vec![rule("r-1")], server.uri()).await;
        engine.handle_event(&event()).await;

        let mut sent = mailer.sent();
        sent.sort();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "a@x.io");
        assert_eq!(sent[1].0, "ops@x.io");
        for (_, subject, body) in sent {
            assert_eq!(subject, "Hello xopay-admin");
            assert_eq!(body, "path=/api/admin/dev/test/42");
        }
    }

    #[tokio::test]
    async fn test_unmatched_rule_sends_nothing() {
        let server = MockServer::start().await;
        let (engine, _store, mailer) = engine_with(vec![rule("r-1")], server.uri()).await;

        engine
            .handle_event(&json!({
                "service_name": "xopay-client",
                "query": {"path": "/other", "status_code": 404}
            }))
            .await;

        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_match_is_anchored_at_start() {
        let server = MockServer::start().await;
        let mut prefixed = rule("r-1");
        prefixed.case_regex = "admin".to_string();
        prefixed.case_template = "{{service_name}}".to_string();
        let (engine, _store, mailer) = engine_with(vec![prefixed], server.uri()).await;

        // "xopay-admin" contains "admin" but not at the start.
        engine.handle_event(&event()).await;
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_quarantines_the_rule() {
        let server = MockServer::start().await;
        let mut broken = rule("r-bad");
        broken.body_template = "{{ query.path".to_string();
        let (engine, store, mailer) = engine_with(vec![broken], server.uri()).await;

        engine.handle_event(&event()).await;

        assert!(engine.rules().is_empty());
        assert!(store.get("r-bad").await.unwrap().is_none());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_regex_compile_failure_quarantines_the_rule() {
        let server = MockServer::start().await;
        let mut broken = rule("r-bad");
        broken.case_regex = "*invalid".to_string();
        let (engine, store, _mailer) = engine_with(vec![broken], server.uri()).await;

        engine.handle_event(&event()).await;

        assert!(engine.rules().is_empty());
        assert!(store.get("r-bad").await.unwrap().is_none());

        // A later event must not resurrect it.
        engine.handle_event(&event()).await;
        assert!(engine.rules().is_empty());
    }

    #[tokio::test]
    async fn test_recursive_url_rejects_node_but_keeps_rule() {
        let server = MockServer::start().await;
        let mut guarded = rule("r-1");
        guarded.case_regex = ".*".to_string();
        guarded.case_template = "{{query.path}}".to_string();
        let (engine, store, mailer) = engine_with(vec![guarded], server.uri()).await;

        engine
            .handle_event(&json!({"query": {"path": "/emails/groups/admin"}}))
            .await;

        assert!(mailer.sent().is_empty());
        assert_eq!(engine.rules().len(), 1);
        assert!(store.get("r-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_broken_rule_does_not_stop_healthy_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/emails/groups/admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"emails": []})))
            .mount(&server)
            .await;

        let mut broken = rule("r-bad");
        broken.case_template = "{{ oops".to_string();
        let (engine, _store, mailer) = engine_with(vec![broken, rule("r-ok")], server.uri()).await;

        engine.handle_event(&event()).await;

        // The healthy rule still matched and sent to its literal subscriber.
        assert_eq!(engine.rules().len(), 1);
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].0, "a@x.io");
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let server = MockServer::start().await;
        let (engine, _store, _mailer) = engine_with(vec![rule("r-1")], server.uri()).await;

        let rules = engine.rules();
        let first = engine.render(&rules[0], &event()).unwrap();
        let second = engine.render(&rules[0], &event()).unwrap();
        assert_eq!(first, second);
    }
}
