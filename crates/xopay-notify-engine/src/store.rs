//! Rule persistence behind a storage trait.
//!
//! The engine and the admin surface share one [`RuleStore`]. Removal is
//! idempotent so quarantine and a concurrent admin delete cannot race into
//! an error.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::rule::NotifyRule;

/// Storage trait for notification rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All persisted rules, in no particular order.
    async fn load_all(&self) -> Result<Vec<NotifyRule>, StoreError>;

    /// Look up one rule by id.
    async fn get(&self, id: &str) -> Result<Option<NotifyRule>, StoreError>;

    /// Persist a new rule. The id must be unique.
    async fn insert(&self, rule: NotifyRule) -> Result<(), StoreError>;

    /// Replace an existing rule. Returns false when the id is unknown.
    async fn update(&self, rule: NotifyRule) -> Result<bool, StoreError>;

    /// Remove a rule. Returns false when it was already gone.
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;
}

/// In-memory rule store.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<String, NotifyRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn load_all(&self) -> Result<Vec<NotifyRule>, StoreError> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<NotifyRule>, StoreError> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn insert(&self, rule: NotifyRule) -> Result<(), StoreError> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(StoreError::Conflict(rule.id));
        }
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn update(&self, rule: NotifyRule) -> Result<bool, StoreError> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.rules.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> NotifyRule {
        NotifyRule {
            id: id.to_string(),
            name: "rule name".to_string(),
            case_regex: "ok".to_string(),
            case_template: "ok".to_string(),
            header_template: "hi".to_string(),
            body_template: "body".to_string(),
            subscribers_template: "a@x.io".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r-1")).await.unwrap();

        assert!(store.get("r-1").await.unwrap().is_some());
        assert!(store.remove("r-1").await.unwrap());
        assert!(store.get("r-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r-1")).await.unwrap();

        assert!(store.remove("r-1").await.unwrap());
        assert!(!store.remove("r-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r-1")).await.unwrap();

        assert!(matches!(
            store.insert(rule("r-1")).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_rule_is_false() {
        let store = MemoryRuleStore::new();
        assert!(!store.update(rule("r-404")).await.unwrap());
    }
}
