//! # xopay-notify-engine
//!
//! The event-driven notification engine. Incoming events from the request
//! queue are run against a cached set of template rules: every rule's
//! templates are rendered with the event as context, the rendered case is
//! matched against the rule's regex, and matched rules fan out mails to
//! their resolved subscribers.
//!
//! Rules whose templates or regexes are broken are quarantined: removed
//! from the cache and the backing store so they cannot poison later events.

pub mod engine;
pub mod error;
pub mod rule;
pub mod store;
pub mod subscribers;

pub use engine::NotifyEngine;
pub use error::{EngineError, StoreError};
pub use rule::{NotifyRule, RenderedNotifyNode};
pub use store::{MemoryRuleStore, RuleStore};
