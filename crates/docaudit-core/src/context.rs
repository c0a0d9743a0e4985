//! Request-scoped context
//!
//! Carries the per-request values that end up in audit log entries (client
//! address, user agent, acting user) and the cancellation signal that store
//! adapters must honor.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Well-known context keys
pub mod keys {
    /// Client IP address
    pub const IP_ADDR: &str = "ip_addr";
    /// Client user agent
    pub const USER_AGENT: &str = "user_agent";
    /// Acting user id
    pub const USER_ID: &str = "user_id";
    /// Acting user's role
    pub const ROLE: &str = "role";
    /// Request URL
    pub const URL: &str = "url";
}

/// Value returned for missing or non-string context entries
pub const DEFAULT_FALLBACK: &str = "default";

/// Request-scoped values plus a cancellation signal
///
/// Clones share the cancellation flag, so cancelling any clone cancels all
/// of them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    values: HashMap<String, Value>,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Empty context, never cancelled
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Attach a value
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Fail adapter calls once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set a value in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for `key`, or `"default"`
    pub fn value(&self, key: &str) -> String {
        self.value_or(key, DEFAULT_FALLBACK)
    }

    /// String value for `key`, or `fallback`
    ///
    /// A missing key, a non-string value and an empty string all yield the
    /// fallback.
    pub fn value_or(&self, key: &str, fallback: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Signal cancellation to every clone of this context
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the context was cancelled or its deadline has passed
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Err(Cancelled)` once the context is cancelled or expired
    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Error::cancelled("request context cancelled"));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Error::cancelled("request context deadline exceeded"));
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_fallbacks() {
        let ctx = RequestContext::new()
            .with_value(keys::IP_ADDR, "10.0.0.1")
            .with_value(keys::USER_ID, 42)
            .with_value(keys::ROLE, "");

        assert_eq!(ctx.value(keys::IP_ADDR), "10.0.0.1");
        assert_eq!(ctx.value(keys::USER_ID), "default");
        assert_eq!(ctx.value(keys::ROLE), "default");
        assert_eq!(ctx.value(keys::USER_AGENT), "default");
        assert_eq!(ctx.get(keys::USER_ID), Some(&json!(42)));
    }

    #[test]
    fn test_custom_fallback() {
        let ctx = RequestContext::new().with_value(keys::URL, "/users/7");
        assert_eq!(ctx.value_or(keys::URL, "unknown"), "/users/7");
        assert_eq!(ctx.value_or(keys::USER_AGENT, "unknown"), "unknown");
    }

    #[test]
    fn test_cancel_shared_between_clones() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        assert!(ctx.check().is_ok());

        clone.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(Error::Cancelled(_))));
    }

    #[test]
    fn test_deadline() {
        let expired = RequestContext::new().with_timeout(Duration::ZERO);
        assert!(expired.is_cancelled());
        assert!(matches!(expired.check(), Err(Error::Cancelled(_))));

        let live = RequestContext::new().with_timeout(Duration::from_secs(60));
        assert!(live.check().is_ok());
    }
}
