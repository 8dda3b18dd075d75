//! Request-scoped metadata passed explicitly through every call.
//!
//! A [`RequestContext`] is an immutable, append-only association of keys to
//! values. Binding a key returns a new context that shares every earlier
//! binding with its parent, so contexts derived from the same request can be
//! handed to concurrent tasks freely.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::field;

pub const CORRELATION_ID: &str = "correlation_id";
pub const IP_ADDRESS: &str = "ip_address";
pub const SESSION_TOKEN: &str = "session_token";

#[derive(Clone, Default)]
pub struct RequestContext {
    bindings: Option<Arc<Binding>>,
    deadline: Option<Instant>,
}

struct Binding {
    key: &'static str,
    value: Arc<str>,
    parent: Option<Arc<Binding>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `key` bound to `value`. A later binding of
    /// the same key shadows the earlier one in the derived context only.
    pub fn with_value(&self, key: &'static str, value: impl Into<String>) -> Self {
        let binding = Binding {
            key,
            value: Arc::from(value.into()),
            parent: self.bindings.clone(),
        };
        Self {
            bindings: Some(Arc::new(binding)),
            deadline: self.deadline,
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        let mut current = self.bindings.as_deref();
        while let Some(binding) = current {
            if binding.key == key {
                return Some(&*binding.value);
            }
            current = binding.parent.as_deref();
        }
        None
    }

    pub fn with_correlation_id(&self, correlation_id: impl Into<String>) -> Self {
        self.with_value(CORRELATION_ID, correlation_id)
    }

    pub fn with_ip_address(&self, ip_address: impl Into<String>) -> Self {
        self.with_value(IP_ADDRESS, ip_address)
    }

    pub fn with_session_token(&self, session_token: impl Into<String>) -> Self {
        self.with_value(SESSION_TOKEN, session_token)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.value(CORRELATION_ID)
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.value(IP_ADDRESS)
    }

    pub fn session_token(&self) -> Option<&str> {
        self.value(SESSION_TOKEN)
    }

    /// A derived context can only tighten the deadline, never extend it.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            bindings: self.bindings.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The instant an operation started now and capped at `limit` must end by.
    pub fn effective_deadline(&self, limit: Duration) -> Instant {
        let capped = Instant::now() + limit;
        match self.deadline {
            Some(deadline) => capped.min(deadline),
            None => capped,
        }
    }

    /// Builds the span every event of `operation` should be emitted under.
    ///
    /// Only bound values are recorded. Fields left empty are skipped by the
    /// formatters, so an unbound IP never shows up as an empty string.
    pub fn span(&self, operation: &'static str) -> tracing::Span {
        let span = tracing::info_span!(
            "request",
            operation = %operation,
            correlation_id = field::Empty,
            ip_address = field::Empty,
            session_token = field::Empty,
        );
        for key in [CORRELATION_ID, IP_ADDRESS, SESSION_TOKEN] {
            if let Some(value) = self.value(key) {
                span.record(key, field::display(value));
            }
        }
        span
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("correlation_id", &self.correlation_id())
            .field("ip_address", &self.ip_address())
            .field("session_token", &self.session_token().map(|_| "[REDACTED]"))
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn absent_keys_read_as_none() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.correlation_id(), None);
        assert_eq!(ctx.value("anything"), None);
    }

    #[test]
    fn binding_does_not_touch_the_parent() {
        let parent = RequestContext::new().with_correlation_id("abc123");
        let child = parent.with_ip_address("10.0.0.1");

        assert_eq!(parent.ip_address(), None);
        assert_eq!(child.ip_address(), Some("10.0.0.1"));
        assert_eq!(child.correlation_id(), Some("abc123"));
    }

    #[test]
    fn later_bindings_shadow_earlier_ones() {
        let parent = RequestContext::new().with_correlation_id("first");
        let child = parent.with_correlation_id("second");

        assert_eq!(child.correlation_id(), Some("second"));
        assert_eq!(parent.correlation_id(), Some("first"));
    }

    #[test]
    fn deadlines_only_tighten() {
        let soon = Instant::now() + Duration::from_millis(50);
        let later = soon + Duration::from_secs(60);
        let ctx = RequestContext::new().with_deadline(soon).with_deadline(later);

        assert_eq!(ctx.deadline(), Some(soon));
    }

    #[test]
    fn effective_deadline_never_exceeds_the_limit() {
        let limit = Duration::from_secs(5);
        let before = Instant::now();
        let unbounded = RequestContext::new().effective_deadline(limit);
        assert!(unbounded >= before + limit);
        assert!(unbounded <= Instant::now() + limit);

        let ctx = RequestContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.effective_deadline(limit) <= Instant::now() + limit);

        let past = Instant::now() - Duration::from_secs(1);
        let ctx = RequestContext::new().with_deadline(past);
        assert_eq!(ctx.effective_deadline(limit), past);
    }

    #[test]
    fn debug_redacts_the_session_token() {
        let ctx = RequestContext::new().with_session_token("bearer-secret");
        assert!(!format!("{ctx:?}").contains("bearer-secret"));
    }

    #[quickcheck]
    fn contexts_shared_across_threads_keep_their_bindings(values: Vec<String>) -> bool {
        let base = RequestContext::new().with_correlation_id("root");
        let handles: Vec<_> = values
            .into_iter()
            .map(|value| {
                let base = base.clone();
                std::thread::spawn(move || {
                    let derived = base.with_ip_address(value.clone());
                    derived.ip_address() == Some(value.as_str())
                        && derived.correlation_id() == Some("root")
                })
            })
            .collect();

        handles.into_iter().all(|h| h.join().unwrap_or(false)) && base.ip_address().is_none()
    }
}
