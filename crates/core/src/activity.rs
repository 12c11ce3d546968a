//! Bounded log of catalog write and admin actions.
//!
//! Every recorded entry is also emitted as a structured event with
//! `target: "activity"`, so operators can route it via `RUST_LOG=activity=info`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Who performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// User reference, or `"anonymous"`.
    pub user: String,
    /// Client IP, or `"-"`.
    pub client_ip: String,
}

impl Actor {
    pub fn new(user: Option<&str>, client_ip: Option<&str>) -> Self {
        let clean = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            user: clean(user).unwrap_or_else(|| "anonymous".to_string()),
            client_ip: clean(client_ip).unwrap_or_else(|| "-".to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    /// The user reference to store in `createdBy`, if identified.
    pub fn user_ref(&self) -> Option<String> {
        (self.user != "anonymous").then(|| self.user.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// e.g. `content.create`, `content.delete`, `admin.snapshot`.
    pub action: String,
    /// Affected resource (record id, `batch`, `catalog`).
    pub resource: String,
    pub detail: String,
    pub outcome: Outcome,
}

/// Newest-first ring buffer of [`ActivityEntry`].
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Arc<RwLock<VecDeque<ActivityEntry>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    /// A capacity of zero keeps nothing in memory; events are still traced.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    pub fn record(
        &self,
        actor: &Actor,
        action: &str,
        resource: &str,
        detail: &str,
        outcome: Outcome,
    ) {
        tracing::info!(
            target: "activity",
            actor = %actor.user,
            client_ip = %actor.client_ip,
            action = %action,
            resource = %resource,
            detail = %detail,
            outcome = outcome.as_str(),
            "activity"
        );
        if self.capacity == 0 {
            return;
        }
        let entry = ActivityEntry {
            timestamp: Utc::now(),
            actor: actor.clone(),
            action: action.to_string(),
            resource: resource.to_string(),
            detail: detail.to_string(),
            outcome,
        };
        let mut entries = self.entries.write();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Up to `limit` entries, newest first, optionally for one user.
    pub fn recent(&self, limit: usize, user: Option<&str>) -> Vec<ActivityEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| user.map_or(true, |u| e.actor.user == u))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_defaults() {
        let actor = Actor::new(Some("  "), None);
        assert_eq!(actor.user, "anonymous");
        assert_eq!(actor.client_ip, "-");
        assert_eq!(actor.user_ref(), None);
        assert_eq!(Actor::new(Some("u7"), Some("10.0.0.1")).user_ref().as_deref(), Some("u7"));
    }

    #[test]
    fn test_log_is_newest_first_and_bounded() {
        let log = ActivityLog::new(2);
        let actor = Actor::anonymous();
        for i in 0..3 {
            log.record(&actor, "content.create", &i.to_string(), "", Outcome::Success);
        }
        assert_eq!(log.len(), 2);
        let recent = log.recent(10, None);
        assert_eq!(recent[0].resource, "2");
        assert_eq!(recent[1].resource, "1");
    }

    #[test]
    fn test_recent_filters_by_user() {
        let log = ActivityLog::default();
        log.record(&Actor::new(Some("alice"), None), "content.create", "a", "", Outcome::Success);
        log.record(&Actor::new(Some("bob"), None), "content.delete", "b", "", Outcome::Failure);
        let alice = log.recent(10, Some("alice"));
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].action, "content.create");
        assert_eq!(log.recent(1, None)[0].outcome, Outcome::Failure);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let log = ActivityLog::new(0);
        log.record(&Actor::anonymous(), "admin.snapshot", "catalog", "", Outcome::Success);
        assert!(log.is_empty());
    }
}
