//! Request-scoped actor context for the activity log.
//!
//! [`activity_context_middleware`](super::activity_context_middleware) inserts
//! an [`ActivityContext`] into request extensions for every route. There is
//! no authentication: the actor is whatever the caller names in `X-User-Id`.

use catalogdb_core::activity::{ActivityLog, Actor, Outcome};

/// Header naming the acting user.
pub const USER_HEADER: &str = "x-user-id";

/// Identity and request context for activity logging.
#[derive(Clone, Debug)]
pub struct ActivityContext {
    pub actor: Actor,
}

impl ActivityContext {
    pub fn from_request(req: &axum::http::Request<axum::body::Body>) -> Self {
        let user = req
            .headers()
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok());
        let client_ip = extract_client_ip(req);
        Self {
            actor: Actor::new(user, Some(&client_ip)),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            actor: Actor::anonymous(),
        }
    }

    /// User reference stored as `createdBy` on new records.
    pub fn created_by(&self) -> Option<String> {
        self.actor.user_ref()
    }

    pub fn success(&self, log: &ActivityLog, action: &str, resource: &str, detail: &str) {
        log.record(&self.actor, action, resource, detail, Outcome::Success);
    }

    pub fn failure(&self, log: &ActivityLog, action: &str, resource: &str, detail: &str) {
        log.record(&self.actor, action, resource, detail, Outcome::Failure);
    }
}

/// Extract client IP from request headers (X-Forwarded-For → X-Real-IP → "-").
pub fn extract_client_ip(req: &axum::http::Request<axum::body::Body>) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "-".to_string())
}
