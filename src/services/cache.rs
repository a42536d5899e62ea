//! In-memory reply cache and per-day call budget for remote services.
//!
//! Successful replies are reusable within a per-service TTL, and a service
//! with a configured daily limit stops calling out once the budget is
//! spent for the (UTC) day; the fallback chain answers instead. Both
//! mechanisms are off unless configured.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
struct CachedReply {
    reply: String,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ServiceCache {
    replies: Mutex<HashMap<String, CachedReply>>,
    /// service → (UTC day stamp, calls made that day)
    calls: Mutex<HashMap<String, (String, u32)>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached reply for `(service, input)` younger than `ttl_secs`.
    /// A zero TTL disables caching for the service.
    pub fn lookup(&self, service: &str, input: &str, ttl_secs: u64, now: DateTime<Utc>) -> Option<String> {
        if ttl_secs == 0 {
            return None;
        }
        let replies = self.replies.lock().expect("service cache lock poisoned");
        let hit = replies.get(&cache_key(service, input))?;
        let age = now.signed_duration_since(hit.stored_at).num_seconds();
        if age >= 0 && (age as u64) < ttl_secs {
            Some(hit.reply.clone())
        } else {
            None
        }
    }

    pub fn store(&self, service: &str, input: &str, reply: String, now: DateTime<Utc>) {
        self.replies
            .lock()
            .expect("service cache lock poisoned")
            .insert(cache_key(service, input), CachedReply { reply, stored_at: now });
    }

    /// Spend one call from the service's daily budget. Returns false when
    /// the budget for the current UTC day is exhausted.
    pub fn try_consume(&self, service: &str, daily_limit: Option<u32>, now: DateTime<Utc>) -> bool {
        let Some(limit) = daily_limit else {
            return true;
        };
        let today = now.format("%Y-%m-%d").to_string();
        let mut calls = self.calls.lock().expect("service cache lock poisoned");
        let entry = calls.entry(service.to_string()).or_insert_with(|| (today.clone(), 0));
        if entry.0 != today {
            *entry = (today, 0);
        }
        if entry.1 >= limit {
            return false;
        }
        entry.1 += 1;
        true
    }
}

fn cache_key(service: &str, input: &str) -> String {
    format!("{}\u{1}{}", service.to_lowercase(), input)
}
