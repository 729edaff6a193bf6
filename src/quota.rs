//! Per-user daily usage quotas.
//!
//! Each identity carries a keyword quota that resets at the UTC date
//! boundary. Only domain-related queries consume quota; chit-chat passes
//! through uncounted. All mutation happens under a single async mutex so
//! check-and-consume is atomic: two concurrent requests cannot both succeed
//! on the last remaining unit.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// The identity used when no explicit user is supplied.
pub const ANONYMOUS_USER: &str = "anonymous";

/// User class, determining the daily quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserClass {
    /// Unregistered identity with a small fixed quota.
    Anonymous,
    /// Registered identity with a larger fixed quota.
    Registered,
}

/// A persisted per-user quota record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// Identity key.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// User class.
    pub class: UserClass,
    /// Remaining quota units for the current day.
    pub remaining: u32,
    /// Units consumed today.
    pub used_today: u32,
    /// Cumulative domain-related queries across all days.
    pub total_queries: u64,
    /// The UTC date the quota was last reset.
    pub last_reset: NaiveDate,
    /// Inactive accounts are rejected outright.
    pub active: bool,
}

impl UserRecord {
    fn new(user_id: &str, class: UserClass, daily_quota: u32, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: if user_id == ANONYMOUS_USER {
                "Anonymous User".to_string()
            } else {
                user_id.to_string()
            },
            class,
            remaining: daily_quota,
            used_today: 0,
            total_queries: 0,
            last_reset: today,
            active: true,
        }
    }
}

/// The outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// A unit was consumed; `remaining` is the balance after consumption.
    Allowed {
        /// Quota units left today.
        remaining: u32,
    },
    /// The query was not domain-related (or limits are disabled); nothing
    /// was consumed.
    NotCounted,
    /// Quota is exhausted (or the account is inactive); the request must be
    /// rejected with a quota-exceeded response, not an error.
    Exhausted,
}

/// Durable storage for quota records.
///
/// The tracker owns the in-memory working set; the store only loads it at
/// startup and persists it after mutations.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Load all records, keyed by user id.
    async fn load_all(&self) -> Result<HashMap<String, UserRecord>>;

    /// Persist all records.
    async fn persist(&self, records: &HashMap<String, UserRecord>) -> Result<()>;
}

/// A no-persistence store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore;

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn load_all(&self) -> Result<HashMap<String, UserRecord>> {
        Ok(HashMap::new())
    }

    async fn persist(&self, _records: &HashMap<String, UserRecord>) -> Result<()> {
        Ok(())
    }
}

/// A JSON-file-backed store (`users.json`).
#[derive(Debug)]
pub struct JsonFileQuotaStore {
    path: PathBuf,
}

impl JsonFileQuotaStore {
    /// Create a store backed by the given file path. The file is created on
    /// first persist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuotaStore for JsonFileQuotaStore {
    async fn load_all(&self) -> Result<HashMap<String, UserRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| Error::QuotaStore(format!("failed to parse {:?}: {e}", self.path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::QuotaStore(format!("failed to read {:?}: {e}", self.path))),
        }
    }

    async fn persist(&self, records: &HashMap<String, UserRecord>) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| Error::QuotaStore(format!("failed to serialize records: {e}")))?;
        // Write-then-rename, so a crash mid-write never leaves a truncated
        // file behind.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| Error::QuotaStore(format!("failed to write {tmp:?}: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::QuotaStore(format!("failed to replace {:?}: {e}", self.path)))
    }
}

/// Per-user-class quota settings.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    /// Daily quota for anonymous users.
    pub anonymous_daily: u32,
    /// Daily quota for registered users.
    pub registered_daily: u32,
    /// Master switch; when false every query is [`QuotaDecision::NotCounted`].
    pub enabled: bool,
}

/// Tracks and gates per-user daily usage.
pub struct UsageTracker {
    policy: QuotaPolicy,
    store: Box<dyn QuotaStore>,
    records: Mutex<HashMap<String, UserRecord>>,
}

impl UsageTracker {
    /// Create a tracker, loading existing records from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaStore`] if the store cannot be read.
    pub async fn new(policy: QuotaPolicy, store: Box<dyn QuotaStore>) -> Result<Self> {
        let records = store.load_all().await?;
        if !records.is_empty() {
            info!(users = records.len(), "loaded quota records");
        }
        Ok(Self { policy, store, records: Mutex::new(records) })
    }

    /// Atomically check and, when the query counts, consume one quota unit.
    ///
    /// Quota consumption happens here, at classification time; it is not
    /// refunded if a later pipeline stage fails.
    pub async fn check_and_consume(
        &self,
        user_id: &str,
        domain_related: bool,
    ) -> Result<QuotaDecision> {
        self.check_and_consume_at(user_id, domain_related, Utc::now().date_naive()).await
    }

    /// [`check_and_consume`](Self::check_and_consume) with an explicit date,
    /// so the daily boundary is testable.
    pub async fn check_and_consume_at(
        &self,
        user_id: &str,
        domain_related: bool,
        today: NaiveDate,
    ) -> Result<QuotaDecision> {
        if !self.policy.enabled || !domain_related {
            return Ok(QuotaDecision::NotCounted);
        }

        let mut records = self.records.lock().await;
        let record = records.entry(user_id.to_string()).or_insert_with(|| {
            let class = if user_id == ANONYMOUS_USER {
                UserClass::Anonymous
            } else {
                UserClass::Registered
            };
            UserRecord::new(user_id, class, self.daily_quota(class), today)
        });

        if record.last_reset != today {
            record.remaining = self.daily_quota(record.class);
            record.used_today = 0;
            record.last_reset = today;
            debug!(user = user_id, "daily quota reset");
        }

        if !record.active {
            return Ok(QuotaDecision::Exhausted);
        }
        if record.remaining == 0 {
            debug!(user = user_id, "quota exhausted");
            return Ok(QuotaDecision::Exhausted);
        }

        record.remaining -= 1;
        record.used_today += 1;
        record.total_queries += 1;
        let remaining = record.remaining;

        // Persist while still holding the lock, so on-disk state never runs
        // ahead of a concurrent consume.
        if let Err(e) = self.store.persist(&records).await {
            warn!(error = %e, "failed to persist quota records");
        }

        Ok(QuotaDecision::Allowed { remaining })
    }

    /// Remaining quota for a user without consuming, applying the daily
    /// reset first. Unknown users report their class default.
    pub async fn remaining(&self, user_id: &str) -> u32 {
        self.remaining_at(user_id, Utc::now().date_naive()).await
    }

    async fn remaining_at(&self, user_id: &str, today: NaiveDate) -> u32 {
        let records = self.records.lock().await;
        match records.get(user_id) {
            Some(record) if record.last_reset == today => record.remaining,
            Some(record) => self.daily_quota(record.class),
            None if user_id == ANONYMOUS_USER => self.policy.anonymous_daily,
            None => self.policy.registered_daily,
        }
    }

    /// A snapshot of a user's record, if one exists.
    pub async fn usage_stats(&self, user_id: &str) -> Option<UserRecord> {
        self.records.lock().await.get(user_id).cloned()
    }

    fn daily_quota(&self, class: UserClass) -> u32 {
        match class {
            UserClass::Anonymous => self.policy.anonymous_daily,
            UserClass::Registered => self.policy.registered_daily,
        }
    }
}
