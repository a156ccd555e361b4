//! Access token records
//!
//! The durable record of an issued access token. Persistence lives behind
//! the `TokenStore` seam; `InMemoryTokenStore` is the in-process store.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;

/// Kind of account a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Admin,
    System,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Admin, TokenKind::System];

    /// Table the record lives in; also the id prefix
    pub fn table(&self) -> &'static str {
        match self {
            TokenKind::Admin => "admin_access_tokens",
            TokenKind::System => "system_access_tokens",
        }
    }

    /// Short label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Admin => "admin",
            TokenKind::System => "system",
        }
    }

    /// Recover the kind from a token id such as `admin_access_tokens:<id>`
    pub fn from_id(id: &str) -> Option<Self> {
        let (table, _) = id.split_once(':')?;
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of an issued access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub id: String,
    pub kind: TokenKind,
    /// Account the token was issued to
    pub subject_id: String,
    /// `None` for tokens that never expire
    pub expired_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AccessTokenRecord {
    /// New unrevoked record with a fresh `<table>:<unique>` id
    pub fn issue(
        kind: TokenKind,
        subject_id: impl Into<String>,
        expired_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: format!("{}:{}", kind.table(), Uuid::new_v4().simple()),
            kind,
            subject_id: subject_id.into(),
            expired_at,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired_at.is_some_and(|exp| exp <= now)
    }
}

/// Durable token storage
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look a record up by id
    async fn find(&self, id: &str) -> AppResult<Option<AccessTokenRecord>>;

    /// Insert or replace a record
    async fn save(&self, record: &AccessTokenRecord) -> AppResult<()>;

    /// Records of `kind` that are revoked and have not yet expired at `now`
    async fn revoked_unexpired(
        &self,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<AccessTokenRecord>>;
}

/// Token store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<String, AccessTokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn find(&self, id: &str) -> AppResult<Option<AccessTokenRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn save(&self, record: &AccessTokenRecord) -> AppResult<()> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn revoked_unexpired(
        &self,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<AccessTokenRecord>> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|r| r.kind == kind && r.is_revoked() && !r.is_expired(now))
            .cloned()
            .collect())
    }
}
