//! Access token verification
//!
//! Signature and structural validation belong to the JWT collaborator.
//! `Authenticator` runs the checks that need shared state: expiry,
//! the revocation list and the account type claim.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::revocation::RevocationList;
use crate::error::{AppError, AppResult};

/// Account type carried in the `act` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Admin,
    System,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Admin => "admin",
            AccountType::System => "system",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accessors on an already-parsed access token
pub trait AccessToken {
    /// Token id (`jti`); also the revocation key
    fn id(&self) -> &str;

    fn subject(&self) -> &str;

    /// `None` when the token never expires
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    fn claim(&self, name: &str) -> Option<Value>;
}

/// Deserialized JWT claim set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub jti: String,
    pub sub: String,
    /// Expiry in unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl AccessToken for TokenClaims {
    fn id(&self) -> &str {
        &self.jti
    }

    fn subject(&self) -> &str {
        &self.sub
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    fn claim(&self, name: &str) -> Option<Value> {
        match name {
            "jti" => Some(Value::from(self.jti.clone())),
            "sub" => Some(Value::from(self.sub.clone())),
            "exp" => self.exp.map(Value::from),
            "act" => self.act.clone().map(Value::from),
            _ => self.extra.get(name).cloned(),
        }
    }
}

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

/// Bearer token from an optional Authorization header
///
/// A missing header or a non-bearer value is `Unauthorized`.
pub fn require_bearer_token(auth_header: Option<&str>) -> AppResult<&str> {
    auth_header
        .and_then(extract_bearer_token)
        .ok_or(AppError::Unauthorized)
}

/// Post-signature token checks
pub struct Authenticator {
    revocations: Arc<RevocationList>,
}

impl Authenticator {
    pub fn new(revocations: Arc<RevocationList>) -> Self {
        Self { revocations }
    }

    /// Accept a token issued to one of `allowed` account types
    ///
    /// Returns the matched account type.
    #[instrument(skip_all, fields(token_id = %token.id()))]
    pub async fn verify<T: AccessToken + ?Sized>(
        &self,
        token: &T,
        allowed: &[AccountType],
    ) -> AppResult<AccountType> {
        if token.expires_at().is_some_and(|exp| exp <= Utc::now()) {
            debug!("Rejected expired access token");
            return Err(AppError::TokenExpired);
        }

        if self.revocations.is_revoked(token.id()).await? {
            warn!(subject = %token.subject(), "Rejected revoked access token");
            return Err(AppError::TokenRevoked);
        }

        let act = token.claim("act");
        let act = act.as_ref().and_then(Value::as_str).unwrap_or_default();

        allowed
            .iter()
            .copied()
            .find(|account_type| account_type.as_str() == act)
            .ok_or(AppError::IncorrectAccountType)
    }
}
