//! Cache key namespaces
//!
//! Keys follow `<domain>:<discriminator>` so prefix scans of one domain
//! never pick up another domain's entries.

/// Revocation marker for an access token
pub fn revoked_token(token_id: &str) -> String {
    format!("auth:revoked_{}", token_id)
}

/// One-time verification code for a (medium, credential) pair
pub fn auth_code(medium: &str, credential: &str, code: &str) -> String {
    format!("{}:{}", auth_code_prefix(medium, credential), code)
}

/// Prefix shared by every code issued to a (medium, credential) pair
pub fn auth_code_prefix(medium: &str, credential: &str) -> String {
    format!("auth:code_{}_{}", medium, credential)
}

/// Rate limiter prefix for a namespace and ordered id tuple
pub fn rate_limit_prefix<S: AsRef<str>>(namespace: &str, ids: &[S]) -> String {
    let joined = ids
        .iter()
        .map(|id| id.as_ref())
        .collect::<Vec<_>>()
        .join("_");
    format!("rl:{}:{}", namespace, joined)
}

/// One recorded attempt under a rate limiter prefix
pub fn rate_limit_attempt(prefix: &str, unix_seconds: i64) -> String {
    format!("{}:{}", prefix, unix_seconds)
}
