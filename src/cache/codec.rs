//! Value codec
//!
//! Every value stored through the façade is JSON-encoded with serde, so
//! any `Serialize`/`DeserializeOwned` shape round-trips without per-type
//! encoding at call sites. The byte layout never leaves this crate.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, CacheResult};

/// Encode a value to bytes
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(CacheError::Encoding)
}

/// Decode bytes produced by `encode` back into `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(CacheError::Decoding)
}

/// Whether a decode error came from empty or truncated input
///
/// Prefix scans skip such entries instead of failing the whole scan.
/// Only truncated strings and containers are detectable: a number carries
/// no terminator, so a cut-off `1700000000` still decodes as `17000`.
/// Truncated input of the wrong shape, such as `[1,2` read as an integer,
/// is a shape mismatch rather than an incomplete value.
pub fn is_incomplete(err: &CacheError) -> bool {
    match err {
        CacheError::Decoding(e) => e.is_eof(),
        _ => false,
    }
}
