use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::SessionError;

/// Number of random bytes in a session id (256 bits)
pub const SESSION_ID_BYTES: usize = 32;

/// Where session ids come from
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> Result<String, SessionError>;
}

/// Whether `id` has the shape of an issued session id (lowercase hex, 64 chars)
pub fn is_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_BYTES * 2 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Hex-encoded bytes from the operating system's CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn generate(&self) -> Result<String, SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::RandomSource(e.to_string()))?;
        Ok(hex::encode(bytes))
    }
}
