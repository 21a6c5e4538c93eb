//! Usage: Nonce generation for correlating login attempts with callbacks.

use crate::shared::error::{AppError, AppResult, CODE_NONCE_INIT_FAILURE};
use rand::rngs::OsRng;
use rand::RngCore;

const NONCE_BYTES: usize = 32;

/// Source of unguessable, URL-safe correlation tokens. `init` may be slow
/// (entropy pool warmup on some platforms) and is called off the async
/// runtime; `generate` is expected to be cheap afterwards.
pub trait NonceSource: Send + Sync {
    fn init(&self) -> AppResult<()>;
    fn generate(&self) -> AppResult<String>;
}

/// OS CSPRNG-backed source; 32 random bytes, base64url without padding.
#[derive(Default)]
pub struct OsRandomNonceSource;

impl OsRandomNonceSource {
    pub fn new() -> Self {
        Self
    }
}

impl NonceSource for OsRandomNonceSource {
    fn init(&self) -> AppResult<()> {
        // Probe the RNG once so a broken entropy source fails loudly at
        // startup instead of mid-login.
        let mut probe = [0u8; 1];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(|e| nonce_err(format!("os rng unavailable: {e}")))?;
        Ok(())
    }

    fn generate(&self) -> AppResult<String> {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| nonce_err(format!("os rng failed: {e}")))?;
        Ok(encode_nonce(&bytes))
    }
}

fn encode_nonce(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn nonce_err(message: String) -> AppError {
    AppError::new(CODE_NONCE_INIT_FAILURE, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_nonces_are_url_safe_and_unpadded() {
        let source = OsRandomNonceSource::new();
        let nonce = source.generate().unwrap();
        assert!(!nonce.is_empty());
        assert!(nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!nonce.ends_with('='));
    }

    #[test]
    fn consecutive_nonces_differ() {
        let source = OsRandomNonceSource::new();
        let a = source.generate().unwrap();
        let b = source.generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn encode_nonce_is_deterministic_for_fixed_input() {
        assert_eq!(encode_nonce(&[0u8; 3]), "AAAA");
    }

    #[test]
    fn init_succeeds_on_host_platform() {
        assert!(OsRandomNonceSource::new().init().is_ok());
    }
}
