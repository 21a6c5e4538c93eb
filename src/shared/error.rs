//! Usage: Unified error model (maps internal failures to `CODE: message` strings).

use std::sync::Arc;

pub type AppResult<T> = Result<T, AppError>;

/// Login attempt aborted by the user (or an equivalent timeout).
pub const CODE_CANCELLED: &str = "AUTH_CANCELLED";
/// The browser-side flow reported an explicit error string.
pub const CODE_REMOTE_ERROR: &str = "AUTH_REMOTE_ERROR";
/// Inbound activation URI could not be parsed or lacked required parameters.
pub const CODE_MALFORMED_CALLBACK: &str = "AUTH_MALFORMED_CALLBACK";
/// Provider torn down while exchanges were still pending.
pub const CODE_PROVIDER_DISPOSED: &str = "AUTH_PROVIDER_DISPOSED";
/// The nonce-generation facility failed to initialize or produce output.
pub const CODE_NONCE_INIT_FAILURE: &str = "NONCE_INIT_FAILURE";
/// The credential store could not persist, read, or delete the token.
pub const CODE_STORAGE_FAILURE: &str = "STORAGE_FAILURE";

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: String,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cancellation is a distinct, non-alarming outcome; callers use this to
    /// skip the generic failure banner.
    pub fn is_cancelled(&self) -> bool {
        self.code == CODE_CANCELLED
    }
}

macro_rules! storage_err {
    ($($arg:tt)*) => {
        $crate::shared::error::AppError::new(
            $crate::shared::error::CODE_STORAGE_FAILURE,
            format!($($arg)*),
        )
    };
}
pub(crate) use storage_err;

fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let msg = raw.trim();
    let msg = msg.strip_prefix("Error:").unwrap_or(msg).trim();
    if msg.is_empty() {
        return None;
    }

    let (maybe_code, rest) = msg.split_once(':')?;
    let code = maybe_code.trim();
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
        return None;
    }
    Some((code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        if let Some((code, rest)) = split_code_message(&value) {
            let message = if rest.is_empty() { value.trim() } else { rest };
            return AppError::new(code.to_string(), message.to_string());
        }
        AppError::new("INTERNAL_ERROR", value)
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
