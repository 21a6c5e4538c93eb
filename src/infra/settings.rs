//! Usage: Persisted auth settings (schema + read/write helpers).

use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const SCHEMA_VERSION: u32 = 2;
const SCHEMA_VERSION_ADD_LOGIN_TIMEOUT: u32 = 2;

const DEFAULT_LOGIN_URL: &str = "https://app.seo-brain.io/login";
const DEFAULT_CALLBACK_URI: &str = "seo-brain://auth/callback";
const DEFAULT_ACCOUNT_LABEL: &str = "SEO Brain account";
// 0 = no timeout; the waiting indicator is dismissed by the user instead.
const DEFAULT_LOGIN_TIMEOUT_SECONDS: u32 = 0;
const MAX_LOGIN_TIMEOUT_SECONDS: u32 = 60 * 60;
const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 16;
const MAX_EVENT_BUFFER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub schema_version: u32,
    /// Browser-facing login page; `callback` and `nonce` are appended as
    /// query parameters.
    pub login_url: String,
    /// URI the backend redirects to after authentication; the OS routes it
    /// back to this process. Matched exactly against inbound activations.
    pub callback_uri: String,
    /// Display label for the authenticated user. Decoding token claims is a
    /// backend concern, so the label is a configured placeholder.
    pub account_label: String,
    /// 0 disables the timeout; otherwise behaves exactly like cancellation.
    pub login_timeout_seconds: u32,
    pub event_buffer_capacity: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            callback_uri: DEFAULT_CALLBACK_URI.to_string(),
            account_label: DEFAULT_ACCOUNT_LABEL.to_string(),
            login_timeout_seconds: DEFAULT_LOGIN_TIMEOUT_SECONDS,
            event_buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
        }
    }
}

impl AuthSettings {
    pub fn login_timeout(&self) -> Option<Duration> {
        if self.login_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.login_timeout_seconds)))
        }
    }

    pub(crate) fn callback_url(&self) -> AppResult<Url> {
        Url::parse(&self.callback_uri)
            .map_err(|e| format!("SEC_INVALID_INPUT: invalid callback_uri: {e}").into())
    }
}

fn validate(settings: &AuthSettings) -> AppResult<()> {
    Url::parse(&settings.login_url)
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid login_url: {e}"))?;
    settings.callback_url()?;
    if settings.account_label.trim().is_empty() {
        return Err("SEC_INVALID_INPUT: account_label must not be empty".into());
    }
    Ok(())
}

fn sanitize_login_timeout(settings: &mut AuthSettings) -> bool {
    if settings.login_timeout_seconds > MAX_LOGIN_TIMEOUT_SECONDS {
        settings.login_timeout_seconds = MAX_LOGIN_TIMEOUT_SECONDS;
        return true;
    }
    false
}

fn sanitize_event_buffer_capacity(settings: &mut AuthSettings) -> bool {
    let mut changed = false;

    if settings.event_buffer_capacity == 0 {
        settings.event_buffer_capacity = DEFAULT_EVENT_BUFFER_CAPACITY;
        changed = true;
    }
    if settings.event_buffer_capacity > MAX_EVENT_BUFFER_CAPACITY {
        settings.event_buffer_capacity = MAX_EVENT_BUFFER_CAPACITY;
        changed = true;
    }

    changed
}

fn migrate_add_login_timeout(settings: &mut AuthSettings, schema_version_present: bool) -> bool {
    // v2: Add login_timeout_seconds (default disabled).
    if schema_version_present && settings.schema_version >= SCHEMA_VERSION_ADD_LOGIN_TIMEOUT {
        return false;
    }

    let mut changed = false;

    // If schema_version is missing, force a write to persist it so we don't
    // keep "migrating" on every startup.
    if !schema_version_present {
        changed = true;
    }

    if settings.schema_version != SCHEMA_VERSION_ADD_LOGIN_TIMEOUT {
        settings.schema_version = SCHEMA_VERSION_ADD_LOGIN_TIMEOUT;
        changed = true;
    }

    changed
}

fn parse_settings_json(content: &str) -> AppResult<(AuthSettings, bool)> {
    let raw: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    let schema_version_present = raw.get("schema_version").is_some();
    let settings: AuthSettings =
        serde_json::from_value(raw).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    Ok((settings, schema_version_present))
}

pub fn read(path: &Path) -> AppResult<AuthSettings> {
    if !path.exists() {
        let settings = AuthSettings::default();
        // Best-effort: create the file on first read so the config is
        // discoverable and editable.
        let _ = write(path, &settings);
        return Ok(settings);
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read settings: {e}"))?;
    let (mut settings, schema_version_present) = parse_settings_json(&content)?;
    validate(&settings)?;

    let mut repaired = false;
    repaired |= migrate_add_login_timeout(&mut settings, schema_version_present);
    repaired |= sanitize_login_timeout(&mut settings);
    repaired |= sanitize_event_buffer_capacity(&mut settings);
    if repaired {
        // Best-effort: persist repaired values while keeping read semantics.
        let _ = write(path, &settings);
    }

    Ok(settings)
}

pub fn write(path: &Path, settings: &AuthSettings) -> AppResult<AuthSettings> {
    validate(settings)?;
    if settings.login_timeout_seconds > MAX_LOGIN_TIMEOUT_SECONDS {
        return Err(format!(
            "SEC_INVALID_INPUT: login_timeout_seconds must be <= {MAX_LOGIN_TIMEOUT_SECONDS}"
        )
        .into());
    }
    if settings.event_buffer_capacity == 0 {
        return Err("SEC_INVALID_INPUT: event_buffer_capacity must be >= 1".into());
    }
    if settings.event_buffer_capacity > MAX_EVENT_BUFFER_CAPACITY {
        return Err(format!(
            "SEC_INVALID_INPUT: event_buffer_capacity must be <= {MAX_EVENT_BUFFER_CAPACITY}"
        )
        .into());
    }

    let tmp_path = path.with_extension("json.tmp");
    let backup_path = path.with_extension("json.bak");

    let content = serde_json::to_vec_pretty(settings)
        .map_err(|e| format!("failed to serialize settings: {e}"))?;

    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("failed to write temp settings file: {e}"))?;

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }

    if path.exists() {
        std::fs::rename(path, &backup_path)
            .map_err(|e| format!("failed to create settings backup: {e}"))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::rename(&backup_path, path);
        return Err(format!("failed to finalize settings: {e}").into());
    }

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }

    Ok(settings.clone())
}
