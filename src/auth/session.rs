//! Usage: Authenticated session snapshot exposed to hosts.

use serde::Serialize;

/// One authenticated account. The stored bearer token doubles as the
/// session id, which also makes restart recovery trivial: rebuilding the
/// session from the persisted token reproduces the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub access_token: String,
    pub account_label: String,
    pub scopes: Vec<String>,
}

impl Session {
    pub(crate) fn from_token(token: &str, account_label: &str) -> Self {
        Self {
            id: token.to_string(),
            access_token: token.to_string(),
            account_label: account_label.to_string(),
            scopes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_equals_access_token() {
        let session = Session::from_token("jwt-abc", "Test account");
        assert_eq!(session.id, session.access_token);
        assert_eq!(session.account_label, "Test account");
        assert!(session.scopes.is_empty());
    }

    #[test]
    fn rebuilt_session_matches_original() {
        let first = Session::from_token("jwt-abc", "Test account");
        let second = Session::from_token("jwt-abc", "Test account");
        assert_eq!(first, second);
    }
}
