//! Usage: Broadcast channels for session changes and login progress notices.

use crate::auth::session::Session;
use serde::Serialize;
use tokio::sync::broadcast;

/// Delta emitted whenever the set of sessions changes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionChange {
    pub added: Vec<Session>,
    pub removed: Vec<Session>,
    pub changed: Vec<Session>,
}

impl SessionChange {
    pub(crate) fn added(session: Session) -> Self {
        Self {
            added: vec![session],
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }

    pub(crate) fn removed(session: Session) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![session],
            changed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStep {
    WaitingBrowser,
    Completed,
    Failed,
}

/// User-facing notice. Hosts surface these as status bar text or toasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthNotice {
    Progress { step: LoginStep },
    LoginFailed { message: String },
}

/// Event hub. Emission never fails: with no subscribers the event is
/// dropped, matching fire-and-forget UI notification semantics.
pub struct AuthEvents {
    session_tx: broadcast::Sender<SessionChange>,
    notice_tx: broadcast::Sender<AuthNotice>,
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (session_tx, _) = broadcast::channel(capacity);
        let (notice_tx, _) = broadcast::channel(capacity);
        Self {
            session_tx,
            notice_tx,
        }
    }

    pub fn subscribe_sessions(&self) -> broadcast::Receiver<SessionChange> {
        self.session_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<AuthNotice> {
        self.notice_tx.subscribe()
    }

    pub(crate) fn emit_session_change(&self, change: SessionChange) {
        if self.session_tx.send(change).is_err() {
            tracing::debug!("session change emitted with no subscribers");
        }
    }

    pub(crate) fn emit_notice(&self, notice: AuthNotice) {
        if self.notice_tx.send(notice).is_err() {
            tracing::debug!("auth notice emitted with no subscribers");
        }
    }

    pub(crate) fn emit_progress(&self, step: LoginStep) {
        self.emit_notice(AuthNotice::Progress { step });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::from_token("jwt-abc", "Test account")
    }

    #[test]
    fn subscriber_receives_session_change() {
        let events = AuthEvents::new(4);
        let mut rx = events.subscribe_sessions();

        events.emit_session_change(SessionChange::added(session()));

        let change = rx.try_recv().unwrap();
        assert_eq!(change.added.len(), 1);
        assert!(change.removed.is_empty());
        assert!(change.changed.is_empty());
    }

    #[test]
    fn emission_without_subscribers_does_not_panic() {
        let events = AuthEvents::new(4);
        events.emit_session_change(SessionChange::removed(session()));
        events.emit_progress(LoginStep::Failed);
    }

    #[test]
    fn notices_serialize_with_snake_case_tags() {
        let json = serde_json::to_value(AuthNotice::Progress {
            step: LoginStep::WaitingBrowser,
        })
        .unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["step"], "waiting_browser");

        let json = serde_json::to_value(AuthNotice::LoginFailed {
            message: "authentication failed".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "login_failed");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let events = AuthEvents::new(0);
        let mut rx = events.subscribe_notices();
        events.emit_progress(LoginStep::Completed);
        assert!(rx.try_recv().is_ok());
    }
}
