//! End-to-end login flows driven through the public API: a task awaits
//! `create_session` while the test plays the roles of browser and backend by
//! feeding activation URIs into `handle_callback_uri`.

use seo_brain_auth::test_support::{BrokenCredentialStore, RecordingBrowser, SequenceNonceSource};
use seo_brain_auth::{
    AuthNotice, AuthSettings, CancelFlag, CredentialStore, LoginStep, MemoryCredentialStore,
    SessionProvider,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    provider: Arc<SessionProvider>,
    browser: Arc<RecordingBrowser>,
    store: Arc<MemoryCredentialStore>,
}

fn harness(nonces: &[&str]) -> Harness {
    let browser = Arc::new(RecordingBrowser::new());
    let store = Arc::new(MemoryCredentialStore::new());
    let mut settings = AuthSettings::default();
    settings.account_label = "Test account".to_string();
    let provider = Arc::new(
        SessionProvider::with_dependencies(
            settings,
            store.clone(),
            browser.clone(),
            Arc::new(SequenceNonceSource::new(nonces)),
        )
        .unwrap(),
    );
    Harness {
        provider,
        browser,
        store,
    }
}

fn callback(query: &str) -> String {
    format!("seo-brain://auth/callback?{query}")
}

#[tokio::test]
async fn successful_login_persists_token_and_announces_session() {
    let h = harness(&["n1"]);
    let mut sessions = h.provider.events().subscribe_sessions();
    let mut notices = h.provider.events().subscribe_notices();

    let login = {
        let provider = h.provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };

    let nonce = h.browser.wait_for_nonce().await;
    assert_eq!(nonce, "n1");
    h.provider
        .handle_callback_uri(&callback(&format!("token=abc123&nonce={nonce}")));

    let session = login.await.unwrap().unwrap();
    assert_eq!(session.access_token, "abc123");
    assert_eq!(session.id, "abc123");
    assert_eq!(session.account_label, "Test account");

    assert_eq!(h.store.get().unwrap().as_deref(), Some("abc123"));
    let listed = h.provider.get_sessions().await.unwrap();
    assert_eq!(listed, vec![session]);

    let change = sessions.recv().await.unwrap();
    assert_eq!(change.added.len(), 1);
    assert_eq!(change.added[0].access_token, "abc123");

    assert_eq!(
        notices.recv().await.unwrap(),
        AuthNotice::Progress {
            step: LoginStep::WaitingBrowser
        }
    );
    assert_eq!(
        notices.recv().await.unwrap(),
        AuthNotice::Progress {
            step: LoginStep::Completed
        }
    );
}

#[tokio::test]
async fn backend_error_fails_the_login_and_stores_nothing() {
    let h = harness(&["n1"]);
    let mut sessions = h.provider.events().subscribe_sessions();

    let login = {
        let provider = h.provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };

    let nonce = h.browser.wait_for_nonce().await;
    h.provider
        .handle_callback_uri(&callback(&format!("error=invalid_credentials&nonce={nonce}")));

    let err = login.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "AUTH_REMOTE_ERROR");
    assert!(err.message().contains("invalid_credentials"));

    assert_eq!(h.store.get().unwrap(), None);
    assert!(h.provider.get_sessions().await.unwrap().is_empty());
    assert!(sessions.try_recv().is_err());
}

#[tokio::test]
async fn storage_failure_after_the_exchange_leaves_no_session() {
    let browser = Arc::new(RecordingBrowser::new());
    let mut settings = AuthSettings::default();
    settings.account_label = "Test account".to_string();
    let provider = Arc::new(
        SessionProvider::with_dependencies(
            settings,
            Arc::new(BrokenCredentialStore::new("disk full")),
            browser.clone(),
            Arc::new(SequenceNonceSource::new(&["n1"])),
        )
        .unwrap(),
    );
    let mut sessions = provider.events().subscribe_sessions();

    let login = {
        let provider = provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };

    let nonce = browser.wait_for_nonce().await;
    provider.handle_callback_uri(&callback(&format!("token=abc123&nonce={nonce}")));

    // The exchange succeeded but the token could not be persisted; the
    // caller must not be handed a session the store does not back.
    let err = login.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "STORAGE_FAILURE");
    assert!(err.message().contains("disk full"));

    assert!(provider.get_sessions().await.unwrap().is_empty());
    assert!(sessions.try_recv().is_err());
}

#[tokio::test]
async fn failed_login_clears_a_previously_stored_token() {
    let h = harness(&["n1"]);
    h.store.set("stale-jwt").unwrap();
    let mut sessions = h.provider.events().subscribe_sessions();

    let login = {
        let provider = h.provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };

    let nonce = h.browser.wait_for_nonce().await;
    h.provider
        .handle_callback_uri(&callback(&format!("error=invalid_credentials&nonce={nonce}")));

    let err = login.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "AUTH_REMOTE_ERROR");

    // A failed fresh login must not leave the earlier token trusted.
    assert_eq!(h.store.get().unwrap(), None);
    assert!(h.provider.get_sessions().await.unwrap().is_empty());

    let change = sessions.recv().await.unwrap();
    assert_eq!(change.removed.len(), 1);
    assert_eq!(change.removed[0].id, "stale-jwt");
    assert!(change.added.is_empty());
}

#[tokio::test]
async fn cancelled_login_ignores_the_late_callback() {
    let h = harness(&["n1"]);
    let cancel = CancelFlag::new();

    let login = {
        let provider = h.provider.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { provider.create_session(&cancel).await })
    };

    let nonce = h.browser.wait_for_nonce().await;
    cancel.cancel();

    let err = login.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(h.provider.pending_logins(), 0);

    // The user finishes in the browser anyway; the stale redirect must be
    // dropped without creating a session.
    h.provider
        .handle_callback_uri(&callback(&format!("token=late-jwt&nonce={nonce}")));
    assert_eq!(h.store.get().unwrap(), None);
    assert!(h.provider.get_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn unrelated_activation_uri_does_not_disturb_a_pending_login() {
    let h = harness(&["n1"]);

    let login = {
        let provider = h.provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };

    let nonce = h.browser.wait_for_nonce().await;
    h.provider
        .handle_callback_uri("seo-brain://workspace/open?project=demo");
    assert_eq!(h.provider.pending_logins(), 1);

    h.provider
        .handle_callback_uri(&callback(&format!("token=abc123&nonce={nonce}")));
    let session = login.await.unwrap().unwrap();
    assert_eq!(session.access_token, "abc123");
}

#[tokio::test]
async fn logout_removes_the_session_and_announces_it() {
    let h = harness(&["n1"]);

    let login = {
        let provider = h.provider.clone();
        tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
    };
    let nonce = h.browser.wait_for_nonce().await;
    h.provider
        .handle_callback_uri(&callback(&format!("token=abc123&nonce={nonce}")));
    let session = login.await.unwrap().unwrap();

    let mut sessions = h.provider.events().subscribe_sessions();
    assert!(h
        .provider
        .remove_session(Some(session.id.as_str()))
        .await
        .unwrap());

    assert_eq!(h.store.get().unwrap(), None);
    assert!(h.provider.get_sessions().await.unwrap().is_empty());

    let change = sessions.recv().await.unwrap();
    assert_eq!(change.removed.len(), 1);
    assert_eq!(change.removed[0].id, "abc123");

    // A second logout has nothing left to remove.
    assert!(!h.provider.remove_session(None).await.unwrap());
}

#[tokio::test]
async fn disposal_fails_every_waiting_login() {
    let h = harness(&["n1", "n2", "n3"]);

    let logins: Vec<_> = (0..3)
        .map(|_| {
            let provider = h.provider.clone();
            tokio::spawn(async move { provider.create_session(&CancelFlag::new()).await })
        })
        .collect();

    for _ in 0..200 {
        if h.browser.opened_urls().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.browser.opened_urls().len(), 3);

    h.provider.dispose();

    for login in logins {
        let err = login.await.unwrap().unwrap_err();
        assert_eq!(err.code(), "AUTH_PROVIDER_DISPOSED");
    }
    assert_eq!(h.provider.pending_logins(), 0);
}
