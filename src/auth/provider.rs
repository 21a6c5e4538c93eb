//! Usage: Browser-login session provider (create/list/remove + callback intake).

use crate::auth::browser::{BrowserOpener, SystemBrowserOpener};
use crate::auth::callback::{parse_callback_uri, CallbackPayload};
use crate::auth::events::{AuthEvents, AuthNotice, LoginStep, SessionChange};
use crate::auth::nonce::{NonceSource, OsRandomNonceSource};
use crate::auth::pending::PendingExchanges;
use crate::auth::session::Session;
use crate::infra::credential_store::CredentialStore;
use crate::infra::settings::AuthSettings;
use crate::shared::blocking;
use crate::shared::error::{
    AppError, AppResult, CODE_CANCELLED, CODE_PROVIDER_DISPOSED, CODE_REMOTE_ERROR,
};
use crate::shared::security::{constant_time_eq, mask_token};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OnceCell};
use url::Url;

/// Cooperative cancellation handle for one `create_session` call. Clone it
/// into whatever UI affordance lets the user abort the wait.
#[derive(Clone, Default)]
pub struct CancelFlag {
    inner: Arc<CancelFlagInner>,
}

#[derive(Default)]
struct CancelFlagInner {
    notify: Notify,
    flag: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub(crate) async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after arming the waiter so a cancel between the first
            // check and `notified()` is not lost.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Orchestrates the asynchronous browser login: opens the login page with a
/// fresh nonce, parks the caller until the matching callback URI arrives, and
/// keeps the credential store and event subscribers in sync.
pub struct SessionProvider {
    settings: AuthSettings,
    login_url: Url,
    callback_url: Url,
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserOpener>,
    nonce_source: Arc<dyn NonceSource>,
    nonce_ready: OnceCell<()>,
    pending: PendingExchanges,
    events: AuthEvents,
}

impl SessionProvider {
    pub fn new(settings: AuthSettings, store: Arc<dyn CredentialStore>) -> AppResult<Self> {
        Self::with_dependencies(
            settings,
            store,
            Arc::new(SystemBrowserOpener::new()),
            Arc::new(OsRandomNonceSource::new()),
        )
    }

    pub fn with_dependencies(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        browser: Arc<dyn BrowserOpener>,
        nonce_source: Arc<dyn NonceSource>,
    ) -> AppResult<Self> {
        let login_url = Url::parse(&settings.login_url)
            .map_err(|e| format!("SEC_INVALID_INPUT: invalid login_url: {e}"))?;
        let callback_url = settings.callback_url()?;
        let events = AuthEvents::new(settings.event_buffer_capacity);
        Ok(Self {
            settings,
            login_url,
            callback_url,
            store,
            browser,
            nonce_source,
            nonce_ready: OnceCell::new(),
            pending: PendingExchanges::new(),
            events,
        })
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Number of unsettled login attempts. Intended for tests and shutdown
    /// diagnostics.
    pub fn pending_logins(&self) -> usize {
        self.pending.pending_count()
    }

    /// Run one interactive login. Resolves once the browser redirect for this
    /// attempt's nonce arrives, or fails on cancel, timeout, browser launch
    /// failure, or a backend-reported error.
    pub async fn create_session(&self, cancel: &CancelFlag) -> AppResult<Session> {
        match self.run_login(cancel).await {
            Ok(session) => Ok(session),
            Err(err) => Err(self.fail_login(err).await),
        }
    }

    async fn run_login(&self, cancel: &CancelFlag) -> AppResult<Session> {
        self.ensure_nonce_source_ready().await?;
        let nonce = self.nonce_source.generate()?;
        let login_url = self.build_login_url(&nonce);

        let mut rx = self.pending.register(&nonce)?;
        tracing::info!(nonce = %mask_token(&nonce), "login started, waiting for browser");
        self.events.emit_progress(LoginStep::WaitingBrowser);

        if let Err(err) = self.browser.open(login_url.as_str()) {
            self.pending.remove(&nonce);
            return Err(err);
        }

        let outcome = tokio::select! {
            received = &mut rx => match received {
                Ok(outcome) => outcome,
                Err(_) => Err(AppError::new(
                    CODE_PROVIDER_DISPOSED,
                    "login abandoned: provider disposed",
                )),
            },
            _ = cancel.cancelled() => {
                self.pending.remove(&nonce);
                Err(AppError::new(CODE_CANCELLED, "login cancelled by user"))
            }
            _ = wait_for_deadline(self.settings.login_timeout()) => {
                self.pending.remove(&nonce);
                Err(AppError::new(CODE_CANCELLED, "login timed out"))
            }
        };

        self.complete_login(outcome?).await
    }

    /// Sessions currently known: zero or one, backed by the stored token.
    pub async fn get_sessions(&self) -> AppResult<Vec<Session>> {
        let store = Arc::clone(&self.store);
        let stored = blocking::run("credential_store_get", move || store.get()).await?;
        Ok(stored
            .map(|token| Session::from_token(&token, &self.settings.account_label))
            .into_iter()
            .collect())
    }

    /// Log out. `id = None` removes whatever session exists; `Some` removes
    /// only a matching session. Returns whether anything was removed.
    pub async fn remove_session(&self, id: Option<&str>) -> AppResult<bool> {
        let store = Arc::clone(&self.store);
        let stored = blocking::run("credential_store_get", move || store.get()).await?;
        let Some(token) = stored else {
            tracing::warn!("remove_session called with no stored session");
            return Ok(false);
        };

        if let Some(id) = id {
            if !constant_time_eq(id.as_bytes(), token.as_bytes()) {
                tracing::warn!(id = %mask_token(id), "remove_session id does not match stored session");
                return Ok(false);
            }
        }

        let store = Arc::clone(&self.store);
        blocking::run("credential_store_delete", move || store.delete()).await?;

        let session = Session::from_token(&token, &self.settings.account_label);
        tracing::info!(session = %mask_token(&session.id), "session removed");
        self.events
            .emit_session_change(SessionChange::removed(session));
        Ok(true)
    }

    /// Entry point for OS-routed activation URIs. Never fails: unknown URIs
    /// are ignored, unattributable ones fail every pending attempt.
    pub fn handle_callback_uri(&self, raw: &str) {
        match parse_callback_uri(raw, &self.callback_url) {
            Ok(Some(payload)) => self.apply_callback(payload),
            Ok(None) => {
                tracing::trace!("activation uri not aimed at the login callback, ignoring");
            }
            Err(err) => {
                tracing::error!(error = %err, "unparseable activation uri, failing pending logins");
                self.pending.reject_all(&err);
            }
        }
    }

    /// Fail all in-flight logins. Idempotent; also invoked from `Drop`.
    pub fn dispose(&self) {
        self.pending.reject_all(&AppError::new(
            CODE_PROVIDER_DISPOSED,
            "session provider disposed",
        ));
    }

    async fn ensure_nonce_source_ready(&self) -> AppResult<()> {
        // A failed init is retried on the next attempt; only success is
        // cached.
        self.nonce_ready
            .get_or_try_init(|| {
                let source = Arc::clone(&self.nonce_source);
                async move { blocking::run("nonce_source_init", move || source.init()).await }
            })
            .await?;
        Ok(())
    }

    fn build_login_url(&self, nonce: &str) -> Url {
        let mut url = self.login_url.clone();
        url.query_pairs_mut()
            .append_pair("callback", self.callback_url.as_str())
            .append_pair("nonce", nonce);
        url
    }

    fn apply_callback(&self, payload: CallbackPayload) {
        let Some(nonce) = payload.nonce else {
            tracing::warn!("login callback without nonce");
            self.events.emit_notice(AuthNotice::LoginFailed {
                message: "authentication failed".to_string(),
            });
            return;
        };

        if let Some(token) = payload.token {
            if !self.pending.resolve(&nonce, token) {
                tracing::debug!(nonce = %mask_token(&nonce), "callback for unknown nonce dropped");
            }
            return;
        }

        let explicit_error = payload.error;
        let message = explicit_error
            .clone()
            .unwrap_or_else(|| "login failed for an unknown reason".to_string());
        if !self.pending.reject(&nonce, AppError::new(CODE_REMOTE_ERROR, message)) {
            tracing::debug!(nonce = %mask_token(&nonce), "error callback for unknown nonce");
            // No waiter to fail, but an explicit backend error is still
            // something the user should see.
            if let Some(message) = explicit_error {
                self.events.emit_notice(AuthNotice::LoginFailed { message });
            }
        }
    }

    async fn complete_login(&self, token: String) -> AppResult<Session> {
        let store = Arc::clone(&self.store);
        let to_persist = token.clone();
        blocking::run("credential_store_set", move || store.set(&to_persist)).await?;

        let session = Session::from_token(&token, &self.settings.account_label);
        tracing::info!(session = %mask_token(&session.id), "login completed");
        self.events
            .emit_session_change(SessionChange::added(session.clone()));
        self.events.emit_progress(LoginStep::Completed);
        Ok(session)
    }

    async fn fail_login(&self, err: AppError) -> AppError {
        if err.is_cancelled() {
            tracing::info!(reason = err.message(), "login cancelled");
            return err;
        }

        tracing::warn!(error = %err, "login failed");
        // A half-finished attempt must not leave a token behind that the
        // caller was never handed.
        match self.remove_stale_token().await {
            Ok(Some(session)) => {
                self.events
                    .emit_session_change(SessionChange::removed(session));
            }
            Ok(None) => {}
            Err(store_err) => {
                tracing::warn!(error = %store_err, "failed to clear stored token after login failure");
            }
        }
        self.events.emit_progress(LoginStep::Failed);
        err
    }

    async fn remove_stale_token(&self) -> AppResult<Option<Session>> {
        let store = Arc::clone(&self.store);
        let stored = blocking::run("credential_store_get", move || store.get()).await?;
        let Some(token) = stored else {
            return Ok(None);
        };
        let store = Arc::clone(&self.store);
        blocking::run("credential_store_delete", move || store.delete()).await?;
        Ok(Some(Session::from_token(
            &token,
            &self.settings.account_label,
        )))
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn wait_for_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}
