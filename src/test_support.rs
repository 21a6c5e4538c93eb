//! Usage: Test doubles for the login flow (browsers and nonce sources).
//!
//! Compiled into the library so integration tests can drive a full login
//! without a real browser or OS RNG.

use crate::auth::browser::BrowserOpener;
use crate::auth::nonce::NonceSource;
use crate::infra::credential_store::CredentialStore;
use crate::shared::error::{AppError, AppResult, CODE_NONCE_INIT_FAILURE, CODE_STORAGE_FAILURE};
use crate::shared::mutex_ext::MutexExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// Browser double that records every URL instead of launching anything.
#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock_or_recover().clone()
    }

    /// Nonce query parameter of the most recently opened login URL.
    pub fn last_nonce(&self) -> Option<String> {
        let urls = self.opened.lock_or_recover();
        let raw = urls.last()?;
        let url = Url::parse(raw).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "nonce")
            .map(|(_, value)| value.into_owned())
    }

    /// Poll until a login URL has been opened and return its nonce. Panics
    /// after ~2s so a wedged flow fails the test instead of hanging it.
    pub async fn wait_for_nonce(&self) -> String {
        for _ in 0..200 {
            if let Some(nonce) = self.last_nonce() {
                return nonce;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no login URL was opened within the polling window");
    }
}

impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str) -> AppResult<()> {
        self.opened.lock_or_recover().push(url.to_string());
        Ok(())
    }
}

/// Browser double whose launch always fails.
pub struct FailingBrowser {
    message: String,
}

impl FailingBrowser {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl BrowserOpener for FailingBrowser {
    fn open(&self, _url: &str) -> AppResult<()> {
        Err(AppError::new("INTERNAL_ERROR", self.message.clone()))
    }
}

/// Store double whose writes always fail with a storage error; reads behave
/// like an empty store.
pub struct BrokenCredentialStore {
    message: String,
}

impl BrokenCredentialStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl CredentialStore for BrokenCredentialStore {
    fn get(&self) -> AppResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _token: &str) -> AppResult<()> {
        Err(AppError::new(CODE_STORAGE_FAILURE, self.message.clone()))
    }

    fn delete(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Deterministic nonce source that hands out a fixed sequence.
pub struct SequenceNonceSource {
    nonces: Mutex<VecDeque<String>>,
}

impl SequenceNonceSource {
    pub fn new(nonces: &[&str]) -> Self {
        Self {
            nonces: Mutex::new(nonces.iter().map(|n| (*n).to_string()).collect()),
        }
    }
}

impl NonceSource for SequenceNonceSource {
    fn init(&self) -> AppResult<()> {
        Ok(())
    }

    fn generate(&self) -> AppResult<String> {
        self.nonces
            .lock_or_recover()
            .pop_front()
            .ok_or_else(|| AppError::new("INTERNAL_ERROR", "nonce sequence exhausted"))
    }
}

/// Nonce source whose `init` fails a configured number of times before
/// behaving like `SequenceNonceSource`.
pub struct FailingNonceSource {
    remaining_failures: AtomicUsize,
    init_calls: AtomicUsize,
    inner: SequenceNonceSource,
}

impl FailingNonceSource {
    pub fn failing_times(failures: usize, nonces: &[&str]) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            init_calls: AtomicUsize::new(0),
            inner: SequenceNonceSource::new(nonces),
        }
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

impl NonceSource for FailingNonceSource {
    fn init(&self) -> AppResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::new(
                CODE_NONCE_INIT_FAILURE,
                "nonce source failed to initialize",
            ));
        }
        self.inner.init()
    }

    fn generate(&self) -> AppResult<String> {
        self.inner.generate()
    }
}
