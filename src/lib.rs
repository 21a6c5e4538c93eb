//! Browser-based login for SEO Brain desktop hosts.
//!
//! A login opens the system browser on the configured login page with a
//! single-use nonce. The backend redirects to an app-registered URI carrying
//! the nonce and either a bearer token or an error; the OS routes that URI
//! back here, where it settles the matching in-flight login. The resulting
//! session is persisted in the credential store and announced to event
//! subscribers.

mod auth;
mod infra;
pub mod logging;
mod shared;
pub mod test_support;

pub use auth::browser::{BrowserOpener, SystemBrowserOpener};
pub use auth::events::{AuthEvents, AuthNotice, LoginStep, SessionChange};
pub use auth::nonce::{NonceSource, OsRandomNonceSource};
pub use auth::provider::{CancelFlag, SessionProvider};
pub use auth::session::Session;
pub use infra::credential_store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use infra::db::Db;
pub use infra::settings::{self, AuthSettings};
pub use shared::error::{AppError, AppResult};
