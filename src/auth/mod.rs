pub mod browser;
mod callback;
pub mod events;
pub mod nonce;
pub mod pending;
pub mod provider;
pub mod session;
