pub mod credential_store;
pub mod db;
pub mod settings;
