//! Google OAuth2 sign-in and token storage for Tempo.

pub mod flow;
pub mod google;
pub mod storage;

pub use google::GoogleAuthenticator;
pub use storage::{TokenSet, TokenStore};

use anyhow::Result;

/// Initialize the auth module
pub fn init() -> Result<()> {
    tracing::info!("Tempo auth initialized");
    Ok(())
}
