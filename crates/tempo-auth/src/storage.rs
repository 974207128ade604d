use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Token set for OAuth2 authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token for API requests
    pub access_token: String,

    /// Optional refresh token for token renewal
    pub refresh_token: Option<String>,

    /// Token expiration timestamp (Unix timestamp)
    pub expires_at: i64,

    /// Scopes granted to this token
    pub scopes: Vec<String>,
}

impl TokenSet {
    /// Check if the token needs refresh (within 5 minutes of expiry)
    pub fn needs_refresh(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - 300 // 5 minute buffer
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at
    }

    /// Whether a sign-in can be recovered without user interaction
    pub fn is_usable(&self) -> bool {
        !self.is_expired() || self.refresh_token.is_some()
    }
}

/// File-backed storage for OAuth tokens, keyed by service name.
/// Tokens live under the user's config directory by default.
#[derive(Debug, Clone)]
pub struct TokenStore {
    root: PathBuf,
}

impl TokenStore {
    /// Store rooted at the default config directory (`~/.config/tempo/tokens`)
    pub fn new() -> Result<Self> {
        let root = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("tempo")
            .join("tokens");
        Ok(Self { root })
    }

    /// Store rooted at an explicit directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn token_path(&self, service: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).context("Failed to create tokens directory")?;
        Ok(self.root.join(format!("{}.json", service)))
    }

    /// Persist a token set for a service
    pub fn store(&self, service: &str, token_set: &TokenSet) -> Result<()> {
        let path = self.token_path(service)?;

        let json =
            serde_json::to_string_pretty(token_set).context("Failed to serialize token set")?;

        fs::write(&path, &json).context("Failed to write token file")?;

        tracing::info!("Stored token for service: {} at {:?}", service, path);
        Ok(())
    }

    /// Load a token set for a service
    pub fn load(&self, service: &str) -> Result<TokenSet> {
        let path = self.token_path(service)?;

        let json = fs::read_to_string(&path).context("Failed to read token file")?;

        let token_set: TokenSet =
            serde_json::from_str(&json).context("Failed to deserialize token set")?;

        Ok(token_set)
    }

    /// Delete the stored token for a service
    pub fn delete(&self, service: &str) -> Result<()> {
        let path = self.token_path(service)?;

        if path.exists() {
            fs::remove_file(&path).context("Failed to delete token file")?;
            tracing::info!("Deleted token for service: {}", service);
        }

        Ok(())
    }

    /// Check if a token exists for a service
    pub fn exists(&self, service: &str) -> bool {
        self.load(service).is_ok()
    }
}
