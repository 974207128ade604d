//! Google OAuth2 provider for Calendar access.

use anyhow::{Context, Result};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};

use crate::flow;
use crate::storage::{TokenSet, TokenStore};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

// Scopes for Calendar access
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const USERINFO_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// Service key under which Google tokens are stored.
pub const SERVICE_ID: &str = "google";

/// Interactive Google sign-in plus silent token maintenance.
///
/// Sign-in opens the system browser, captures the redirect on a localhost
/// listener, and persists the resulting token set. Subsequent calls to
/// [`GoogleAuthenticator::access_token`] refresh silently when possible.
#[derive(Clone)]
pub struct GoogleAuthenticator {
    client_id: String,
    client_secret: String,
    redirect_port: u16,
    store: TokenStore,
    auth_url: String,
    token_url: String,
    revoke_url: String,
}

impl GoogleAuthenticator {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_port: u16,
        store: TokenStore,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_port,
            store,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            revoke_url: GOOGLE_REVOKE_URL.to_string(),
        }
    }

    /// Override the token and revoke endpoints (used by tests).
    pub fn with_endpoints(mut self, token_url: &str, revoke_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self.revoke_url = revoke_url.to_string();
        self
    }

    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }

    fn oauth_client(&self) -> Result<BasicClient> {
        let client = BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            AuthUrl::new(self.auth_url.clone()).context("Invalid auth URL")?,
            Some(TokenUrl::new(self.token_url.clone()).context("Invalid token URL")?),
        )
        .set_redirect_uri(RedirectUrl::new(self.redirect_uri()).context("Invalid redirect URI")?);

        Ok(client)
    }

    /// Build the consent URL for the authorization-code flow.
    ///
    /// Returns the URL plus the CSRF state and PKCE verifier that must be
    /// checked/supplied when the callback arrives.
    pub fn authorization_url(&self) -> Result<(String, CsrfToken, PkceCodeVerifier)> {
        let client = self.oauth_client()?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(CALENDAR_SCOPE.to_string()))
            .add_scope(Scope::new(USERINFO_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            // Request a refresh token so sign-in survives token expiry
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        Ok((auth_url.to_string(), csrf_token, pkce_verifier))
    }

    /// Perform the full interactive sign-in: browser, callback, code exchange.
    ///
    /// The resulting token set is persisted before being returned.
    pub async fn sign_in(&self) -> Result<TokenSet> {
        let (auth_url, csrf_token, pkce_verifier) = self.authorization_url()?;

        // Listen before the browser opens so the redirect cannot beat us
        let listener = flow::CallbackListener::bind(self.redirect_port)?;

        tracing::info!("Opening browser for Google authorization");
        webbrowser::open(&auth_url).context("Failed to open browser")?;

        let params = listener.recv().await?;

        if params.state != *csrf_token.secret() {
            anyhow::bail!("CSRF token mismatch");
        }
        if params.code.is_empty() {
            anyhow::bail!("Authorization was denied or returned no code");
        }

        let tokens = self.exchange_code(params.code, pkce_verifier).await?;
        self.store.store(SERVICE_ID, &tokens)?;

        tracing::info!("Google sign-in completed");
        Ok(tokens)
    }

    /// Exchange an authorization code for a token set.
    async fn exchange_code(&self, code: String, verifier: PkceCodeVerifier) -> Result<TokenSet> {
        let client = self.oauth_client()?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(async_http_client)
            .await
            .context("Failed to exchange authorization code")?;

        Ok(Self::token_set_from(&response, None))
    }

    /// Refresh an expired access token.
    ///
    /// Google omits the refresh token from refresh responses; the previous
    /// one is carried forward.
    #[tracing::instrument(skip(self, refresh_token), level = "info")]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let client = self.oauth_client()?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .context("Failed to refresh access token")?;

        Ok(Self::token_set_from(
            &response,
            Some(refresh_token.to_string()),
        ))
    }

    fn token_set_from(
        response: &oauth2::basic::BasicTokenResponse,
        previous_refresh: Option<String>,
    ) -> TokenSet {
        let expires_in = response
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600); // Default 1 hour
        let expires_at = chrono::Utc::now().timestamp() + expires_in;

        let scopes = response
            .scopes()
            .map(|s| s.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_else(Vec::new);

        TokenSet {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or(previous_refresh),
            expires_at,
            scopes,
        }
    }

    /// Get a valid access token, refreshing and re-persisting when expired.
    ///
    /// Fails when no session exists or the session cannot be recovered
    /// without user interaction.
    pub async fn access_token(&self) -> Result<String> {
        let tokens = self
            .store
            .load(SERVICE_ID)
            .context("Not signed in to Google")?;

        if !tokens.needs_refresh() {
            return Ok(tokens.access_token);
        }

        // Refresh early when possible; without a refresh token the access
        // token stays good until it actually expires
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            if tokens.is_expired() {
                anyhow::bail!("Session expired and no refresh token is available");
            }
            return Ok(tokens.access_token);
        };

        let refreshed = self.refresh(refresh_token).await?;
        self.store.store(SERVICE_ID, &refreshed)?;
        Ok(refreshed.access_token)
    }

    /// Force a refresh regardless of local expiry (after a 401 from the API).
    pub async fn force_refresh(&self) -> Result<String> {
        let tokens = self
            .store
            .load(SERVICE_ID)
            .context("Not signed in to Google")?;

        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .context("Session expired and no refresh token is available")?;

        let refreshed = self.refresh(refresh_token).await?;
        self.store.store(SERVICE_ID, &refreshed)?;
        Ok(refreshed.access_token)
    }

    /// Revoke a token with Google. Best-effort; the caller decides whether
    /// failure matters.
    #[tracing::instrument(skip(self, token), level = "info")]
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let client = reqwest::Client::new();

        let response = client
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .context("Failed to send revoke request")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Token revocation failed: {}", error_text);
        }

        Ok(())
    }

    /// Drop the local session. Synchronous; does not call Google.
    pub fn sign_out(&self) -> Result<()> {
        self.store.delete(SERVICE_ID)
    }

    /// Stored token for the current session, if any.
    pub fn stored_token(&self) -> Option<TokenSet> {
        self.store.load(SERVICE_ID).ok()
    }

    /// Whether a usable session exists (valid token, or refreshable one).
    pub fn is_signed_in(&self) -> bool {
        self.stored_token()
            .map(|tokens| tokens.is_usable())
            .unwrap_or(false)
    }
}
