//! Session-holding façade over Google sign-in and the Calendar API.
//!
//! [`CalendarManager`] is the one object the application talks to: sign in,
//! sign out, fetch upcoming events, add an event. OAuth details live in
//! `tempo-auth`; HTTP details live in [`crate::client`].

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tempo_auth::{GoogleAuthenticator, TokenStore};
use tempo_core::{CalendarConfig, Config};

use crate::client::CalendarClient;
use crate::error::CalendarError;
use crate::types::{Event, EventListResponse};

static SHARED: OnceLock<CalendarManager> = OnceLock::new();

pub struct CalendarManager {
    auth: GoogleAuthenticator,
    calendar_id: String,
    lookahead_days: u32,
    max_results: u32,
    /// Events from the most recent successful fetch
    events: RwLock<Vec<Event>>,
    #[cfg(test)]
    base_url: Option<String>,
}

impl CalendarManager {
    /// Process-wide manager, configured from the on-disk config file.
    ///
    /// The first call loads config and builds the instance; later calls
    /// return the same one.
    pub fn shared() -> anyhow::Result<&'static Self> {
        if let Some(manager) = SHARED.get() {
            return Ok(manager);
        }
        let config = Config::load()?;
        let manager = Self::from_config(&config)?;
        Ok(SHARED.get_or_init(|| manager))
    }

    /// Build a manager from an explicit config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = TokenStore::new()?;
        let auth = GoogleAuthenticator::new(
            config.google.client_id.clone(),
            config.google.client_secret.clone(),
            config.google.redirect_port,
            store,
        );
        Ok(Self::new(auth, &config.calendar))
    }

    /// Build a manager from parts. Used directly by tests.
    pub fn new(auth: GoogleAuthenticator, calendar: &CalendarConfig) -> Self {
        Self {
            auth,
            calendar_id: calendar.calendar_id.clone(),
            lookahead_days: calendar.lookahead_days,
            max_results: calendar.max_results,
            events: RwLock::new(Vec::new()),
            #[cfg(test)]
            base_url: None,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    fn client(&self, access_token: &str) -> CalendarClient {
        #[cfg(test)]
        if let Some(url) = &self.base_url {
            return CalendarClient::new_with_base_url(access_token, url);
        }
        CalendarClient::new(access_token)
    }

    /// Whether a usable session exists.
    pub fn is_signed_in(&self) -> bool {
        self.auth.is_signed_in()
    }

    /// Interactive sign-in via the system browser.
    pub async fn sign_in(&self) -> Result<(), CalendarError> {
        self.auth
            .sign_in()
            .await
            .map_err(|e| CalendarError::SignInFailed(e.to_string()))?;

        tracing::info!("Signed in to Google Calendar");
        Ok(())
    }

    /// Drop the session. Synchronous: local state is cleared immediately,
    /// token revocation runs in the background when a runtime is available.
    pub fn sign_out(&self) {
        let tokens = self.auth.stored_token();

        self.events.write().clear();
        if let Err(e) = self.auth.sign_out() {
            tracing::warn!("Failed to clear stored session: {}", e);
        }

        if let Some(tokens) = tokens {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let auth = self.auth.clone();
                handle.spawn(async move {
                    if let Err(e) = auth.revoke(&tokens.access_token).await {
                        tracing::debug!("Token revocation failed: {}", e);
                    }
                });
            }
        }

        tracing::info!("Signed out of Google Calendar");
    }

    /// Fetch upcoming events from the configured calendar, following
    /// pagination until the lookahead window is exhausted.
    pub async fn fetch_events(&self) -> Result<Vec<Event>, CalendarError> {
        let time_min = Utc::now();
        let time_max = time_min + Duration::days(i64::from(self.lookahead_days));

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .list_page(time_min, time_max, page_token.as_deref())
                .await?;

            events.extend(
                response
                    .items
                    .into_iter()
                    .map(|e| Event::from_api(e, &self.calendar_id)),
            );

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!("Fetched {} upcoming events", events.len());
        *self.events.write() = events.clone();
        Ok(events)
    }

    /// Create an event on the configured calendar.
    pub async fn add_event(
        &self,
        summary: &str,
        description: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Event, CalendarError> {
        if summary.trim().is_empty() {
            return Err(CalendarError::InvalidEventData(
                "summary must not be empty".to_string(),
            ));
        }
        if start >= end {
            return Err(CalendarError::InvalidEventData(
                "start must be before end".to_string(),
            ));
        }

        let token = self.access_token().await?;
        let result = self
            .client(&token)
            .insert_event(&self.calendar_id, summary, description, start, end)
            .await;

        match result {
            Err(err) if err.should_refresh_token() => {
                let token = self.refreshed_token().await?;
                self.client(&token)
                    .insert_event(&self.calendar_id, summary, description, start, end)
                    .await
            }
            other => other,
        }
    }

    /// Events from the most recent successful fetch.
    pub fn last_events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    async fn list_page(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<EventListResponse, CalendarError> {
        let token = self.access_token().await?;
        let result = self
            .client(&token)
            .list_events(
                &self.calendar_id,
                time_min,
                time_max,
                self.max_results,
                page_token,
            )
            .await;

        match result {
            Err(err) if err.should_refresh_token() => {
                let token = self.refreshed_token().await?;
                self.client(&token)
                    .list_events(
                        &self.calendar_id,
                        time_min,
                        time_max,
                        self.max_results,
                        page_token,
                    )
                    .await
            }
            other => other,
        }
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        self.auth.access_token().await.map_err(|e| {
            tracing::debug!("No usable access token: {}", e);
            CalendarError::AuthRequired
        })
    }

    /// Forced refresh after the API rejected a token the store thought valid.
    async fn refreshed_token(&self) -> Result<String, CalendarError> {
        self.auth.force_refresh().await.map_err(|e| {
            tracing::debug!("Forced token refresh failed: {}", e);
            CalendarError::TokenExpired
        })
    }
}
