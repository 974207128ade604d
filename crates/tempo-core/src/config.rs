use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Google OAuth settings
    #[serde(default)]
    pub google: GoogleConfig,

    /// Calendar settings
    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Google OAuth Client ID
    /// Create at: https://console.cloud.google.com/apis/credentials
    pub client_id: String,
    /// Google OAuth Client Secret
    pub client_secret: String,
    /// Port for the localhost OAuth callback
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

fn default_redirect_port() -> u16 {
    8080
}

impl GoogleConfig {
    /// Check if credentials are configured (not placeholders)
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.client_id.starts_with("YOUR_")
            && !self.client_secret.starts_with("YOUR_")
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_GOOGLE_CLIENT_ID".to_string(),
            client_secret: "YOUR_GOOGLE_CLIENT_SECRET".to_string(),
            redirect_port: default_redirect_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Calendar to read and write ("primary" or a calendar ID)
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// How many days ahead fetch_events looks (default: 7)
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
    /// Page size for event listing (default: 50)
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_lookahead_days() -> u32 {
    7
}

fn default_max_results() -> u32 {
    50
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            lookahead_days: default_lookahead_days(),
            max_results: default_max_results(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tempo");

        Self {
            config_dir,
            google: GoogleConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Validate calendar settings
        if self.calendar.calendar_id.is_empty() {
            result.add_error("calendar.calendar_id", "Calendar ID must not be empty");
        }

        if self.calendar.lookahead_days == 0 {
            result.add_error(
                "calendar.lookahead_days",
                "Lookahead must be at least 1 day",
            );
        } else if self.calendar.lookahead_days > 365 {
            result.add_warning(
                "calendar.lookahead_days",
                "Lookahead window is more than a year",
            );
        }

        if self.calendar.max_results == 0 {
            result.add_error("calendar.max_results", "Page size must be greater than 0");
        } else if self.calendar.max_results > 2500 {
            result.add_error(
                "calendar.max_results",
                "Page size exceeds the API maximum of 2500",
            );
        }

        // Validate redirect port
        if self.google.redirect_port == 0 {
            result.add_error("google.redirect_port", "Port cannot be 0");
        }

        // Validate Google config (just warn if not configured)
        if !self.google.is_configured() {
            result.add_warning(
                "google",
                "Google OAuth not configured - sign-in will be unavailable",
            );
        }

        result
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("tempo");

        Ok(config_dir.join("config.toml"))
    }
}
