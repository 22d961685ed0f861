//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub pesapal: PesapalConfig,
    pub sweep: SweepSettings,
    pub notifier: NotifierSettings,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Pesapal gateway configuration
#[derive(Debug, Clone)]
pub struct PesapalConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Where Pesapal redirects the payer's browser after checkout.
    pub callback_url: String,
    /// IPN registration id issued by the Pesapal portal.
    pub notification_id: String,
    pub currency: String,
    pub country_code: String,
    pub description: String,
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

/// Background sweep settings
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub interval_secs: u64,
    pub staleness_minutes: i64,
    pub batch_size: i64,
}

/// Notification worker settings
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub interval_secs: u64,
    pub batch_size: i64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            pesapal: PesapalConfig::from_env()?,
            sweep: SweepSettings::from_env()?,
            notifier: NotifierSettings::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.pesapal.validate()?;
        self.sweep.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl PesapalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PesapalConfig {
            base_url: env::var("PESAPAL_BASE_URL")
                .unwrap_or_else(|_| "https://cybqa.pesapal.com/pesapalv3".to_string()),
            consumer_key: env::var("PESAPAL_CONSUMER_KEY")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_CONSUMER_KEY".to_string()))?,
            consumer_secret: env::var("PESAPAL_CONSUMER_SECRET")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_CONSUMER_SECRET".to_string()))?,
            callback_url: env::var("PESAPAL_CALLBACK_URL")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_CALLBACK_URL".to_string()))?,
            notification_id: env::var("PESAPAL_NOTIFICATION_ID")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_NOTIFICATION_ID".to_string()))?,
            currency: env::var("PESAPAL_CURRENCY").unwrap_or_else(|_| "KES".to_string()),
            country_code: env::var("PESAPAL_COUNTRY_CODE").unwrap_or_else(|_| "KE".to_string()),
            description: env::var("PESAPAL_DESCRIPTION")
                .unwrap_or_else(|_| "Payment for goods".to_string()),
            request_timeout: env::var("PESAPAL_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_REQUEST_TIMEOUT".to_string()))?,
            max_retries: env::var("PESAPAL_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_CONSUMER_KEY and PESAPAL_CONSUMER_SECRET cannot be empty".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_REQUEST_TIMEOUT".to_string(),
            ));
        }

        Ok(())
    }
}

impl SweepSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SweepSettings {
            interval_secs: env::var("SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWEEP_INTERVAL_SECONDS".to_string()))?,
            staleness_minutes: env::var("SWEEP_STALENESS_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWEEP_STALENESS_MINUTES".to_string()))?,
            batch_size: env::var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWEEP_BATCH_SIZE".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        if self.batch_size <= 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_BATCH_SIZE must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl NotifierSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(NotifierSettings {
            interval_secs: env::var("NOTIFIER_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NOTIFIER_INTERVAL_SECONDS".to_string()))?,
            batch_size: env::var("NOTIFIER_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NOTIFIER_BATCH_SIZE".to_string()))?,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pesapal_config() -> PesapalConfig {
        PesapalConfig {
            base_url: "https://cybqa.pesapal.com/pesapalv3".to_string(),
            consumer_key: "ck_test".to_string(),
            consumer_secret: "cs_test".to_string(),
            callback_url: "https://merchant.example/payments/complete".to_string(),
            notification_id: "ipn-id".to_string(),
            currency: "KES".to_string(),
            country_code: "KE".to_string(),
            description: "Payment for goods".to_string(),
            request_timeout: 30,
            max_retries: 3,
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Invalid port
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pesapal_config_validation() {
        assert!(pesapal_config().validate().is_ok());

        let mut bad_url = pesapal_config();
        bad_url.base_url = "cybqa.pesapal.com".to_string();
        assert!(bad_url.validate().is_err());

        let mut no_secret = pesapal_config();
        no_secret.consumer_secret = String::new();
        assert!(no_secret.validate().is_err());
    }

    #[test]
    fn test_sweep_settings_validation() {
        let settings = SweepSettings {
            interval_secs: 120,
            staleness_minutes: 15,
            batch_size: 200,
        };
        assert!(settings.validate().is_ok());

        let zero_interval = SweepSettings {
            interval_secs: 0,
            ..settings.clone()
        };
        assert!(zero_interval.validate().is_err());
    }
}
