// Client configuration shared by the API client, the search service and checkout

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::api::ClientError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";
pub const DEFAULT_GEOCODING_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_BASE_CURRENCY: &str = "USD";

// A booking with more rooms than this is routed through the group workflow
pub const DEFAULT_GROUP_ROOM_THRESHOLD: u32 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub geocoding_url: String,
    pub timeout_ms: u64,
    pub group_room_threshold: u32,
    pub base_currency_code: String,
    pub coordinates_ttl_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            timeout_ms: 10_000,
            group_room_threshold: DEFAULT_GROUP_ROOM_THRESHOLD,
            base_currency_code: DEFAULT_BASE_CURRENCY.to_string(),
            coordinates_ttl_seconds: 3600,
        }
    }
}

impl ClientConfig {
    /// Builds a configuration from `STAY_*` environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let config = Self {
            backend_url: try_load("STAY_BACKEND_URL", defaults.backend_url)?,
            geocoding_url: try_load("STAY_GEOCODING_URL", defaults.geocoding_url)?,
            timeout_ms: try_load("STAY_TIMEOUT_MS", defaults.timeout_ms)?,
            group_room_threshold: try_load(
                "STAY_GROUP_ROOM_THRESHOLD",
                defaults.group_room_threshold,
            )?,
            base_currency_code: try_load("STAY_BASE_CURRENCY", defaults.base_currency_code)?,
            coordinates_ttl_seconds: try_load(
                "STAY_COORDINATES_TTL_SECONDS",
                defaults.coordinates_ttl_seconds,
            )?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.backend_url.trim().is_empty() {
            return Err(ClientError::ConfigError("backend_url is empty".to_string()));
        }
        if self.geocoding_url.trim().is_empty() {
            return Err(ClientError::ConfigError(
                "geocoding_url is empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.base_currency_code.len() != 3 {
            return Err(ClientError::ConfigError(format!(
                "base_currency_code must be a 3-letter code, got {:?}",
                self.base_currency_code
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn coordinates_ttl(&self) -> Duration {
        Duration::from_secs(self.coordinates_ttl_seconds)
    }

    // Joins a backend path without doubling the slash
    pub fn backend_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ClientError::ConfigError(format!("invalid {key}: {e}"))
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.group_room_threshold, 9);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_backend_endpoint_joins_cleanly() {
        let config = ClientConfig {
            backend_url: "https://api.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.backend_endpoint("/api/groups/bookingRequest"),
            "https://api.example.com/api/groups/bookingRequest"
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ClientConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClientError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_bad_currency_code() {
        let config = ClientConfig {
            base_currency_code: "EURO".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
