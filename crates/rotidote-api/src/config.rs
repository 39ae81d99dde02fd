//! API configuration.

use std::time::Duration;

use serde::Serialize;

const MIB: usize = 1024 * 1024;

/// Which upstream services have credentials configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfiguredServices {
    pub mux: bool,
    pub cloudinary: bool,
    pub firebase: bool,
}

impl ConfiguredServices {
    pub fn from_env() -> Self {
        let present = |name: &str| std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false);
        Self {
            mux: present("MUX_TOKEN_ID"),
            cloudinary: present("CLOUDINARY_CLOUD_NAME"),
            firebase: present("FIREBASE_PROJECT_ID"),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Requests allowed per client IP within one window
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max JSON request body size
    pub max_json_body: usize,
    /// Max size of a single uploaded file
    pub max_file_size: usize,
    /// Environment (development/production)
    pub environment: String,
    pub metrics_enabled: bool,
    pub services: ConfiguredServices,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            trust_proxy: false,
            request_timeout: Duration::from_secs(120),
            max_json_body: 10 * MIB,
            max_file_size: 100 * MIB,
            environment: "development".to_string(),
            metrics_enabled: true,
            services: ConfiguredServices::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_max: parse_env("RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            rate_limit_window: parse_env("RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            trust_proxy: parse_flag("TRUST_PROXY").unwrap_or(defaults.trust_proxy),
            request_timeout: parse_env("REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_json_body: parse_env("MAX_JSON_BODY").unwrap_or(defaults.max_json_body),
            max_file_size: parse_env("MAX_FILE_SIZE").unwrap_or(defaults.max_file_size),
            environment: std::env::var("ENVIRONMENT")
                .or_else(|_| std::env::var("NODE_ENV"))
                .unwrap_or(defaults.environment),
            metrics_enabled: parse_flag("METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
            services: ConfiguredServices::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Body limit for the multipart upload route: three files plus form fields.
    pub fn upload_body_limit(&self) -> usize {
        self.max_file_size.saturating_mul(3).saturating_add(MIB)
    }

    /// Human-readable file size cap, e.g. "100MB".
    pub fn max_file_size_label(&self) -> String {
        format!("{}MB", self.max_file_size / MIB)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn parse_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| v == "true" || v == "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
        assert_eq!(config.max_file_size_label(), "100MB");
        assert_eq!(config.upload_body_limit(), 301 * MIB);
        assert!(!config.is_production());
        assert!(!config.trust_proxy);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("PORT", "8080");
        std::env::set_var("ALLOWED_ORIGINS", "https://rotidote.app, https://admin.rotidote.app,");
        std::env::remove_var("ENVIRONMENT");
        std::env::set_var("NODE_ENV", "production");
        std::env::set_var("MUX_TOKEN_ID", "id");
        std::env::remove_var("CLOUDINARY_CLOUD_NAME");
        std::env::set_var("TRUST_PROXY", "true");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origins,
            vec!["https://rotidote.app", "https://admin.rotidote.app"]
        );
        assert!(config.is_production());
        assert!(config.services.mux);
        assert!(!config.services.cloudinary);
        assert!(config.trust_proxy);

        for name in ["PORT", "ALLOWED_ORIGINS", "NODE_ENV", "MUX_TOKEN_ID", "TRUST_PROXY"] {
            std::env::remove_var(name);
        }
    }
}
