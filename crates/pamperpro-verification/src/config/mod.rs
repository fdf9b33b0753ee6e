use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::professional::policy::{
    DEFAULT_MIN_CREDENTIAL_LENGTH, DEFAULT_REVIEW_PAGE_SIZE, MAX_REVIEW_PAGE_SIZE,
};
use crate::workflows::professional::{KdfParams, VerificationPolicy};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub verification: VerificationPolicy,
    pub bootstrap_admin: Option<AdminBootstrap>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let review_page_size = parse_number("APP_REVIEW_PAGE_SIZE", DEFAULT_REVIEW_PAGE_SIZE)?;
        if review_page_size == 0 || review_page_size > MAX_REVIEW_PAGE_SIZE {
            return Err(ConfigError::InvalidNumber {
                key: "APP_REVIEW_PAGE_SIZE",
            });
        }
        let min_credential_length =
            parse_number("APP_MIN_CREDENTIAL_LENGTH", DEFAULT_MIN_CREDENTIAL_LENGTH)?;

        let default_kdf = KdfParams::default();
        let kdf = KdfParams {
            memory_kib: parse_number("APP_KDF_MEMORY_KIB", default_kdf.memory_kib)?,
            iterations: parse_number("APP_KDF_ITERATIONS", default_kdf.iterations)?,
            parallelism: default_kdf.parallelism,
        };

        let bootstrap_admin = match (
            env::var("APP_BOOTSTRAP_ADMIN_EMAIL").ok(),
            env::var("APP_BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(credential)) => Some(AdminBootstrap { email, credential }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteAdminBootstrap),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            verification: VerificationPolicy {
                review_page_size,
                min_credential_length,
                kdf,
                ..VerificationPolicy::default()
            },
            bootstrap_admin,
        })
    }
}

fn parse_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Administrator created at startup. Admin roles are never granted by signup.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub credential: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    IncompleteAdminBootstrap,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive number within its allowed range")
            }
            ConfigError::IncompleteAdminBootstrap => write!(
                f,
                "APP_BOOTSTRAP_ADMIN_EMAIL and APP_BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::IncompleteAdminBootstrap => None,
        }
    }
}
