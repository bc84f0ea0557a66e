//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// HTTP / WebSocket server configuration (host, port)
    pub server: ServerSettings,

    /// RPC gateway listener
    pub rpc: RpcSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (message bus)
    pub redis: RedisSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Connection registry configuration
    pub hub: HubSettings,

    /// Fan-out bridge configuration
    pub bridge: BridgeSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// RPC gateway binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL. Empty selects the in-memory store.
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL. Empty selects the in-process bus.
    pub url: String,
}

/// JWT verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key tokens are signed with
    pub secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Idle read deadline in seconds (default: 60)
    pub read_timeout_secs: u64,

    /// Ping period in seconds (default: 54). Must be shorter than the read deadline.
    pub ping_interval_secs: u64,

    /// Per-frame write deadline in seconds (default: 10)
    pub write_timeout_secs: u64,

    /// Outbound queue slots per connection (default: 256)
    pub queue_capacity: usize,

    /// Protocol violations tolerated before disconnecting (default: 5)
    pub max_violations: u32,
}

/// Connection registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Bound of the register/broadcast/query request channels
    pub command_buffer: usize,
}

/// Fan-out bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    /// How long a message id stays in the dedup window, in seconds
    pub dedup_window_secs: u64,

    /// Maximum number of message ids in the dedup window
    pub dedup_capacity: usize,

    /// Delay before re-subscribing after the bus stream ends, in milliseconds
    pub resubscribe_delay_ms: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if it fails [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("rpc.host", "0.0.0.0")?
            .set_default("rpc.port", 50051)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.url", "")?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // WebSocket settings - transport limits and pump deadlines
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.read_timeout_secs", 60_i64)?
            .set_default("websocket.ping_interval_secs", 54_i64)?
            .set_default("websocket.write_timeout_secs", 10_i64)?
            .set_default("websocket.queue_capacity", 256_i64)?
            .set_default("websocket.max_violations", 5_i64)?
            .set_default("hub.command_buffer", 1024_i64)?
            .set_default("bridge.dedup_window_secs", 30_i64)?
            .set_default("bridge.dedup_capacity", 10_000_i64)?
            .set_default("bridge.resubscribe_delay_ms", 1000_i64)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("rpc.port", std::env::var("RPC_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Reject configurations the relay cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }

        if self.websocket.ping_interval_secs >= self.websocket.read_timeout_secs {
            return Err(ConfigError::Message(format!(
                "websocket.ping_interval_secs ({}) must be shorter than websocket.read_timeout_secs ({})",
                self.websocket.ping_interval_secs, self.websocket.read_timeout_secs
            )));
        }

        if self.websocket.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "websocket.queue_capacity must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the full RPC gateway address as a string.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc.host, self.rpc.port)
    }
}

impl DatabaseSettings {
    /// Whether a PostgreSQL URL is configured.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl RedisSettings {
    /// Whether a Redis URL is configured.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl WebSocketSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl BridgeSettings {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_message_size: 65536,
            max_frame_size: 16384,
            read_timeout_secs: 60,
            ping_interval_secs: 54,
            write_timeout_secs: 10,
            queue_capacity: 256,
            max_violations: 5,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            command_buffer: 1024,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            dedup_window_secs: 30,
            dedup_capacity: 10_000,
            resubscribe_delay_ms: 1000,
        }
    }
}
