use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Link cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend: redis | memory | none
    #[serde(rename = "type", default = "default_cache_type")]
    pub cache_type: String,
    /// TTL of a cached link entry, seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl: u64,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
}

/// GeoIP lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_geoip_enabled")]
    pub enabled: bool,
    /// API URL template with `{ip}` placeholder
    #[serde(default = "default_geoip_api_url")]
    pub api_url: String,
    #[serde(default = "default_geoip_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// text | json
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl AppConfig {
    /// Build a configuration snapshot from environment variables.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("HOST", default_server_host()),
                port: env_parse_or("PORT", default_server_port()),
                cpu_count: env_parse_or("WORKERS", default_cpu_count()),
            },
            database: DatabaseConfig {
                database_url: env_or("DATABASE_URL", default_database_url()),
                min_connections: env_parse_or("DB_MIN_CONNECTIONS", default_min_connections()),
                max_connections: env_parse_or("DB_MAX_CONNECTIONS", default_max_connections()),
                connect_timeout_secs: env_parse_or("DB_CONNECT_TIMEOUT", default_connect_timeout()),
            },
            cache: CacheConfig {
                cache_type: match std::env::var("REDIS_URL") {
                    Ok(_) => env_or("CACHE_TYPE", "redis".into()),
                    Err(_) => env_or("CACHE_TYPE", default_cache_type()),
                },
                default_ttl: env_parse_or("CACHE_TTL", default_cache_ttl()),
                redis_url: env_or("REDIS_URL", default_redis_url()),
                key_prefix: env_or("CACHE_KEY_PREFIX", default_redis_key_prefix()),
                memory_capacity: env_parse_or("CACHE_MEMORY_CAPACITY", default_memory_capacity()),
            },
            geoip: GeoIpConfig {
                enabled: env_parse_or("GEOIP_ENABLED", default_geoip_enabled()),
                api_url: env_or("GEOIP_API_URL", default_geoip_api_url()),
                timeout_ms: env_parse_or("GEOIP_TIMEOUT_MS", default_geoip_timeout()),
            },
            logging: LoggingConfig {
                level: env_or("LOG_LEVEL", default_log_level()),
                format: env_or("LOG_FORMAT", default_log_format()),
                file: std::env::var("LOG_FILE").ok().filter(|s| !s.is_empty()),
            },
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn default_database_url() -> String {
    "sqlite://linkforty.db?mode=rwc".to_string()
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_cache_type() -> String {
    "memory".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_key_prefix() -> String {
    "linkforty:".to_string()
}

fn default_memory_capacity() -> u64 {
    10_000
}

fn default_geoip_enabled() -> bool {
    true
}

fn default_geoip_api_url() -> String {
    "http://ip-api.com/json/{ip}?fields=status,countryCode,regionName,city,lat,lon,timezone"
        .to_string()
}

fn default_geoip_timeout() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            default_ttl: default_cache_ttl(),
            redis_url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: default_geoip_enabled(),
            api_url: default_geoip_api_url(),
            timeout_ms: default_geoip_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}
