//! Application configuration
//!
//! Configuration is environment-driven: a single [`AppConfig`] snapshot is
//! built from process environment variables at startup (after `dotenv`) and
//! then shared read-only. There is no runtime mutation; a restart picks up
//! new values.

mod structs;

pub use structs::*;

use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration from the environment.
///
/// Safe to call more than once; later calls are no-ops (used by tests).
pub fn init_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::from_env)
}

/// Get the global configuration. Panics if `init_config` was never called.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get().expect("config not initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_get_returns_same_snapshot() {
        let a = init_config();
        let b = get_config();
        assert_eq!(a.server.port, b.server.port);
    }
}
