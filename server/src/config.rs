use std::env;
use std::time::Duration;

/// Process-wide configuration, read once at startup from the environment
/// (optionally seeded from a `.env` file).
#[derive(Debug, Clone)]
pub struct Config {
    pub enable_multithreading: bool,
    /// Worker threads for the executor; 0 means "cores - 1".
    pub threads_count: usize,
    pub heartbeat_interval: Duration,
    pub thermite_address: String,
    pub thermite_port: u16,
    pub db_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enable_multithreading: true,
            threads_count: 0,
            heartbeat_interval: Duration::from_millis(100),
            thermite_address: "127.0.0.1".to_string(),
            thermite_port: 7000,
            db_name: "hearth.sqlite3".to_string(),
        }
    }
}

fn var_parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn load() -> Config {
        let defaults = Config::default();
        Config {
            enable_multithreading: var_parsed(
                "HEARTH_MULTITHREADING",
                defaults.enable_multithreading,
            ),
            threads_count: var_parsed("HEARTH_THREADS", defaults.threads_count),
            heartbeat_interval: Duration::from_millis(var_parsed(
                "HEARTH_HEARTBEAT_MS",
                defaults.heartbeat_interval.as_millis() as u64,
            )),
            thermite_address: env::var("HEARTH_THERMITE_ADDR")
                .unwrap_or(defaults.thermite_address),
            thermite_port: var_parsed("HEARTH_THERMITE_PORT", defaults.thermite_port),
            db_name: env::var("HEARTH_DB").unwrap_or(defaults.db_name),
        }
    }
}
