use std::path::PathBuf;

/// Server configuration, environment-driven, no external config-file crate —
/// matches the teacher's `DatabaseConfig` shape (`Default` plus env overrides).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,
    pub max_request_bytes: usize,
    pub read_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            port: 8080,
            max_request_bytes: 51_200,
            read_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Layers environment variables over `Config::default()`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("UNTOLD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("UNTOLD_PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }

        if let Ok(max) = std::env::var("UNTOLD_MAX_REQUEST_BYTES") {
            if let Ok(parsed) = max.parse() {
                config.max_request_bytes = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("UNTOLD_READ_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse() {
                config.read_timeout_secs = parsed;
            }
        }

        config
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn key_path(&self) -> PathBuf {
        self.keys_dir().join("main.dat")
    }

    pub fn system_dir(&self) -> PathBuf {
        self.data_dir.join("system")
    }

    pub fn stores_dir(&self) -> PathBuf {
        self.data_dir.join("stores")
    }

    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_source() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_request_bytes, 51_200);
    }

    #[test]
    fn derived_paths_nest_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/untold-test"),
            ..Config::default()
        };
        assert_eq!(config.key_path(), PathBuf::from("/tmp/untold-test/keys/main.dat"));
        assert_eq!(config.system_dir(), PathBuf::from("/tmp/untold-test/system"));
        assert_eq!(config.stores_dir(), PathBuf::from("/tmp/untold-test/stores"));
    }
}
