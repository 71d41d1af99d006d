use std::{fs, path::Path, time::Duration};

use ndnd_fw::ForwarderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub forwarding: ForwardingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub pid_file: String,
    pub user: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// Number of forwarding workers
    pub workers: usize,
    /// Name-prefix depth for worker affinity hashing
    pub affinity_depth: usize,
    /// Packets a worker processes before a voluntary yield
    pub batch_size: usize,
    /// Total content store capacity across all workers
    pub cs_capacity: usize,
    pub cs_admit_unsolicited: bool,
    pub cs_serve: bool,
    pub satisfied_keepalive_ms: u64,
    pub nonce_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig {
                pid_file: "/var/run/ndnd.pid".to_string(),
                user: None,
                group: None,
            },
            forwarding: ForwardingConfig {
                workers: 4,
                affinity_depth: 1,
                batch_size: 64,
                cs_capacity: 4096,
                cs_admit_unsolicited: false,
                cs_serve: true,
                satisfied_keepalive_ms: 250,
                nonce_grace_ms: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl ForwardingConfig {
    pub fn to_forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            workers: self.workers,
            affinity_depth: self.affinity_depth,
            batch_size: self.batch_size,
            cs_capacity: self.cs_capacity,
            cs_admit_unsolicited: self.cs_admit_unsolicited,
            cs_serve: self.cs_serve,
            satisfied_keepalive: Duration::from_millis(self.satisfied_keepalive_ms),
            nonce_grace: Duration::from_millis(self.nonce_grace_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.forwarding.workers, config.forwarding.workers);
        assert_eq!(parsed.logging.level, config.logging.level);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load("/no/such/ndnd.conf").unwrap();
        assert_eq!(config.forwarding.workers, Config::default().forwarding.workers);
    }
}
