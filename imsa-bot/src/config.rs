use imsa_core::liveness::NetworkProbe;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Environment variable {name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Invalid probe target {0:?} (expected ip:port)")]
    ProbeTarget(String),
    #[error("Tunable {0} must be greater than zero")]
    Zero(&'static str),
}

/// Tunables read from the optional YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub liveness: LivenessConf,
    pub notify: NotifyConf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LivenessConf {
    pub heartbeat_interval_secs: u64,
    pub watchdog_interval_secs: u64,
    pub probe_targets: Vec<String>, // ex: "8.8.8.8:53"
    pub probe_timeout_ms: u64,
    pub probe_retries: u32,
    pub probe_retry_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConf {
    pub min_downtime_secs: i64,
    pub throttle_ms: u64,
}

impl Default for LivenessConf {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 1,
            watchdog_interval_secs: 60,
            probe_targets: vec!["8.8.8.8:53".into(), "1.1.1.1:53".into()],
            probe_timeout_ms: 3000,
            probe_retries: 5,
            probe_retry_wait_secs: 2,
        }
    }
}

impl Default for NotifyConf {
    fn default() -> Self {
        Self { min_downtime_secs: 60, throttle_ms: 100 }
    }
}

impl LivenessConf {
    /// Zero intervals would turn the heartbeat, watchdog and network wait into busy loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("liveness.heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("liveness.watchdog_interval_secs", self.watchdog_interval_secs),
            ("liveness.probe_timeout_ms", self.probe_timeout_ms),
            ("liveness.probe_retry_wait_secs", self.probe_retry_wait_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(*name));
        }
        self.probe().map(|_| ())
    }

    pub fn probe(&self) -> Result<NetworkProbe, ConfigError> {
        let targets = self
            .probe_targets
            .iter()
            .map(|t| t.parse::<SocketAddr>().map_err(|_| ConfigError::ProbeTarget(t.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NetworkProbe {
            targets,
            connect_timeout: Duration::from_millis(self.probe_timeout_ms),
            retries: self.probe_retries,
            retry_wait: Duration::from_secs(self.probe_retry_wait_secs),
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}

impl NotifyConf {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub owner_id: i64,
    pub data_dir: PathBuf,
    pub tunables: Tunables,
    /// Problems with the tunables file, logged once logging is up.
    pub warnings: Vec<String>,
}

impl BotConfig {
    pub fn heartbeat_path(&self) -> PathBuf {
        self.data_dir.join("heartbeat")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("imsa.db")
    }

    /// Each process gets its own file so rotation never races between them.
    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Builds the config from an env-like lookup; `load_config` passes the real environment.
pub fn config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<BotConfig, ConfigError> {
    let token = required(&lookup, "BOT_TOKEN")?;
    let owner = required(&lookup, "OWNER_USER_ID")?;
    let owner_id = owner
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::Invalid { name: "OWNER_USER_ID", value: owner.clone() })?;

    let data_dir = PathBuf::from(lookup("IMSA_DATA_DIR").unwrap_or_else(|| "./data".into()));
    let tunables_path = lookup("IMSA_CONFIG").unwrap_or_else(|| "imsa.yaml".into());
    let (tunables, warning) = load_tunables(Path::new(&tunables_path));
    // fail now rather than inside the background processes
    tunables.liveness.validate()?;

    Ok(BotConfig { token, owner_id, data_dir, tunables, warnings: warning.into_iter().collect() })
}

pub fn load_config() -> Result<BotConfig, ConfigError> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    config_from(|name| std::env::var(name).ok())
}

/// Absent or empty file → defaults. Unreadable or invalid file → defaults plus a warning.
pub fn load_tunables(path: &Path) -> (Tunables, Option<String>) {
    if !path.exists() {
        return (Tunables::default(), None);
    }
    let txt = match std::fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) => {
            return (
                Tunables::default(),
                Some(format!("Cannot read config {}: {}, using defaults", path.display(), e)),
            )
        }
    };
    if txt.trim().is_empty() {
        return (Tunables::default(), None);
    }
    match serde_yaml::from_str(&txt) {
        Ok(t) => (t, None),
        Err(e) => (
            Tunables::default(),
            Some(format!("Invalid config {}: {}, using defaults", path.display(), e)),
        ),
    }
}
