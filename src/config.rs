use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub shell: ShellConfig,
    pub execution: ExecutionConfig,
    pub risk: RiskConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ShellConfig {
    pub prompt: String,
    // Skip portable-command translation and hand input to the host
    // interpreter as-is
    pub use_native: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "osh>".to_string(),
            use_native: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Pattern sets and scoring constants for the risk evaluator. All defaults
/// are tunable through the config file; the breakpoints map a summed score
/// to a level (< medium = Low, < high = Medium, < critical = High).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RiskConfig {
    pub critical_operations: Vec<String>,
    pub dangerous_patterns: Vec<String>,
    pub system_paths: Vec<String>,
    pub resource_intensive: Vec<String>,
    pub critical_penalty: u32,
    pub dangerous_penalty: u32,
    pub system_path_penalty: u32,
    pub resource_penalty: u32,
    pub medium_threshold: u32,
    pub high_threshold: u32,
    pub critical_threshold: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            critical_operations: vec![
                "rm -rf /".to_string(),
                "rm -fr /".to_string(),
                "mkfs".to_string(),
                "dd if=/dev/zero".to_string(),
                "dd if=/dev/random".to_string(),
                ":(){".to_string(),
                ":|:&".to_string(),
                "format c:".to_string(),
                "del /s /q c:\\".to_string(),
            ],
            dangerous_patterns: vec![
                "rm ".to_string(),
                "del ".to_string(),
                "rmdir".to_string(),
                "shred".to_string(),
                "kill ".to_string(),
                "killall".to_string(),
                "pkill".to_string(),
                "chmod 777".to_string(),
                "chown ".to_string(),
                "> /dev/".to_string(),
            ],
            system_paths: vec![
                "/etc".to_string(),
                "/usr".to_string(),
                "/bin".to_string(),
                "/sbin".to_string(),
                "/boot".to_string(),
                "/dev/sd".to_string(),
                "c:\\windows".to_string(),
                "c:\\program files".to_string(),
            ],
            resource_intensive: vec![
                "find /".to_string(),
                "grep -r".to_string(),
                "du -a /".to_string(),
                "tar -c /".to_string(),
            ],
            critical_penalty: 10,
            dangerous_penalty: 4,
            system_path_penalty: 2,
            resource_penalty: 1,
            medium_threshold: 4,
            high_threshold: 7,
            critical_threshold: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub log_file: Option<PathBuf>,
    pub max_shown: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_shown: 10,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path();

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path();
        let config_dir = config_path.parent().unwrap();

        fs::create_dir_all(config_dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".osh")
    }

    pub fn history_log_path(&self) -> PathBuf {
        self.history
            .log_file
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("history.log"))
    }

    /// A broken risk configuration must stop the shell before any command
    /// is evaluated.
    pub fn validate(&self) -> Result<()> {
        let lists = [
            ("risk.critical_operations", &self.risk.critical_operations),
            ("risk.dangerous_patterns", &self.risk.dangerous_patterns),
            ("risk.system_paths", &self.risk.system_paths),
            ("risk.resource_intensive", &self.risk.resource_intensive),
        ];
        for (name, list) in lists {
            if list.is_empty() {
                bail!("{} must not be empty", name);
            }
            if list.iter().any(|p| p.trim().is_empty()) {
                bail!(
                    "{} contains an empty pattern (would match every command)",
                    name
                );
            }
        }

        let penalties = [
            ("risk.critical_penalty", self.risk.critical_penalty),
            ("risk.dangerous_penalty", self.risk.dangerous_penalty),
            ("risk.system_path_penalty", self.risk.system_path_penalty),
            ("risk.resource_penalty", self.risk.resource_penalty),
        ];
        for (name, penalty) in penalties {
            if penalty == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        if self.risk.medium_threshold >= self.risk.high_threshold
            || self.risk.high_threshold >= self.risk.critical_threshold
        {
            bail!(
                "risk thresholds must be strictly increasing (medium {} < high {} < critical {})",
                self.risk.medium_threshold,
                self.risk.high_threshold,
                self.risk.critical_threshold
            );
        }

        if self.execution.timeout_secs == 0 {
            bail!("execution.timeout_secs must be greater than zero");
        }

        Ok(())
    }
}
