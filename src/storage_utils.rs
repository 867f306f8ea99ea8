use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

// CONFIGURATION STRUCTS
// Every field has a default so a partial config.json still loads.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,       // e.g., "gemini-1.5-flash"
    pub api_key_env: String, // name of the variable holding the key
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub timezone: String, // IANA name prices are displayed in
    pub currency: String,
    pub refresh_interval_secs: u64,
    pub live_cache_ttl_secs: u64,
    pub daily_cache_ttl_secs: u64,
    pub sidebar_companies: Vec<String>,
    pub yahoo_base_url: String,
    pub gemini: GeminiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
            currency: "INR".to_string(),
            refresh_interval_secs: 60,
            live_cache_ttl_secs: 60,
            daily_cache_ttl_secs: 3600,
            sidebar_companies: vec![
                "HDFC Bank".to_string(),
                "ICICI Bank".to_string(),
                "State Bank of India".to_string(),
            ],
            yahoo_base_url: "https://query2.finance.yahoo.com".to_string(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {}", self.timezone, e))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn live_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.live_cache_ttl_secs)
    }

    pub fn daily_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.daily_cache_ttl_secs)
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager rooted at `relative_path` next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);
        Self::at(base_dir).await
    }

    pub async fn at(base_dir: PathBuf) -> anyhow::Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Writes `data` as pretty JSON through a temp file and rename, so a crash
    /// mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_of(&format!("{}.json", filename));
        let tmp_path = final_path.with_extension("json.tmp");

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .with_context(|| format!("replacing {}", final_path.display()))?;
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.path_of(&format!("{}.json", filename));
        let content = fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&content).with_context(|| format!("invalid JSON in {}", path.display()))
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    /// Loads `config.json`, writing the defaults first if it does not exist.
    pub async fn load_or_init_config(&self) -> anyhow::Result<AppConfig> {
        if !self.path_of("config.json").exists() {
            let config = AppConfig::default();
            self.save("config", &config).await?;
            return Ok(config);
        }
        self.load("config").await
    }
}
