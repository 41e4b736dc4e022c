//! 应用配置持久化

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::trellis_dir;
use crate::error::Result;

/// Environment variable holding the AccuWeather API key.
pub const ACCUWEATHER_KEY_ENV: &str = "ACCUWEATHER_API_KEY";
/// Environment variable holding the Aviation Stack API key.
pub const AVIATION_STACK_KEY_ENV: &str = "AVIATION_STACK_API_KEY";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub travel: TravelConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

/// 任务存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

/// 任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub storage: StorageBackend,
    /// 存储文件路径（默认 ~/.trellis/tasks.json 或 tasks.db）
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_max_title_length")]
    pub max_title_length: usize,
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
}

fn default_max_title_length() -> usize {
    200
}

fn default_max_description_length() -> usize {
    1000
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            file: None,
            max_title_length: default_max_title_length(),
            max_description_length: default_max_description_length(),
        }
    }
}

impl TasksConfig {
    /// 解析实际使用的存储文件路径
    pub fn storage_path(&self, backend: StorageBackend) -> PathBuf {
        if let Some(file) = &self.file {
            return file.clone();
        }
        match backend {
            StorageBackend::Json => trellis_dir().join("tasks.json"),
            StorageBackend::Sqlite => trellis_dir().join("tasks.db"),
        }
    }
}

/// 旅行工具配置（API 地址、超时、密钥）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelConfig {
    #[serde(default = "default_accuweather_base_url")]
    pub accuweather_base_url: String,
    #[serde(default = "default_aviationstack_base_url")]
    pub aviationstack_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuweather_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aviationstack_api_key: Option<String>,
}

fn default_accuweather_base_url() -> String {
    "http://dataservice.accuweather.com".to_string()
}

fn default_aviationstack_base_url() -> String {
    "https://api.aviationstack.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            accuweather_base_url: default_accuweather_base_url(),
            aviationstack_base_url: default_aviationstack_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            accuweather_api_key: None,
            aviationstack_api_key: None,
        }
    }
}

impl TravelConfig {
    /// Fill API keys from the environment. Environment wins over the file;
    /// `.env` in the working directory is loaded first if present.
    pub fn with_env_keys(mut self) -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        if let Some(key) = env_key(ACCUWEATHER_KEY_ENV) {
            self.accuweather_api_key = Some(key);
        }
        if let Some(key) = env_key(AVIATION_STACK_KEY_ENV) {
            self.aviationstack_api_key = Some(key);
        }
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// MCP Server 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    /// 不对外暴露的工具名（如 "search_flights"）
    #[serde(default)]
    pub disabled_tools: Vec<String>,
}

/// 获取配置文件路径
pub fn config_path() -> PathBuf {
    trellis_dir().join("config.toml")
}

/// 加载配置（首次运行写出默认配置；解析失败则返回默认值）
pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        let config = Config::default();
        if let Err(e) = save_config(&config) {
            tracing::debug!(path = %path.display(), error = %e, "cannot write default config");
        }
        return config;
    }
    super::load_toml(&path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        Config::default()
    })
}

/// 保存配置
pub fn save_config(config: &Config) -> Result<()> {
    super::save_toml(&config_path(), config)?;
    Ok(())
}
