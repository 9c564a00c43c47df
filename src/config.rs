//! 起動設定。CLI引数と環境変数から組み立てる。
//!
//! - 第1引数: テーブルファイルのパス（既定 `books.json`）
//! - `BOOKLOG_LOG`: ログフィルタ（`EnvFilter` 構文）
//! - `BOOKLOG_LOG_FORMAT`: `pretty` | `compact` | `json`
//! - `BOOKLOG_LINGER_MS`: 一覧購読を破棄するまでの猶予（ミリ秒）

use std::path::PathBuf;
use std::time::Duration;

use crate::application::view_model::DEFAULT_LINGER;
use crate::logging::{LogFormat, LoggingConfig, LoggingError};

pub const DEFAULT_STORE_PATH: &str = "books.json";

pub const ENV_LOG: &str = "BOOKLOG_LOG";
pub const ENV_LOG_FORMAT: &str = "BOOKLOG_LOG_FORMAT";
pub const ENV_LINGER_MS: &str = "BOOKLOG_LINGER_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("{name} must be a non-negative integer (got '{0}')", name = ENV_LINGER_MS)]
    InvalidLinger(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub linger: Duration,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            linger: DEFAULT_LINGER,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// プロセスの引数と環境変数から読む。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_sources(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// `args` はプログラム名を除いた引数列。
    pub fn from_sources(
        mut args: impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = args.next() {
            config.store_path = PathBuf::from(path);
        }
        if let Some(filter) = env(ENV_LOG) {
            config.logging = config.logging.with_filter(filter);
        }
        if let Some(format) = env(ENV_LOG_FORMAT) {
            config.logging = config.logging.with_format(format.parse::<LogFormat>()?);
        }
        if let Some(raw) = env(ENV_LINGER_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLinger(raw.clone()))?;
            config.linger = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
