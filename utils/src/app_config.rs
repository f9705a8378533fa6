use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

use super::error::Result;

lazy_static! {
    static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// 对象存储访问配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 桶域名中的服务标识，如 `cos`
    pub host: String,
    /// 地域之后的根域名，如 `myqcloud.com`
    pub domain: String,
    /// 单次列举请求的最大对象数
    pub page_size: i32,
}

/// 二维码渲染参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    pub box_size: u32,
    pub border: u32,
    /// L / M / Q / H
    pub error_correction: String,
}

/// 播放页面地址
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub local_page: String,
    pub hosted_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub qr: QrConfig,
    pub player: PlayerConfig,
}

impl AppConfig {
    /// Initialize AppConfig from the embedded defaults and `AUDIO_QR__*` environment variables.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        if let Some(contents) = default_config {
            builder = builder.add_source(config::File::from_str(
                contents,
                config::FileFormat::Toml,
            ));
        }

        // e.g. AUDIO_QR__LOG__LEVEL=debug
        builder = builder.add_source(
            Environment::with_prefix("AUDIO_QR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        *BUILDER.write()? = builder;

        Ok(())
    }

    /// Merge a user supplied TOML file on top of the current configuration.
    pub fn merge_config(config_file: Option<&Path>) -> Result<()> {
        if let Some(path) = config_file {
            let mut builder = BUILDER.write()?;
            *builder = builder.clone().add_source(config::File::from(path));
        }
        Ok(())
    }

    /// Override a single key.
    pub fn set(key: &str, value: &str) -> Result<()> {
        let mut builder = BUILDER.write()?;
        *builder = builder.clone().set_override(key, value)?;
        Ok(())
    }

    pub fn get<'de, T>(key: &'de str) -> Result<T>
    where
        T: serde::Deserialize<'de>,
    {
        Ok(BUILDER.read()?.build_cloned()?.get::<T>(key)?)
    }

    pub fn fetch() -> Result<AppConfig> {
        let config = BUILDER.read()?.build_cloned()?;
        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}
