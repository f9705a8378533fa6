use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storage::{mask_secret, Credentials};
use utils::error::{Error, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "config.json";
pub const DEFAULT_BUCKET: &str = "audio-qr-1361719303";
pub const DEFAULT_REGION: &str = "ap-chengdu";
pub const DEFAULT_OUTPUT_DIR: &str = "./qr_codes";

/// 本地持久化的连接与输出设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredSettings")]
pub struct Settings {
    pub secret_id: String,
    pub secret_key: String,
    pub bucket_name: String,
    pub region: String,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            bucket_name: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// 文件中的原始形态，缺失或为 null 的键取默认值
#[derive(Deserialize, Default)]
#[serde(default)]
struct StoredSettings {
    secret_id: Option<String>,
    secret_key: Option<String>,
    bucket_name: Option<String>,
    region: Option<String>,
    output_dir: Option<PathBuf>,
}

impl From<StoredSettings> for Settings {
    fn from(stored: StoredSettings) -> Self {
        let defaults = Settings::default();
        Settings {
            secret_id: stored.secret_id.unwrap_or(defaults.secret_id),
            secret_key: stored.secret_key.unwrap_or(defaults.secret_key),
            bucket_name: stored.bucket_name.unwrap_or(defaults.bucket_name),
            region: stored.region.unwrap_or(defaults.region),
            output_dir: stored.output_dir.unwrap_or(defaults.output_dir),
        }
    }
}

impl Settings {
    /// 读取设置文件。文件不存在时返回默认值，缺失的键使用默认值。
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            log::debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("malformed settings file {}: {}", path.display(), e)))
    }

    /// 读取失败时记录警告并回退到默认值
    pub fn load_or_default(path: &Path) -> Settings {
        match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}, falling back to defaults", e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            &self.secret_id,
            &self.secret_key,
            &self.bucket_name,
            &self.region,
        )
    }

    /// 用于展示的副本，密钥被遮盖
    pub fn masked(&self) -> Settings {
        Settings {
            secret_id: mask_secret(&self.secret_id),
            secret_key: mask_secret(&self.secret_key),
            ..self.clone()
        }
    }
}
