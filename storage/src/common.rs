use serde::{Deserialize, Serialize};
use utils::error::{Error, Result};

/// 可识别的音频扩展名（小写，按完整后缀匹配）
pub const AUDIO_EXTENSIONS: [&str; 7] = [".mp3", ".wav", ".m4a", ".flac", ".aac", ".ogg", ".wma"];

pub const DEFAULT_STORAGE_HOST: &str = "cos";
pub const DEFAULT_STORAGE_DOMAIN: &str = "myqcloud.com";

/// 判断对象 key 是否为音频文件，大小写不敏感
pub fn is_audio_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// 取 key 的最后一段作为显示名称
pub fn display_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// 访问凭证与目标桶
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl Credentials {
    pub fn new(
        secret_id: impl Into<String>, secret_key: impl Into<String>, bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// 发起网络请求前检查必填字段
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("secret_id", &self.secret_id),
            ("secret_key", &self.secret_key),
            ("bucket_name", &self.bucket),
            ("region", &self.region),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "missing required credential fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// 日志中只展示 SecretId 的前缀
    pub fn masked_id(&self) -> String {
        mask_secret(&self.secret_id)
    }
}

pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let prefix: String = secret.chars().take(6).collect();
    format!("{}...", prefix)
}

/// 桶的访问域名信息，对象 URL 仅由它和 key 决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTarget {
    pub bucket: String,
    pub region: String,
    pub host: String,
    pub domain: String,
}

impl BucketTarget {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            host: DEFAULT_STORAGE_HOST.to_string(),
            domain: DEFAULT_STORAGE_DOMAIN.to_string(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>, domain: impl Into<String>) -> Self {
        self.host = host.into();
        self.domain = domain.into();
        self
    }

    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(&credentials.bucket, &credentials.region)
    }

    /// `https://{bucket}.{host}.{region}.{domain}/{key}`
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.{}.{}.{}/{}",
            self.bucket, self.host, self.region, self.domain, key
        )
    }

    /// 区域服务端点，不含桶名
    pub fn endpoint(&self) -> String {
        format!("https://{}.{}.{}", self.host, self.region, self.domain)
    }
}

/// 一个音频对象的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub last_modified: String,
    pub url: String,
}

impl FileDescriptor {
    pub fn new(target: &BucketTarget, key: &str, size: u64, last_modified: &str) -> Self {
        Self {
            key: key.to_string(),
            name: display_name(key).to_string(),
            size,
            last_modified: last_modified.to_string(),
            url: target.object_url(key),
        }
    }

    /// 去掉扩展名的文件名，用于输出 PNG
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(pos) => &self.name[..pos],
        }
    }

    pub fn png_name(&self) -> String {
        format!("{}.png", self.stem())
    }

    pub fn size_mb(&self) -> String {
        format!("{:.2} MB", self.size as f64 / (1024.0 * 1024.0))
    }

    /// 修改时间截取到秒，如 `2024-05-01T10:20:30`
    pub fn modified_short(&self) -> &str {
        match self.last_modified.char_indices().nth(19) {
            Some((idx, _)) => &self.last_modified[..idx],
            None => &self.last_modified,
        }
    }
}
