use serde::{Deserialize, Serialize};
use std::str::FromStr;
use storage::FileDescriptor;
use utils::app_config::PlayerConfig;
use utils::error::Error;

pub const DEFAULT_LOCAL_PLAYER_PAGE: &str = "./player.html";
pub const DEFAULT_HOSTED_PLAYER_URL: &str = "https://audio-qr-system2-3lm6.vercel.app/wechat_player.html";

/// 二维码内容的生成方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrMode {
    /// 音频直链
    Direct,
    /// 本地播放页面，URL 不编码
    #[serde(rename = "player")]
    LocalPlayer,
    /// 托管的微信播放页面，URL 作为编码后的查询参数
    #[default]
    #[serde(rename = "wechat")]
    HostedWeChatPlayer,
}

impl QrMode {
    pub const ALL: [QrMode; 3] = [QrMode::Direct, QrMode::LocalPlayer, QrMode::HostedWeChatPlayer];

    pub fn as_str(&self) -> &'static str {
        match self {
            QrMode::Direct => "direct",
            QrMode::LocalPlayer => "player",
            QrMode::HostedWeChatPlayer => "wechat",
        }
    }

    /// 无法识别的名称回退为直链
    pub fn from_name_or_direct(name: &str) -> QrMode {
        name.parse().unwrap_or(QrMode::Direct)
    }
}

impl std::fmt::Display for QrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QrMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(QrMode::Direct),
            "player" | "local" | "local-player" => Ok(QrMode::LocalPlayer),
            "wechat" | "hosted" | "hosted-wechat" => Ok(QrMode::HostedWeChatPlayer),
            other => Err(Error::validation(format!(
                "unknown QR mode '{}', expected one of: direct, player, wechat",
                other
            ))),
        }
    }
}

/// 根据模式生成二维码内容，纯函数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBuilder {
    pub local_page: String,
    pub hosted_url: String,
}

impl Default for ContentBuilder {
    fn default() -> Self {
        Self {
            local_page: DEFAULT_LOCAL_PLAYER_PAGE.to_string(),
            hosted_url: DEFAULT_HOSTED_PLAYER_URL.to_string(),
        }
    }
}

impl From<&PlayerConfig> for ContentBuilder {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            local_page: config.local_page.clone(),
            hosted_url: config.hosted_url.clone(),
        }
    }
}

impl ContentBuilder {
    pub fn build(&self, descriptor: &FileDescriptor, mode: QrMode) -> String {
        let url = &descriptor.url;
        match mode {
            QrMode::Direct => url.clone(),
            QrMode::LocalPlayer => format!("{}?url={}", self.local_page, url),
            QrMode::HostedWeChatPlayer => {
                format!("{}?url={}", self.hosted_url, urlencoding::encode(url))
            }
        }
    }
}

pub fn build_content(descriptor: &FileDescriptor, mode: QrMode) -> String {
    ContentBuilder::default().build(descriptor, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::BucketTarget;

    fn descriptors() -> Vec<FileDescriptor> {
        let target = BucketTarget::new("audio-qr-1361719303", "ap-chengdu");
        vec![
            FileDescriptor::new(&target, "a.mp3", 1, ""),
            FileDescriptor::new(&target, "专辑/第 1 首 & more?.flac", 2, ""),
            FileDescriptor::new(&target, "x=y/a b#c.ogg", 3, ""),
        ]
    }

    fn query_url(content: &str) -> String {
        let (_, encoded) = content.split_once("?url=").unwrap();
        urlencoding::decode(encoded).unwrap().into_owned()
    }

    #[test]
    fn test_direct_is_verbatim() {
        for d in descriptors() {
            assert_eq!(build_content(&d, QrMode::Direct), d.url);
        }
    }

    #[test]
    fn test_local_player_is_unencoded() {
        for d in descriptors() {
            assert_eq!(
                build_content(&d, QrMode::LocalPlayer),
                format!("./player.html?url={}", d.url)
            );
        }
    }

    #[test]
    fn test_hosted_player_round_trip() {
        for d in descriptors() {
            let content = build_content(&d, QrMode::HostedWeChatPlayer);
            assert!(content.starts_with(DEFAULT_HOSTED_PLAYER_URL));
            assert_eq!(query_url(&content), d.url);

            let encoded = content.split_once("?url=").unwrap().1;
            for unsafe_char in [' ', '/', ':', '?', '&', '=', '#'] {
                assert!(!encoded.contains(unsafe_char), "{} left in {}", unsafe_char, encoded);
            }
        }
    }

    #[test]
    fn test_hosted_encoding_exact() {
        let target = BucketTarget::new("b", "r");
        let d = FileDescriptor::new(&target, "a.mp3", 1, "");
        assert_eq!(
            build_content(&d, QrMode::HostedWeChatPlayer),
            "https://audio-qr-system2-3lm6.vercel.app/wechat_player.html?url=https%3A%2F%2Fb.cos.r.myqcloud.com%2Fa.mp3"
        );
    }

    #[test]
    fn test_custom_player_urls() {
        let builder = ContentBuilder {
            local_page: "/srv/player.html".to_string(),
            hosted_url: "https://pages.example.com/p.html".to_string(),
        };
        let d = &descriptors()[0];
        assert!(builder.build(d, QrMode::LocalPlayer).starts_with("/srv/player.html?url=https://"));
        assert!(builder
            .build(d, QrMode::HostedWeChatPlayer)
            .starts_with("https://pages.example.com/p.html?url=https%3A"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("direct".parse::<QrMode>().unwrap(), QrMode::Direct);
        assert_eq!("Player".parse::<QrMode>().unwrap(), QrMode::LocalPlayer);
        assert_eq!("wechat".parse::<QrMode>().unwrap(), QrMode::HostedWeChatPlayer);
        assert!("bogus".parse::<QrMode>().is_err());
        assert_eq!(QrMode::from_name_or_direct("bogus"), QrMode::Direct);
        assert_eq!(QrMode::default(), QrMode::HostedWeChatPlayer);
        for mode in QrMode::ALL {
            assert_eq!(mode.to_string().parse::<QrMode>().unwrap(), mode);
        }
    }
}
