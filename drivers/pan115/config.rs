//! 115云盘配置 / 115 session configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// Default page size for directory listing / 默认分页大小
pub const FILE_LIST_LIMIT: i64 = 1000;

/// Default number of signature challenges answered per upload / 默认签名校验次数
pub const DEFAULT_MAX_SIGN_RETRIES: u32 = 3;

pub const UA_115_BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.100 Safari/537.36 115Browser/27.0.3.7";

/// Client identity bound to a QR login / 扫码登录的客户端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QrCodeApp {
    Web,
    Android,
    Ios,
    #[default]
    Linux,
    Mac,
    Windows,
    Tv,
    Alipaymini,
    Wechatmini,
    Qandroid,
}

impl QrCodeApp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::Tv => "tv",
            Self::Alipaymini => "alipaymini",
            Self::Wechatmini => "wechatmini",
            Self::Qandroid => "qandroid",
        }
    }
}

/// API hosts / 接口域名
///
/// Overridable so a session can be pointed at a local mock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub passport: String,
    pub webapi: String,
    pub proapi: String,
    pub uplb: String,
    pub appversion: String,
    pub qrcode: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            passport: "https://passportapi.115.com".to_string(),
            webapi: "https://webapi.115.com".to_string(),
            proapi: "https://proapi.115.com".to_string(),
            uplb: "https://uplb.115.com".to_string(),
            appversion: "https://appversion.115.com".to_string(),
            qrcode: "https://qrcodeapi.115.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Every API on one base URL / 所有接口指向同一地址
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            passport: base.clone(),
            webapi: base.clone(),
            proapi: base.clone(),
            uplb: base.clone(),
            appversion: base.clone(),
            qrcode: base,
        }
    }
}

/// 115云盘会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pan115Config {
    /// Cookie（UID、CID、SEID）
    #[serde(default)]
    pub cookie: String,

    /// 扫码登录令牌，使用一次后清空
    #[serde(default)]
    pub qrcode_token: String,

    /// 扫码登录绑定的客户端
    #[serde(default)]
    pub qrcode_source: QrCodeApp,

    /// 分页大小，<=0 时使用默认值
    #[serde(default)]
    pub page_size: i64,

    /// 默认UA，为空时使用115浏览器UA
    #[serde(default)]
    pub user_agent: String,

    /// 秒传签名校验最多应答次数
    #[serde(default = "default_max_sign_retries")]
    pub max_sign_retries: u32,

    /// ECDH服务端公钥（SEC1十六进制）
    #[serde(default)]
    pub ecdh_server_key: String,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_max_sign_retries() -> u32 {
    DEFAULT_MAX_SIGN_RETRIES
}

impl Default for Pan115Config {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            qrcode_token: String::new(),
            qrcode_source: QrCodeApp::default(),
            page_size: 0,
            user_agent: String::new(),
            max_sign_retries: DEFAULT_MAX_SIGN_RETRIES,
            ecdh_server_key: String::new(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Pan115Config {
    pub fn from_value(value: Value) -> Result<Self, SessionError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_cookie(cookie: &str) -> Self {
        Self {
            cookie: cookie.to_string(),
            ..Default::default()
        }
    }

    /// Page size actually sent to the list API / 实际使用的分页大小
    pub fn effective_page_size(&self, requested: i64) -> i64 {
        if requested > 0 {
            requested
        } else if self.page_size > 0 {
            self.page_size
        } else {
            FILE_LIST_LIMIT
        }
    }

    pub fn effective_user_agent(&self) -> &str {
        if self.user_agent.is_empty() {
            UA_115_BROWSER
        } else {
            &self.user_agent
        }
    }
}
