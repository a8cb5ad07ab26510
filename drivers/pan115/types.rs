//! 115云盘类型定义

use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ApiError;

/// Accepts `123`, `"123"`, `null` or nothing / 兼容数字与字符串
pub(crate) fn de_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => b as i64,
        _ => 0,
    })
}

/// Accepts `true`, `1` or `"1"` / 兼容布尔与数字
pub(crate) fn de_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Accepts strings and numbers as text / 数字也当字符串读
pub(crate) fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Common envelope fields / 通用响应字段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BasicResp {
    #[serde(default, deserialize_with = "de_lenient_bool")]
    pub state: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub errno: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub errcode: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub code: i64,
}

impl BasicResp {
    pub fn message(&self) -> &str {
        [&self.error, &self.msg, &self.message]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn check(&self) -> Result<(), ApiError> {
        if self.state {
            return Ok(());
        }
        let code = [self.errno, self.errcode, self.code]
            .into_iter()
            .find(|c| *c != 0)
            .unwrap_or(0);
        Err(ApiError::new(code, self.message()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileInfo {
    #[serde(default, rename = "fid", deserialize_with = "de_lenient_string")]
    pub file_id: String,
    #[serde(default, rename = "cid", deserialize_with = "de_lenient_string")]
    pub category_id: String,
    #[serde(default, rename = "pid", deserialize_with = "de_lenient_string")]
    pub parent_id: String,
    #[serde(default, rename = "n")]
    pub name: String,
    #[serde(default, rename = "s", deserialize_with = "de_lenient_i64")]
    pub size: i64,
    #[serde(default, rename = "pc")]
    pub pick_code: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "t", deserialize_with = "de_lenient_string")]
    pub modified_time: String,
    #[serde(default, rename = "te", deserialize_with = "de_lenient_string")]
    pub updated_time: String,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.file_id.is_empty() && !self.category_id.is_empty()
    }
}

/// Read-only view of a listed file / 文件条目
#[derive(Debug, Clone)]
pub struct FileEntry(pub FileInfo);

impl FileEntry {
    pub fn id(&self) -> &str {
        if self.0.is_dir() {
            &self.0.category_id
        } else {
            &self.0.file_id
        }
    }

    /// Directories report `pid`, files report their containing `cid`.
    pub fn parent_id(&self) -> &str {
        if self.0.is_dir() {
            &self.0.parent_id
        } else {
            &self.0.category_id
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> i64 {
        self.0.size
    }

    pub fn pick_code(&self) -> &str {
        &self.0.pick_code
    }

    pub fn sha1(&self) -> &str {
        &self.0.sha
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    pub fn info(&self) -> &FileInfo {
        &self.0
    }
}

impl From<FileInfo> for FileEntry {
    fn from(info: FileInfo) -> Self {
        Self(info)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileListResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: Vec<FileInfo>,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub count: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub offset: i64,
}

/// Signed download descriptor / 下载信息
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DownloadInfo {
    #[serde(default)]
    pub file_name: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub file_size: i64,
    #[serde(default)]
    pub pick_code: String,
    #[serde(default)]
    pub url: DownloadUrl,
    /// Headers the byte fetch must replay / 下载时需携带的请求头
    #[serde(skip)]
    pub header: HeaderMap,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DownloadUrl {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub client: i64,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub oss_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DownloadResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: Value,
}

/// Decrypted download payload, keyed by file id in server order / 解密后的下载数据
pub type DownloadData = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UploadInitResp {
    #[serde(default)]
    pub request: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub status: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub statuscode: i64,
    #[serde(default)]
    pub statusmsg: String,
    #[serde(default)]
    pub pickcode: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub callback: UploadCallback,
    #[serde(default)]
    pub sign_key: String,
    #[serde(default)]
    pub sign_check: String,
    #[serde(default, rename = "SHA1")]
    pub sha1: String,
}

impl UploadInitResp {
    pub const STATUS_MUST_UPLOAD: i64 = 1;
    pub const STATUS_MATCHED: i64 = 2;
    pub const STATUS_NEED_SIGN_CHECK: i64 = 7;

    pub fn is_matched(&self) -> bool {
        self.status == Self::STATUS_MATCHED
    }

    pub fn need_sign_check(&self) -> bool {
        self.status == Self::STATUS_NEED_SIGN_CHECK
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct UploadCallback {
    #[serde(default)]
    pub callback: String,
    #[serde(default)]
    pub callback_var: String,
}

/// Server decision for a rapid upload / 秒传结果
#[derive(Debug, Clone)]
pub enum UploadInitResult {
    /// Content already exists server-side, nothing to transfer / 秒传成功
    Accepted(UploadInitResp),
    /// Caller must transfer the bytes through OSS / 需要正常上传
    MustUpload(UploadInitResp),
}

impl UploadInitResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn response(&self) -> &UploadInitResp {
        match self {
            Self::Accepted(resp) | Self::MustUpload(resp) => resp,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UploadInfoResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub user_id: i64,
    #[serde(default)]
    pub userkey: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub size_limit: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VersionResp {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub data: BTreeMap<String, VersionInfo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VersionInfo {
    #[serde(default)]
    pub version_code: String,
    #[serde(default)]
    pub version: String,
}

impl VersionInfo {
    pub fn version(&self) -> &str {
        if self.version_code.is_empty() {
            &self.version
        } else {
            &self.version_code
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoginCheckResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: LoginCheckData,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoginCheckData {
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeLoginResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: QrCodeLoginData,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeLoginData {
    #[serde(default)]
    pub cookie: QrCodeCookie,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeCookie {
    #[serde(default, rename = "UID")]
    pub uid: String,
    #[serde(default, rename = "CID")]
    pub cid: String,
    #[serde(default, rename = "SEID")]
    pub seid: String,
    #[serde(default, rename = "KID")]
    pub kid: String,
}

/// QR login session shown to the user / 二维码会话
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct QrCodeSession {
    #[serde(default)]
    pub uid: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub time: i64,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub qrcode: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeTokenResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: QrCodeSession,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeStatusResp {
    #[serde(flatten)]
    pub base: BasicResp,
    #[serde(default)]
    pub data: QrCodeStatusData,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrCodeStatusData {
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

/// 扫码状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrCodeStatus {
    Waiting,
    Scanned,
    Allowed,
    Expired,
    Canceled,
    Unknown(i64),
}

impl From<i64> for QrCodeStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Waiting,
            1 => Self::Scanned,
            2 => Self::Allowed,
            -1 => Self::Expired,
            -2 => Self::Canceled,
            other => Self::Unknown(other),
        }
    }
}
