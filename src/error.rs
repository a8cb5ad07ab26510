//! Error types / 错误类型
//!
//! One enum per operation family so callers can match on the failure kind
//! without string inspection.

use std::fmt;

/// Provider-side error carried inside a JSON envelope / 接口返回的业务错误
///
/// 115 reports application failures with `state=false` plus an errno and a
/// message, independent of the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

/// Known classes of provider errors / 已知错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NotLogin,
    NotFound,
    Verification,
    Other,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self.code {
            99 | 990001 => ApiErrorKind::NotLogin,
            50003 | 70005 => ApiErrorKind::NotFound,
            911 => ApiErrorKind::Verification,
            _ => ApiErrorKind::Other,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "errno {}", self.code)
        } else {
            write!(f, "{} (errno {})", self.message, self.code)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid cipher setup: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CookieParseError {
    #[error("cookie is empty")]
    Empty,

    #[error("cookie is missing {0}")]
    Missing(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("missing cookie or qrcode account")]
    MissingCredential,

    #[error("failed to login by cookies: {0}")]
    Cookie(#[from] CookieParseError),

    #[error("failed to login by qrcode: {0}")]
    QrCode(ApiError),

    #[error("login check failed: {0}")]
    LoginCheckFailed(String),

    #[error("login request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode login response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("list request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode file list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("list rejected: {0}")]
    Api(ApiError),
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decrypted payload is too short")]
    ShortPayload,

    #[error("bad padding in encrypted payload")]
    Padding,

    #[error("no ecdh server key configured")]
    MissingServerKey,

    #[error("invalid ecdh server key")]
    InvalidServerKey,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("file is not downloadable")]
    Empty,

    #[error("download response carried no entries")]
    UnexpectedEmpty,

    #[error("download rejected: {0}")]
    Api(ApiError),

    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode download response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("download payload cipher failed: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("signature challenge repeated {attempts} times, giving up")]
    SignatureChallengeExceeded { attempts: u32 },

    #[error("malformed sign_check range: {0:?}")]
    BadSignCheck(String),

    #[error("upload init rejected: status={status}, statuscode={statuscode}, {message}")]
    Rejected {
        status: i64,
        statuscode: i64,
        message: String,
    },

    #[error("upload info rejected: {0}")]
    Api(ApiError),

    #[error("failed to read upload stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload cipher failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode upload response: {0}")]
    Decode(#[from] serde_json::Error),
}
