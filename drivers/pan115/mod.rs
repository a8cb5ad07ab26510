//! 115云盘会话
//! 支持Cookie/扫码登录、目录列表、下载直链、秒传协商

pub mod config;
pub mod types;
pub mod crypto;
pub mod ecdh;
pub mod credential;
mod session;
mod login;
mod download;
pub mod upload;

#[cfg(test)]
mod mock;

pub use config::{Endpoints, Pan115Config, QrCodeApp};
pub use credential::Credential;
pub use crypto::{M115Codec, PayloadCodec};
pub use ecdh::{EcdhSuite, P256Suite, SessionCipher};
pub use session::{Pan115Session, APP_VER};
pub use types::{DownloadInfo, FileEntry, FileInfo, QrCodeSession, QrCodeStatus, UploadInitResp, UploadInitResult};
pub use upload::{RapidUploadNegotiation, UploadHashes};
