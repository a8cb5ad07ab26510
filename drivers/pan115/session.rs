//! 115云盘会话
//!
//! Holds the HTTP client, the active credential and the crypto capabilities.
//! Every operation is a single request/response exchange on top of these;
//! nothing is cached between calls.

use reqwest::{Client, RequestBuilder, header::{COOKIE, USER_AGENT}};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{ListError, SessionError, UploadError};

use super::config::Pan115Config;
use super::credential::Credential;
use super::crypto::{M115Codec, PayloadCodec};
use super::ecdh::{EcdhSuite, P256Suite};
use super::types::*;

/// Fallback when the version API is unreachable / 获取版本失败时使用
pub const APP_VER: &str = "27.0.3.7";

/// Authenticated 115 session / 115 会话
///
/// Credential replacement takes `&mut self`; hosts sharing a session wrap it
/// in an `RwLock` so logins are serialized against other calls.
pub struct Pan115Session {
    pub(crate) config: Pan115Config,
    pub(crate) http: Client,
    pub(crate) credential: Option<Credential>,
    pub(crate) user_id: i64,
    pub(crate) codec: Arc<dyn PayloadCodec>,
    pub(crate) ecdh: Arc<dyn EcdhSuite>,
}

impl Pan115Session {
    pub fn new(config: Pan115Config) -> Result<Self, SessionError> {
        let http = Client::builder().build()?;
        let ecdh = P256Suite::from_hex(&config.ecdh_server_key)?;

        Ok(Self {
            config,
            http,
            credential: None,
            user_id: 0,
            codec: Arc::new(M115Codec),
            ecdh: Arc::new(ecdh),
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_ecdh(mut self, ecdh: Arc<dyn EcdhSuite>) -> Self {
        self.ecdh = ecdh;
        self
    }

    pub fn config(&self) -> &Pan115Config {
        &self.config
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Replace the active credential in one step / 替换凭证
    pub fn set_credential(&mut self, credential: Credential) {
        self.config.cookie = credential.to_cookie();
        self.credential = Some(credential);
    }

    /// Cookie header sent with every request / 请求使用的Cookie
    pub fn cookie(&self) -> String {
        match &self.credential {
            Some(cr) => cr.to_cookie(),
            None => self.config.cookie.clone(),
        }
    }

    pub fn user_agent(&self) -> &str {
        self.config.effective_user_agent()
    }

    pub(crate) fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(COOKIE, self.cookie())
            .header(USER_AGENT, self.user_agent())
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub(crate) fn now_secs() -> i64 {
        chrono::Utc::now().timestamp()
    }

    pub(crate) fn now_millis_str() -> (i64, String) {
        let t = Self::now_millis();
        (t, t.to_string())
    }

    /// List a directory, following pagination to the end / 列出目录
    pub async fn list_files(&self, dir_id: &str, page_size: i64) -> Result<Vec<FileEntry>, ListError> {
        let limit = self.config.effective_page_size(page_size);
        let url = format!("{}/files", self.config.endpoints.webapi);
        let mut files = Vec::new();
        let mut offset = 0i64;

        loop {
            let resp = self
                .with_auth(self.http.get(&url))
                .query(&[
                    ("aid", "1"),
                    ("cid", dir_id),
                    ("o", "user_ptime"),
                    ("asc", "0"),
                    ("offset", &offset.to_string()),
                    ("limit", &limit.to_string()),
                    ("show_dir", "1"),
                    ("snap", "0"),
                    ("natsort", "1"),
                    ("record_open_time", "1"),
                    ("format", "json"),
                    ("fc_mix", "0"),
                ])
                .send()
                .await?;
            let page: FileListResp = decode_json::<_, ListError>(resp).await?;
            page.base.check().map_err(ListError::Api)?;

            let got = page.data.len() as i64;
            tracing::debug!("115 list: cid={}, offset={}, got={}, count={}", dir_id, offset, got, page.count);
            files.extend(page.data.into_iter().map(FileEntry::from));
            offset += got;

            // The server may cap a page below `limit`; trust `count` when it is reported.
            let done = if page.count > 0 {
                offset >= page.count
            } else {
                got < limit
            };
            if got == 0 || done {
                break;
            }
        }

        Ok(files)
    }

    pub async fn list_files_default(&self, dir_id: &str) -> Result<Vec<FileEntry>, ListError> {
        self.list_files(dir_id, 0).await
    }

    /// Current Windows client version, or [`APP_VER`] / 获取客户端版本
    pub async fn app_version(&self) -> String {
        match self.fetch_app_version().await {
            Ok(resp) if !resp.error.is_empty() => {
                tracing::warn!("115 app version lookup rejected, using {}: {}", APP_VER, resp.error);
                APP_VER.to_string()
            }
            Ok(resp) => match resp.data.get("win").map(|v| v.version()).filter(|v| !v.is_empty()) {
                Some(ver) => ver.to_string(),
                None => {
                    tracing::warn!("115 app version: no win entry, using {}", APP_VER);
                    APP_VER.to_string()
                }
            },
            Err(e) => {
                tracing::warn!("115 app version lookup failed, using {}: {}", APP_VER, e);
                APP_VER.to_string()
            }
        }
    }

    async fn fetch_app_version(&self) -> Result<VersionResp, reqwest::Error> {
        let url = format!("{}/1/web/1.0/api/getMultiVer", self.config.endpoints.appversion);
        self.with_auth(self.http.get(&url)).send().await?.json().await
    }

    /// Account upload parameters (user id, userkey) / 上传信息
    pub async fn upload_info(&self) -> Result<UploadInfoResp, UploadError> {
        let url = format!("{}/app/uploadinfo", self.config.endpoints.proapi);
        let resp = self.with_auth(self.http.get(&url)).send().await?;
        let info: UploadInfoResp = decode_json::<_, UploadError>(resp).await?;
        info.base.check().map_err(UploadError::Api)?;
        Ok(info)
    }
}

/// Reads the whole body, then decodes it, keeping transport and decode failures apart.
pub(crate) async fn decode_json<T, E>(resp: reqwest::Response) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<reqwest::Error> + From<serde_json::Error>,
{
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
