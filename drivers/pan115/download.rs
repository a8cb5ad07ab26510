//! 115云盘下载地址
//! pickcode -> 签名直链，按调用方UA签发

use reqwest::header::{COOKIE, USER_AGENT};
use serde_json::{json, Value};

use crate::error::DownloadError;

use super::session::{Pan115Session, decode_json};
use super::types::*;

impl Pan115Session {
    /// Resolve a signed download URL for `pick_code` / 获取下载直链
    ///
    /// The URL is signed for `user_agent` (the session UA when empty), and the
    /// returned `header` set must be replayed on the byte fetch.
    pub async fn resolve_download(&self, pick_code: &str, user_agent: &str) -> Result<DownloadInfo, DownloadError> {
        let key = self.codec.generate_key();
        let params = serde_json::to_vec(&json!({ "pickcode": pick_code }))?;
        let data = self.codec.encode(&params, &key)?;

        let ua = if user_agent.is_empty() { self.user_agent() } else { user_agent };
        let url = format!("{}/app/chrome/downurl", self.config.endpoints.proapi);
        let request = self
            .http
            .post(&url)
            .header(COOKIE, self.cookie())
            .header(USER_AGENT, ua)
            .query(&[("t", Self::now_secs().to_string())])
            .form(&[("data", data.as_str())])
            .build()?;
        let header = request.headers().clone();

        let resp = self.http.execute(request).await?;
        let result: DownloadResp = decode_json::<_, DownloadError>(resp).await?;
        result.base.check().map_err(DownloadError::Api)?;

        let encoded = result.data.as_str().unwrap_or_default();
        let decoded = self.codec.decode(encoded, &key)?;
        let download_data: DownloadData = match serde_json::from_slice::<Value>(&decoded)? {
            Value::Object(map) => map,
            _ => DownloadData::new(),
        };

        let Some((file_id, first)) = download_data.into_iter().next() else {
            return Err(DownloadError::UnexpectedEmpty);
        };
        let mut info: DownloadInfo = serde_json::from_value(first)?;
        if info.file_size < 0 {
            tracing::debug!("115 download: file {} reports size {}", file_id, info.file_size);
            return Err(DownloadError::Empty);
        }
        info.header = header;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pan115::mock::{MockProvider, PlainCodec};
    use crate::error::ApiErrorKind;
    use std::sync::Arc;

    fn session(mock: &MockProvider, codec: Arc<PlainCodec>) -> Pan115Session {
        Pan115Session::new(mock.config("UID=1;CID=2;SEID=3"))
            .unwrap()
            .with_codec(codec)
    }

    #[tokio::test]
    async fn test_resolve_download_attaches_request_headers() {
        let mock = MockProvider::start().await;
        mock.set_download_payload(json!({
            "9001": {
                "file_name": "movie.mkv",
                "file_size": "1048576",
                "pick_code": "pc1",
                "url": { "url": "https://cdn.115.com/movie.mkv?sign=x", "client": 1, "oss_id": "o" }
            }
        }));
        let codec = Arc::new(PlainCodec::default());
        let session = session(&mock, codec.clone());

        let info = session.resolve_download("pc1", "VLC/3.0").await.unwrap();
        assert_eq!(info.file_size, 1048576);
        assert_eq!(info.url.url, "https://cdn.115.com/movie.mkv?sign=x");
        assert_eq!(info.header.get(USER_AGENT).unwrap(), "VLC/3.0");
        assert_eq!(info.header.get(COOKIE).unwrap(), "UID=1;CID=2;SEID=3");

        let calls = mock.download_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user_agent, "VLC/3.0");
        assert!(calls[0].t.parse::<i64>().is_ok());
        assert_eq!(calls[0].payload, json!({ "pickcode": "pc1" }));
    }

    #[tokio::test]
    async fn test_resolve_download_fresh_key_per_call() {
        let mock = MockProvider::start().await;
        mock.set_download_payload(json!({ "1": { "file_size": 3, "url": { "url": "u" } } }));
        let codec = Arc::new(PlainCodec::default());
        let session = session(&mock, codec.clone());

        session.resolve_download("same", "").await.unwrap();
        session.resolve_download("same", "").await.unwrap();

        let keys = codec.keys();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
        let calls = mock.download_calls();
        assert_ne!(calls[0].data, calls[1].data);
        assert_eq!(calls[0].user_agent, session.user_agent());
    }

    #[tokio::test]
    async fn test_resolve_download_negative_size() {
        let mock = MockProvider::start().await;
        mock.set_download_payload(json!({
            "1": { "file_size": -1, "url": { "url": "" } },
            "2": { "file_size": 10, "url": { "url": "u" } }
        }));
        let session = session(&mock, Arc::new(PlainCodec::default()));
        assert!(matches!(session.resolve_download("pc", "").await, Err(DownloadError::Empty)));
    }

    #[tokio::test]
    async fn test_resolve_download_empty_set() {
        let mock = MockProvider::start().await;
        mock.set_download_payload(json!({}));
        let session = session(&mock, Arc::new(PlainCodec::default()));
        assert!(matches!(
            session.resolve_download("pc", "").await,
            Err(DownloadError::UnexpectedEmpty)
        ));

        mock.set_download_payload(json!([]));
        assert!(matches!(
            session.resolve_download("pc", "").await,
            Err(DownloadError::UnexpectedEmpty)
        ));
    }

    #[tokio::test]
    async fn test_resolve_download_envelope_error() {
        let mock = MockProvider::start().await;
        mock.set_download_envelope(json!({ "state": false, "msg": "文件不存在", "errno": 50003 }));
        let session = session(&mock, Arc::new(PlainCodec::default()));
        match session.resolve_download("pc", "").await {
            Err(DownloadError::Api(e)) => assert_eq!(e.kind(), ApiErrorKind::NotFound),
            other => panic!("unexpected result: {:?}", other.map(|i| i.file_size)),
        }
    }
}
