//! 115云盘秒传
//!
//! The init request is retried only when the server issues a sign_check
//! challenge, and at most `max_sign_retries` times. Everything else ends
//! the negotiation: either the server already holds the content, or the
//! caller has to upload the bytes through OSS.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use reqwest::header::CONTENT_TYPE;

use crate::error::UploadError;

use super::crypto::{calc_pre_hash, calc_range_sha1, calc_sha1, generate_signature, generate_token, parse_sign_check};
use super::session::Pan115Session;
use super::types::*;

/// Content hashes the init request is built from / 秒传所需哈希
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHashes {
    /// SHA1 of the first 128 KiB
    pub pre_id: String,
    /// SHA1 of the whole file
    pub file_id: String,
}

impl UploadHashes {
    /// Hash the stream from the start, leaving it rewound.
    pub fn compute<R: Read + Seek>(reader: &mut R) -> std::io::Result<Self> {
        reader.rewind()?;
        let pre_id = calc_pre_hash(reader)?;
        reader.rewind()?;
        let file_id = calc_sha1(reader)?;
        reader.rewind()?;
        Ok(Self { pre_id, file_id })
    }
}

/// What to do after one init response / 单次响应后的动作
#[derive(Debug)]
pub enum NegotiationStep {
    /// Challenge answered; send another attempt with the carried sign pair.
    Retry,
    Done(UploadInitResult),
}

/// Retry state carried between init attempts / 秒传重试状态
#[derive(Debug, Clone)]
pub struct RapidUploadNegotiation {
    max_challenges: u32,
    challenges: u32,
    sign_key: String,
    sign_val: String,
}

impl RapidUploadNegotiation {
    pub fn new(max_challenges: u32) -> Self {
        Self {
            max_challenges,
            challenges: 0,
            sign_key: String::new(),
            sign_val: String::new(),
        }
    }

    /// Challenges answered so far
    pub fn challenges(&self) -> u32 {
        self.challenges
    }

    pub fn sign_key(&self) -> &str {
        &self.sign_key
    }

    pub fn sign_val(&self) -> &str {
        &self.sign_val
    }

    /// Feed one decoded init response; a challenge reads the requested range from `stream`.
    pub fn advance<R: Read + Seek>(
        &mut self,
        resp: UploadInitResp,
        stream: &mut R,
    ) -> Result<NegotiationStep, UploadError> {
        match resp.status {
            UploadInitResp::STATUS_MATCHED => Ok(NegotiationStep::Done(UploadInitResult::Accepted(resp))),
            UploadInitResp::STATUS_MUST_UPLOAD => Ok(NegotiationStep::Done(UploadInitResult::MustUpload(resp))),
            UploadInitResp::STATUS_NEED_SIGN_CHECK => {
                if self.challenges >= self.max_challenges {
                    return Err(UploadError::SignatureChallengeExceeded {
                        attempts: self.challenges + 1,
                    });
                }
                let (start, length) = parse_sign_check(&resp.sign_check)?;
                let sign_val = calc_range_sha1(stream, start, length)?;
                tracing::debug!(
                    "115 rapid upload: sign_check {} answered (challenge {})",
                    resp.sign_check,
                    self.challenges + 1
                );
                self.sign_key = resp.sign_key;
                self.sign_val = sign_val;
                self.challenges += 1;
                Ok(NegotiationStep::Retry)
            }
            status => Err(UploadError::Rejected {
                status,
                statuscode: resp.statuscode,
                message: resp.statusmsg,
            }),
        }
    }
}

impl Pan115Session {
    /// Hash-based upload negotiation / 秒传
    ///
    /// `stream` is only read to answer sign_check challenges; it is seeked to
    /// the requested offset each time.
    pub async fn initiate_rapid_upload<R: Read + Seek>(
        &self,
        file_size: i64,
        file_name: &str,
        dir_id: &str,
        pre_id: &str,
        file_id: &str,
        stream: &mut R,
    ) -> Result<UploadInitResult, UploadError> {
        let cipher = self.ecdh.new_session()?;
        let info = self.upload_info().await?;
        let app_ver = self.app_version().await;

        let user_id = match info.user_id {
            0 => self.user_id,
            id => id,
        }
        .to_string();
        let target = format!("U_1_{}", dir_id);
        let file_size_str = file_size.to_string();

        let mut base_form: BTreeMap<&str, String> = BTreeMap::new();
        base_form.insert("appid", "0".to_string());
        base_form.insert("appversion", app_ver.clone());
        base_form.insert("userid", user_id.clone());
        base_form.insert("filename", file_name.to_string());
        base_form.insert("filesize", file_size_str.clone());
        base_form.insert("fileid", file_id.to_string());
        base_form.insert("preid", pre_id.to_string());
        base_form.insert("target", target.clone());
        base_form.insert("sig", generate_signature(&user_id, &info.userkey, file_id, &target));

        let url = format!("{}/4.0/initupload.php", self.config.endpoints.uplb);
        let mut negotiation = RapidUploadNegotiation::new(self.config.max_sign_retries);

        loop {
            let (t, t_str) = Self::now_millis_str();
            let encoded_token = cipher.encode_token(t)?;

            let mut form = base_form.clone();
            form.insert("t", t_str.clone());
            form.insert(
                "token",
                generate_token(
                    &user_id,
                    file_id,
                    &file_size_str,
                    negotiation.sign_key(),
                    negotiation.sign_val(),
                    &t_str,
                    &app_ver,
                ),
            );
            if !negotiation.sign_key().is_empty() && !negotiation.sign_val().is_empty() {
                form.insert("sign_key", negotiation.sign_key().to_string());
                form.insert("sign_val", negotiation.sign_val().to_string());
            }

            let body = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(form.iter())
                .finish();
            let encrypted = cipher.encrypt(body.as_bytes())?;

            tracing::debug!(
                "115 rapid upload: name={}, size={}, attempt={}",
                file_name,
                file_size,
                negotiation.challenges() + 1
            );
            let resp = self
                .with_auth(self.http.post(&url))
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .query(&[("k_ec", encoded_token.as_str())])
                .body(encrypted)
                .send()
                .await?;
            let raw = resp.bytes().await?;
            let decrypted = cipher.decrypt(&raw)?;
            let result: UploadInitResp = serde_json::from_slice(&decrypted)?;

            match negotiation.advance(result, stream) {
                Ok(NegotiationStep::Retry) => continue,
                Ok(NegotiationStep::Done(done)) => {
                    if done.is_accepted() {
                        tracing::info!("115 rapid upload matched: name={}, size={}", file_name, file_size);
                    }
                    return Ok(done);
                }
                Err(e) => {
                    tracing::warn!("115 rapid upload failed: name={}, {}", file_name, e);
                    return Err(e);
                }
            }
        }
    }

    /// Hash `stream`, then negotiate a rapid upload into `dir_id` / 计算哈希并秒传
    pub async fn rapid_upload<R: Read + Seek>(
        &self,
        file_name: &str,
        dir_id: &str,
        stream: &mut R,
    ) -> Result<UploadInitResult, UploadError> {
        let file_size = stream.seek(SeekFrom::End(0))? as i64;
        let hashes = UploadHashes::compute(stream)?;
        self.initiate_rapid_upload(file_size, file_name, dir_id, &hashes.pre_id, &hashes.file_id, stream)
            .await
    }
}
