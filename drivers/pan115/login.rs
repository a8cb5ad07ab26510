//! 115云盘登录
//! Cookie 登录、扫码登录与登录状态检查

use crate::error::{ApiError, LoginError};

use super::credential::Credential;
use super::session::{Pan115Session, decode_json};
use super::types::*;

impl Pan115Session {
    /// Establish the session credential / 登录
    ///
    /// A configured QR token wins over the cookie and is consumed on the
    /// first attempt whether or not the exchange succeeds. The credential is
    /// installed only once the liveness check has passed.
    pub async fn login(&mut self) -> Result<(), LoginError> {
        let qrcode_token = std::mem::take(&mut self.config.qrcode_token);

        let credential = if !qrcode_token.is_empty() {
            let cr = self.qrcode_login(&qrcode_token).await?;
            self.config.cookie = cr.to_cookie();
            cr
        } else if !self.config.cookie.is_empty() {
            Credential::from_cookie(&self.config.cookie)?
        } else {
            return Err(LoginError::MissingCredential);
        };

        self.credential = None;
        let check = self.login_check(&credential).await?;

        self.user_id = check.user_id;
        self.credential = Some(credential);
        tracing::info!("115 login ok: user_id={}", self.user_id);
        Ok(())
    }

    async fn qrcode_login(&self, token: &str) -> Result<Credential, LoginError> {
        let app = self.config.qrcode_source.as_str();
        let url = format!("{}/app/1.0/{}/1.0/login/qrcode", self.config.endpoints.passport, app);
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .form(&[("account", token), ("app", app)])
            .send()
            .await?;
        let resp: QrCodeLoginResp = decode_json::<_, LoginError>(resp).await?;
        resp.base.check().map_err(LoginError::QrCode)?;

        let cookie = resp.data.cookie;
        let cr = Credential {
            uid: cookie.uid,
            cid: cookie.cid,
            seid: cookie.seid,
            kid: Some(cookie.kid).filter(|k| !k.is_empty()),
        };
        if cr.uid.is_empty() || cr.cid.is_empty() || cr.seid.is_empty() {
            return Err(LoginError::QrCode(ApiError::new(resp.base.code, "qrcode login returned incomplete cookie")));
        }
        Ok(cr)
    }

    /// Liveness check against the given credential / 检查登录状态
    async fn login_check(&self, credential: &Credential) -> Result<LoginCheckData, LoginError> {
        let url = format!("{}/app/1.0/web/1.0/check/sso", self.config.endpoints.passport);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::COOKIE, credential.to_cookie())
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .send()
            .await
            .map_err(|e| LoginError::LoginCheckFailed(e.to_string()))?;
        let resp: LoginCheckResp = decode_json::<_, LoginError>(resp)
            .await
            .map_err(|e| LoginError::LoginCheckFailed(e.to_string()))?;
        resp.base
            .check()
            .map_err(|e| LoginError::LoginCheckFailed(e.to_string()))?;
        Ok(resp.data)
    }

    /// Start a QR login; show `qrcode` to the user / 获取登录二维码
    pub async fn qrcode_start(&self) -> Result<QrCodeSession, LoginError> {
        let url = format!("{}/api/1.0/web/1.0/token/", self.config.endpoints.qrcode);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .send()
            .await?;
        let resp: QrCodeTokenResp = decode_json::<_, LoginError>(resp).await?;
        resp.base.check().map_err(LoginError::QrCode)?;
        Ok(resp.data)
    }

    /// Poll a QR login; once `Allowed`, put `session.uid` in `qrcode_token` and call [`login`](Self::login) / 查询扫码状态
    pub async fn qrcode_status(&self, session: &QrCodeSession) -> Result<QrCodeStatus, LoginError> {
        let url = format!("{}/get/status/", self.config.endpoints.qrcode);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .query(&[
                ("uid", session.uid.as_str()),
                ("time", &session.time.to_string()),
                ("sign", session.sign.as_str()),
            ])
            .send()
            .await?;
        let resp: QrCodeStatusResp = decode_json::<_, LoginError>(resp).await?;
        resp.base.check().map_err(LoginError::QrCode)?;
        tracing::debug!("115 qrcode status: uid={}, status={}", session.uid, resp.data.status);
        Ok(QrCodeStatus::from(resp.data.status))
    }

    /// Put a session aside for a later [`login`](Self::login) / 设置扫码令牌
    pub fn set_qrcode_token(&mut self, token: &str) {
        self.config.qrcode_token = token.to_string();
    }
}
