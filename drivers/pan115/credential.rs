//! 登录凭证

use crate::error::CookieParseError;

/// UID/CID/SEID token set / 115 登录凭证
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub uid: String,
    pub cid: String,
    pub seid: String,
    pub kid: Option<String>,
}

impl Credential {
    pub fn from_cookie(cookie: &str) -> Result<Self, CookieParseError> {
        if cookie.trim().is_empty() {
            return Err(CookieParseError::Empty);
        }

        let mut cr = Credential::default();
        for pair in cookie.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_uppercase().as_str() {
                "UID" => cr.uid = value,
                "CID" => cr.cid = value,
                "SEID" => cr.seid = value,
                "KID" if !value.is_empty() => cr.kid = Some(value),
                _ => {}
            }
        }

        if cr.uid.is_empty() {
            return Err(CookieParseError::Missing("UID"));
        }
        if cr.cid.is_empty() {
            return Err(CookieParseError::Missing("CID"));
        }
        if cr.seid.is_empty() {
            return Err(CookieParseError::Missing("SEID"));
        }
        Ok(cr)
    }

    pub fn to_cookie(&self) -> String {
        let mut cookie = format!("UID={};CID={};SEID={}", self.uid, self.cid, self.seid);
        if let Some(kid) = &self.kid {
            cookie.push_str(";KID=");
            cookie.push_str(kid);
        }
        cookie
    }
}
