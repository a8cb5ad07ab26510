//! 秒传会话加密
//!
//! Each upload negotiation derives a short-lived AES key from an ephemeral
//! ECDH exchange with the server key; the client public key travels in the
//! `k_ec` token so the server can derive the same key.

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

use crate::error::CryptoError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const TOKEN_SALT: &[u8] = b"^j>WD3Kr?J2gLFjD4W2y@";

/// Per-negotiation cipher / 单次秒传会话的加密器
pub trait SessionCipher: Send {
    fn encode_token(&self, timestamp: i64) -> Result<String, CryptoError>;
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Builds a fresh [`SessionCipher`] per upload / 会话加密器工厂
pub trait EcdhSuite: Send + Sync {
    fn new_session(&self) -> Result<Box<dyn SessionCipher>, CryptoError>;
}

/// P-256 suite keyed by a server public key in SEC1 hex
#[derive(Debug, Clone, Default)]
pub struct P256Suite {
    server_key: Option<PublicKey>,
}

impl P256Suite {
    pub fn from_hex(server_key: &str) -> Result<Self, CryptoError> {
        if server_key.trim().is_empty() {
            return Ok(Self { server_key: None });
        }
        let bytes = hex::decode(server_key.trim()).map_err(|_| CryptoError::InvalidServerKey)?;
        let key = PublicKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidServerKey)?;
        Ok(Self { server_key: Some(key) })
    }
}

impl EcdhSuite for P256Suite {
    fn new_session(&self) -> Result<Box<dyn SessionCipher>, CryptoError> {
        let server_key = self.server_key.as_ref().ok_or(CryptoError::MissingServerKey)?;
        let secret = EphemeralSecret::random(&mut rand::rngs::OsRng);
        let public = secret.public_key().to_encoded_point(true).as_bytes().to_vec();
        let shared = secret.diffie_hellman(server_key);
        Ok(Box::new(EcdhCipher::from_shared(public, shared.raw_secret_bytes().as_slice())))
    }
}

/// AES-128-CBC keyed by an ECDH shared secret
pub struct EcdhCipher {
    public_key: Vec<u8>,
    aes_key: [u8; 16],
    aes_iv: [u8; 16],
}

impl EcdhCipher {
    /// `shared` must hold at least 32 bytes; key is the head, iv the tail.
    pub fn from_shared(public_key: Vec<u8>, shared: &[u8]) -> Self {
        let mut aes_key = [0u8; 16];
        let mut aes_iv = [0u8; 16];
        aes_key.copy_from_slice(&shared[..16]);
        aes_iv.copy_from_slice(&shared[shared.len() - 16..]);
        Self {
            public_key,
            aes_key,
            aes_iv,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

/// Layout: `pubkey || ts (u64 BE) || md5(salt || pubkey || ts)[..4]`
pub fn pack_token(public_key: &[u8], timestamp: i64) -> String {
    let ts = (timestamp as u64).to_be_bytes();
    let mut check_input = Vec::with_capacity(TOKEN_SALT.len() + public_key.len() + ts.len());
    check_input.extend_from_slice(TOKEN_SALT);
    check_input.extend_from_slice(public_key);
    check_input.extend_from_slice(&ts);
    let check = md5::compute(&check_input);

    let mut token = Vec::with_capacity(public_key.len() + 12);
    token.extend_from_slice(public_key);
    token.extend_from_slice(&ts);
    token.extend_from_slice(&check.0[..4]);
    BASE64.encode(token)
}

/// Splits a token into the client public key and timestamp, verifying the check bytes.
pub fn unpack_token(token: &str) -> Result<(Vec<u8>, i64), CryptoError> {
    let raw = BASE64.decode(token)?;
    if raw.len() < 13 {
        return Err(CryptoError::ShortPayload);
    }
    let (body, _) = raw.split_at(raw.len() - 4);
    let (public_key, ts) = body.split_at(body.len() - 8);
    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(ts);
    let timestamp = u64::from_be_bytes(ts_bytes) as i64;
    if pack_token(public_key, timestamp) != token {
        return Err(CryptoError::Padding);
    }
    Ok((public_key.to_vec(), timestamp))
}

impl SessionCipher for EcdhCipher {
    fn encode_token(&self, timestamp: i64) -> Result<String, CryptoError> {
        Ok(pack_token(&self.public_key, timestamp))
    }

    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let enc = Aes128CbcEnc::new(&self.aes_key.into(), &self.aes_iv.into());
        Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plain))
    }

    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let dec = Aes128CbcDec::new(&self.aes_key.into(), &self.aes_iv.into());
        dec.decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| CryptoError::Padding)
    }
}
