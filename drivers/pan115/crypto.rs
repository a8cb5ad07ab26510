//! 115云盘加密模块
//! 下载接口使用的 m115 XOR+RSA 混淆编码，以及秒传用到的各类哈希与签名

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use num_bigint::BigUint;
use rand::RngCore;
use sha1::{Digest, Sha1};
use std::io::{Read, Seek, SeekFrom};

use crate::error::{CryptoError, UploadError};

/// Obfuscation codec for the download-info envelope / 下载接口的载荷编码
///
/// Keys are one-shot: callers must ask for a new key on every request.
pub trait PayloadCodec: Send + Sync {
    fn generate_key(&self) -> Vec<u8>;
    fn encode(&self, input: &[u8], key: &[u8]) -> Result<String, CryptoError>;
    fn decode(&self, input: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

const KEY_SIZE: usize = 16;

const XOR_KEY_SEED: [u8; 144] = [
    0xf0, 0xe5, 0x69, 0xae, 0xbf, 0xdc, 0xbf, 0x8a,
    0x1a, 0x45, 0xe8, 0xbe, 0x7d, 0xa6, 0x73, 0xb8,
    0xde, 0x8f, 0xe7, 0xc4, 0x45, 0xda, 0x86, 0xc4,
    0x9b, 0x64, 0x8b, 0x14, 0x6a, 0xb4, 0xf1, 0xaa,
    0x38, 0x01, 0x35, 0x9e, 0x26, 0x69, 0x2c, 0x86,
    0x00, 0x6b, 0x4f, 0xa5, 0x36, 0x34, 0x62, 0xa6,
    0x2a, 0x96, 0x68, 0x18, 0xf2, 0x4a, 0xfd, 0xbd,
    0x6b, 0x97, 0x8f, 0x4d, 0x8f, 0x89, 0x13, 0xb7,
    0x6c, 0x8e, 0x93, 0xed, 0x0e, 0x0d, 0x48, 0x3e,
    0xd7, 0x2f, 0x88, 0xd8, 0xfe, 0xfe, 0x7e, 0x86,
    0x50, 0x95, 0x4f, 0xd1, 0xeb, 0x83, 0x26, 0x34,
    0xdb, 0x66, 0x7b, 0x9c, 0x7e, 0x9d, 0x7a, 0x81,
    0x32, 0xea, 0xb6, 0x33, 0xde, 0x3a, 0xa9, 0x59,
    0x34, 0x66, 0x3b, 0xaa, 0xba, 0x81, 0x60, 0x48,
    0xb9, 0xd5, 0x81, 0x9c, 0xf8, 0x6c, 0x84, 0x77,
    0xff, 0x54, 0x78, 0x26, 0x5f, 0xbe, 0xe8, 0x1e,
    0x36, 0x9f, 0x34, 0x80, 0x5c, 0x45, 0x2c, 0x9b,
    0x76, 0xd5, 0x1b, 0x8f, 0xcc, 0xc3, 0xb8, 0xf5,
];

const XOR_CLIENT_KEY: [u8; 12] = [
    0x78, 0x06, 0xad, 0x4c, 0x33, 0x86, 0x5d, 0x18,
    0x4c, 0x01, 0x3f, 0x46,
];

const RSA_N: [u8; 128] = [
    0x86, 0x86, 0x98, 0x0c, 0x0f, 0x5a, 0x24, 0xc4,
    0xb9, 0xd4, 0x30, 0x20, 0xcd, 0x2c, 0x22, 0x70,
    0x3f, 0xf3, 0xf4, 0x50, 0x75, 0x65, 0x29, 0x05,
    0x8b, 0x1c, 0xf8, 0x8f, 0x09, 0xb8, 0x60, 0x21,
    0x36, 0x47, 0x71, 0x98, 0xa6, 0xe2, 0x68, 0x31,
    0x49, 0x65, 0x9b, 0xd1, 0x22, 0xc3, 0x35, 0x92,
    0xfd, 0xb5, 0xad, 0x47, 0x94, 0x4a, 0xd1, 0xea,
    0x4d, 0x36, 0xc6, 0xb1, 0x72, 0xaa, 0xd6, 0x33,
    0x8c, 0x3b, 0xb6, 0xac, 0x62, 0x27, 0x50, 0x2d,
    0x01, 0x09, 0x93, 0xac, 0x96, 0x7d, 0x1a, 0xef,
    0x00, 0xf0, 0xc8, 0xe0, 0x38, 0xde, 0x2e, 0x4d,
    0x3b, 0xc2, 0xec, 0x36, 0x8a, 0xf2, 0xe9, 0xf1,
    0x0a, 0x6f, 0x1e, 0xda, 0x4f, 0x72, 0x62, 0xf1,
    0x36, 0x42, 0x0c, 0x07, 0xc3, 0x31, 0xb8, 0x71,
    0xbf, 0x13, 0x9f, 0x74, 0xf3, 0x01, 0x0e, 0x3c,
    0x4f, 0xe5, 0x7d, 0xf3, 0xaf, 0xb7, 0x16, 0x83,
];
const RSA_E: u32 = 0x10001;
const RSA_KEY_LEN: usize = RSA_N.len();

/// The provider's own download payload codec / 115 官方 m115 编码
#[derive(Debug, Clone, Copy, Default)]
pub struct M115Codec;

impl PayloadCodec for M115Codec {
    fn generate_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    fn encode(&self, input: &[u8], key: &[u8]) -> Result<String, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::ShortPayload);
        }
        let mut buf = Vec::with_capacity(KEY_SIZE + input.len());
        buf.extend_from_slice(key);
        buf.extend_from_slice(input);

        let data_part = &mut buf[KEY_SIZE..];
        xor_transform(data_part, &xor_derive_key(key, 4));
        data_part.reverse();
        xor_transform(data_part, &XOR_CLIENT_KEY);

        Ok(BASE64.encode(rsa_encrypt(&buf)))
    }

    fn decode(&self, input: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::ShortPayload);
        }
        let data = BASE64.decode(input)?;
        let decrypted = rsa_decrypt(&data);
        if decrypted.len() <= KEY_SIZE {
            return Err(CryptoError::ShortPayload);
        }

        let stored_key = &decrypted[..KEY_SIZE];
        let mut output = decrypted[KEY_SIZE..].to_vec();

        xor_transform(&mut output, &xor_derive_key(stored_key, 12));
        output.reverse();
        xor_transform(&mut output, &xor_derive_key(key, 4));

        Ok(output)
    }
}

fn xor_derive_key(seed: &[u8], size: usize) -> Vec<u8> {
    let mut key = vec![0u8; size];
    for i in 0..size {
        key[i] = seed[i].wrapping_add(XOR_KEY_SEED[size * i]);
        key[i] ^= XOR_KEY_SEED[size * (size - i - 1)];
    }
    key
}

fn xor_transform(data: &mut [u8], key: &[u8]) {
    let head = data.len() % 4;
    for i in 0..head {
        data[i] ^= key[i % key.len()];
    }
    for i in head..data.len() {
        data[i] ^= key[(i - head) % key.len()];
    }
}

fn rsa_encrypt(input: &[u8]) -> Vec<u8> {
    let n = BigUint::from_bytes_be(&RSA_N);
    let e = BigUint::from(RSA_E);

    let mut result = Vec::with_capacity(RSA_KEY_LEN * (input.len() / (RSA_KEY_LEN - 11) + 1));
    for chunk in input.chunks(RSA_KEY_LEN - 11) {
        result.extend_from_slice(&rsa_encrypt_slice(chunk, &n, &e));
    }
    result
}

/// PKCS#1 v1.5 type-2 padding followed by raw modpow.
fn rsa_encrypt_slice(input: &[u8], n: &BigUint, e: &BigUint) -> Vec<u8> {
    let pad_size = RSA_KEY_LEN - input.len() - 3;
    let mut pad_data = vec![0u8; pad_size];
    rand::thread_rng().fill_bytes(&mut pad_data);

    let mut buf = vec![0u8; RSA_KEY_LEN];
    buf[1] = 2;
    for (i, b) in pad_data.iter().enumerate() {
        buf[2 + i] = (b % 0xff) + 0x01;
    }
    buf[pad_size + 3..].copy_from_slice(input);

    let ret = BigUint::from_bytes_be(&buf).modpow(e, n).to_bytes_be();
    let mut result = vec![0u8; RSA_KEY_LEN];
    result[RSA_KEY_LEN - ret.len()..].copy_from_slice(&ret);
    result
}

fn rsa_decrypt(input: &[u8]) -> Vec<u8> {
    let n = BigUint::from_bytes_be(&RSA_N);
    let e = BigUint::from(RSA_E);

    let mut result = Vec::new();
    for chunk in input.chunks(RSA_KEY_LEN) {
        let ret = BigUint::from_bytes_be(chunk).modpow(&e, &n).to_bytes_be();
        // leading zero is stripped by to_bytes_be, skip the padding up to its terminator
        if let Some(pos) = ret.iter().skip(1).position(|&b| b == 0) {
            result.extend_from_slice(&ret[pos + 2..]);
        }
    }
    result
}

pub fn sha1_hex_upper(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

const MD5_SALT: &str = "Qclm8MGWUv59TnrR0XPg";

/// Per-attempt upload token / 秒传请求令牌
///
/// The server derives the token from `fileid` only; `preid` travels in the
/// form but is not part of the hash.
pub fn generate_token(
    user_id: &str,
    file_id: &str,
    file_size: &str,
    sign_key: &str,
    sign_val: &str,
    timestamp: &str,
    app_ver: &str,
) -> String {
    let user_id_md5 = md5_hex(user_id.as_bytes());
    let token_data = format!(
        "{}{}{}{}{}{}{}{}{}",
        MD5_SALT, file_id, file_size, sign_key, sign_val, user_id, timestamp, user_id_md5, app_ver
    );
    md5_hex(token_data.as_bytes())
}

/// Upload-init signature over fileid+target, keyed by the account userkey / 上传签名
pub fn generate_signature(user_id: &str, user_key: &str, file_id: &str, target: &str) -> String {
    let inner = Sha1::digest(format!("{}{}{}0", user_id, file_id, target).as_bytes());
    let sig_str = format!("{}{}000000", user_key, hex::encode(inner));
    sha1_hex_upper(sig_str.as_bytes())
}

pub const PRE_HASH_SIZE: u64 = 128 * 1024;

/// SHA1 of the first 128 KiB / 前128K的SHA1
pub fn calc_pre_hash<R: Read>(reader: &mut R) -> std::io::Result<String> {
    calc_sha1(&mut reader.take(PRE_HASH_SIZE))
}

/// SHA1 of everything left in the reader / 整个文件的SHA1
pub fn calc_sha1<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 65536];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Parses an inclusive `start-end` byte range / 解析 sign_check
pub fn parse_sign_check(range: &str) -> Result<(u64, u64), UploadError> {
    let bad = || UploadError::BadSignCheck(range.to_string());
    let (start, end) = range.split_once('-').ok_or_else(bad)?;
    let start: u64 = start.trim().parse().map_err(|_| bad())?;
    let end: u64 = end.trim().parse().map_err(|_| bad())?;
    if end < start {
        return Err(bad());
    }
    Ok((start, end - start + 1))
}

/// SHA1 over `length` bytes starting at `start`, rewinding first / 区间SHA1
pub fn calc_range_sha1<R: Read + Seek>(reader: &mut R, start: u64, length: u64) -> std::io::Result<String> {
    reader.seek(SeekFrom::Start(start))?;
    calc_sha1(&mut reader.take(length))
}
