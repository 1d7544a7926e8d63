//! Digest and MAC primitives shared by the vendor signature schemes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::Md5;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::SmsError;

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
pub const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`RFC3986`] but keeps `/` literal, for canonical URI paths.
pub const RFC3986_PATH: &AsciiSet = &RFC3986.remove(b'/');

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, RFC3986).to_string()
}

pub fn md5_hex(input: impl AsRef<[u8]>) -> String {
    hex::encode(Md5::digest(input.as_ref()))
}

pub fn sha1_hex(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(input.as_ref()))
}

pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(input.as_ref()))
}

pub fn sha256_base64(input: impl AsRef<[u8]>) -> String {
    STANDARD.encode(Sha256::digest(input.as_ref()))
}

pub fn base64(input: impl AsRef<[u8]>) -> String {
    STANDARD.encode(input)
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SmsError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| SmsError::Http(format!("hmac key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String, SmsError> {
    hmac_sha256(key, data).map(hex::encode)
}

pub fn hmac_sha1_base64(key: &[u8], data: &[u8]) -> Result<String, SmsError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| SmsError::Http(format!("hmac key: {}", e)))?;
    mac.update(data);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
