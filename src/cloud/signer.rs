//! TC3-HMAC-SHA256 request signing for Tencent Cloud API 3.0.
//!
//! Signs over `content-type` and `host` only; the action, version and
//! timestamp travel in `X-TC-*` headers and the timestamp is bound into
//! the credential scope.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::types::ProviderError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

/// Signs POST JSON requests for one service host.
pub struct Tc3Signer {
    secret_id: SecretString,
    secret_key: SecretString,
    host: String,
    service: String,
}

impl Tc3Signer {
    /// `host` is the API endpoint, e.g. `lighthouse.tencentcloudapi.com`;
    /// the service name is its first label.
    pub fn new(secret_id: SecretString, secret_key: SecretString, host: &str) -> Self {
        let service = host.split('.').next().unwrap_or(host).to_string();
        Self {
            secret_id,
            secret_key,
            host: host.to_string(),
            service,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Value of the `Authorization` header for `payload` sent at
    /// `timestamp` (unix seconds).
    pub fn authorization(&self, payload: &str, timestamp: i64) -> Result<String, ProviderError> {
        let date = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| ProviderError::Request(format!("invalid timestamp {timestamp}")))?
            .format("%Y-%m-%d")
            .to_string();
        let scope = format!("{date}/{}/tc3_request", self.service);

        let canonical_request = format!(
            "POST\n/\n\ncontent-type:{CONTENT_TYPE}\nhost:{}\n\n{SIGNED_HEADERS}\n{}",
            self.host,
            sha256_hex(payload.as_bytes()),
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes()),
        );

        let key = format!("TC3{}", self.secret_key.expose_secret());
        let secret_date = hmac_sha256(key.as_bytes(), date.as_bytes())?;
        let secret_service = hmac_sha256(&secret_date, self.service.as_bytes())?;
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
        let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

        Ok(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.secret_id.expose_secret(),
        ))
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ProviderError::Request(format!("hmac key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
