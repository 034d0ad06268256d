/*
[INPUT]:  API key pair, HTTP method, request path, expiry and JSON body
[OUTPUT]: Hex HMAC-SHA256 signatures and authenticated request headers
[POS]:    HTTP layer - request signing for every exchange call
[UPDATE]: When changing signing algorithm or header format
*/

use crate::http::{ExchangeError, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_EXPIRES_HEADER: &str = "api-expires";
pub const API_KEY_HEADER: &str = "api-key";
pub const API_SIGNATURE_HEADER: &str = "api-signature";
const REQUESTED_WITH_HEADER: &str = "x-requested-with";

/// Signs exchange requests with an expiring HMAC signature
#[derive(Clone)]
pub struct RequestSigner {
    public_key: String,
    private_key: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Sign a request
    ///
    /// Format: "{method}{path}{expires}{body}"
    /// Returns hex-encoded HMAC-SHA256 digest
    pub fn sign(&self, method: &str, path: &str, expires: i64, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.private_key.as_bytes())
            .map_err(|err| ExchangeError::Signature(format!("HMAC init failed: {err}")))?;
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(expires.to_string().as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build the full authenticated header set for one request attempt
    pub fn headers(&self, method: &str, path: &str, expires: i64, body: &str) -> Result<HeaderMap> {
        let signature = self.sign(method, path, expires, body)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(REQUESTED_WITH_HEADER),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(
            HeaderName::from_static(API_EXPIRES_HEADER),
            HeaderValue::from(expires),
        );
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(&self.public_key)
                .map_err(|err| ExchangeError::Config(format!("invalid api key header: {err}")))?,
        );
        headers.insert(
            HeaderName::from_static(API_SIGNATURE_HEADER),
            HeaderValue::from_str(&signature)
                .map_err(|err| ExchangeError::Signature(format!("invalid signature header: {err}")))?,
        );

        Ok(headers)
    }
}
