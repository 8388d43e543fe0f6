use std::fmt;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use ig_core::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a signed token
pub const TOKEN_TTL_SECS: i64 = 1800;
/// Tolerated clock skew on the `nbf` claim
pub const NOT_BEFORE_SKEW_SECS: i64 = 5;

/// Access/secret key pair used to sign every remote call.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_key.trim().is_empty() {
            return Err(Error::Configuration("access key is missing".into()));
        }
        if self.secret_key.trim().is_empty() {
            return Err(Error::Configuration("secret key is missing".into()));
        }
        Ok(())
    }

    /// Fresh token for the next request. Never cache the result.
    pub fn sign(&self) -> Result<SignedToken> {
        sign(&self.access_key, &self.secret_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: i64,
    pub nbf: i64,
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// Compact HS256 JWT
#[derive(Debug, Clone)]
pub struct SignedToken {
    token: String,
    claims: Claims,
}

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

pub fn sign(access_key: &str, secret_key: &str) -> Result<SignedToken> {
    sign_at(access_key, secret_key, Utc::now())
}

pub fn sign_at(access_key: &str, secret_key: &str, now: DateTime<Utc>) -> Result<SignedToken> {
    Credentials::new(access_key, secret_key).validate()?;

    let issued_at = now.timestamp();
    let claims = Claims {
        iss: access_key.to_string(),
        exp: issued_at + TOKEN_TTL_SECS,
        nbf: issued_at - NOT_BEFORE_SKEW_SECS,
    };
    let header = Header { alg: "HS256", typ: "JWT" };

    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| Error::Configuration(format!("unusable secret key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(SignedToken {
        token: format!("{signing_input}.{signature}"),
        claims,
    })
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| Error::Configuration(format!("cannot encode token: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
