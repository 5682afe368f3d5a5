use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p256::pkcs8::{self, DecodePrivateKey, EncodePrivateKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::InteropConfig;
use crate::error::{Result, VolumeError};
use crate::payload::Exposure;
use crate::report::whole_millis;

/// Latency of a single upload in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTimings {
    pub duration: u64,
}

/// Uploads one tagged batch. Returns `None` when nothing was sent.
#[async_trait]
pub trait Upload: Send + Sync {
    async fn upload(&self, batch_tag: &str, payload: &[Exposure]) -> Result<Option<UploadTimings>>;
}

/// Private key used to produce compact JWS signatures. The algorithm follows
/// the key type: EC P-256 signs with ES256, EC P-384 with ES384, RSA with
/// RS256, Ed25519 with EdDSA. Other curves are rejected.
#[derive(Clone)]
pub struct SigningKey {
    key: EncodingKey,
    algorithm: Algorithm,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn from_pem(pem: &str) -> Result<Self> {
        // Keys passed through environment variables often carry escaped newlines.
        let pem = pem.replace("\\n", "\n");
        let pem = pem.trim();

        let signing_key = match Self::from_ec_pem(pem)? {
            Some(signing_key) => signing_key,
            None => Self::from_rsa_or_ed_pem(pem.as_bytes())?,
        };

        // Some key problems only show up when signing, so sign once now.
        jsonwebtoken::crypto::sign(b"", &signing_key.key, signing_key.algorithm)
            .map_err(|err| VolumeError::KeyParse(err.to_string()))?;

        Ok(signing_key)
    }

    /// EC keys in SEC1 (`EC PRIVATE KEY`) or PKCS#8 form. `None` when the
    /// key is not an EC key at all.
    fn from_ec_pem(pem: &str) -> Result<Option<Self>> {
        if let Ok(secret) = p256::SecretKey::from_sec1_pem(pem) {
            return Self::from_pkcs8_doc(secret.to_pkcs8_der(), Algorithm::ES256).map(Some);
        }
        if let Ok(secret) = p384::SecretKey::from_sec1_pem(pem) {
            return Self::from_pkcs8_doc(secret.to_pkcs8_der(), Algorithm::ES384).map(Some);
        }
        if pem.contains("BEGIN EC PRIVATE KEY") {
            return Err(unsupported_curve());
        }

        let Ok(key) = EncodingKey::from_ec_pem(pem.as_bytes()) else {
            return Ok(None);
        };
        let algorithm = if p256::SecretKey::from_pkcs8_pem(pem).is_ok() {
            Algorithm::ES256
        } else if p384::SecretKey::from_pkcs8_pem(pem).is_ok() {
            Algorithm::ES384
        } else {
            return Err(unsupported_curve());
        };

        Ok(Some(Self { key, algorithm }))
    }

    fn from_pkcs8_doc(
        der: pkcs8::Result<pkcs8::SecretDocument>,
        algorithm: Algorithm,
    ) -> Result<Self> {
        let der = der.map_err(|err| VolumeError::KeyParse(err.to_string()))?;
        Ok(Self {
            key: EncodingKey::from_ec_der(der.as_bytes()),
            algorithm,
        })
    }

    fn from_rsa_or_ed_pem(bytes: &[u8]) -> Result<Self> {
        if let Ok(key) = EncodingKey::from_rsa_pem(bytes) {
            return Ok(Self {
                key,
                algorithm: Algorithm::RS256,
            });
        }

        EncodingKey::from_ed_pem(bytes)
            .map(|key| Self {
                key,
                algorithm: Algorithm::EdDSA,
            })
            .map_err(|err| VolumeError::KeyParse(err.to_string()))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String> {
        let mut header = Header::new(self.algorithm);
        header.typ = None;
        Ok(jsonwebtoken::encode(&header, payload, &self.key)?)
    }
}

fn unsupported_curve() -> VolumeError {
    VolumeError::KeyParse("unsupported EC curve, expected P-256 or P-384".to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest<'a> {
    batch_tag: &'a str,
    payload: String,
}

/// Signs batches and posts them to `{url}/upload`.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    key: SigningKey,
}

impl Uploader {
    pub fn new(url: &str, token: &str, private_key: &str) -> Result<Self> {
        let key = SigningKey::from_pem(private_key)?;
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/upload", url.trim_end_matches('/')),
            token: token.to_string(),
            key,
        })
    }

    pub fn from_config(config: &InteropConfig) -> Result<Self> {
        Self::new(&config.url, &config.upload.token, &config.upload.private_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Upload for Uploader {
    async fn upload(&self, batch_tag: &str, payload: &[Exposure]) -> Result<Option<UploadTimings>> {
        if payload.is_empty() {
            return Ok(None);
        }

        let body = UploadRequest {
            batch_tag,
            payload: self.key.sign(&payload)?,
        };
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body);

        let start = Instant::now();
        let response = request.send().await?;
        let elapsed = start.elapsed();

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(VolumeError::Upload { status, body });
        }

        let duration = whole_millis(elapsed);
        debug!(batch_tag, exposures = payload.len(), duration_ms = duration, "Uploaded batch");

        Ok(Some(UploadTimings { duration }))
    }
}
