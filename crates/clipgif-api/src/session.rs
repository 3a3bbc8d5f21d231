//! Per-client job state carried in a signed cookie.
//!
//! The cookie value is `base64(json(Job)).base64(hmac_sha256(payload))`.
//! Nothing is kept server side: a client can only present a job the server
//! signed, so the paths inside can be trusted for purging.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use clipgif_models::Job;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const JOB_COOKIE: &str = "clipgif_job";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies job cookies.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Arc<Vec<u8>>,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
        }
    }

    /// Fresh random key. Sessions signed with it end with the process.
    pub fn random() -> Self {
        Self::new(rand::random::<[u8; 32]>().to_vec())
    }

    fn mac(&self) -> ApiResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::internal(format!("Invalid session key: {}", e)))
    }

    /// Serialize and sign a job.
    pub fn sign(&self, job: &Job) -> ApiResult<String> {
        let json = serde_json::to_vec(job)
            .map_err(|e| ApiError::internal(format!("Failed to encode session: {}", e)))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a signed value. Anything malformed or forged yields `None`.
    pub fn verify(&self, signed: &str) -> Option<Job> {
        let (payload, sig_encoded) = signed.split_once('.')?;
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig_encoded).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&sig_bytes).is_err() {
            debug!("Ignoring session cookie with bad signature");
            return None;
        }

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Cookie recording `job` as this client's current job.
    pub fn job_cookie(&self, job: &Job) -> ApiResult<Cookie<'static>> {
        Ok(Cookie::build((JOB_COOKIE, self.sign(job)?))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build())
    }
}

/// Drop the job cookie from `jar`.
pub fn clear_job(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(JOB_COOKIE).path("/"))
}

/// The requesting client's current job, if it presented a valid cookie.
#[derive(Debug, Clone)]
pub struct ActiveJob(pub Option<Job>);

#[async_trait]
impl FromRequestParts<AppState> for ActiveJob {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let job = jar
            .get(JOB_COOKIE)
            .and_then(|cookie| state.sessions.verify(cookie.value()));
        Ok(Self(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipgif_models::{ConversionParams, JobFiles, JobNames};

    fn job() -> Job {
        let names = JobNames {
            job_id: "1700000000_clip".to_string(),
            raw_filename: "1700000000_clip.mp4".to_string(),
            artifact_filename: "1700000000_clip.gif".to_string(),
        };
        let files = JobFiles {
            raw_path: "uploads/1700000000_clip.mp4".into(),
            artifact_path: "gifs/1700000000_clip.gif".into(),
            preview_path: "static/gifs/1700000000_clip.gif".into(),
        };
        Job::new(&names, "clip.mp4", 2048, files, ConversionParams::default())
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = SessionKeys::new(b"secret".to_vec());
        let signed = keys.sign(&job()).unwrap();
        assert_eq!(keys.verify(&signed), Some(job()));
    }

    #[test]
    fn test_other_key_rejected() {
        let signed = SessionKeys::new(b"one".to_vec()).sign(&job()).unwrap();
        assert!(SessionKeys::new(b"two".to_vec()).verify(&signed).is_none());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let keys = SessionKeys::random();
        let signed = keys.sign(&job()).unwrap();
        let (_, sig) = signed.split_once('.').unwrap();

        let mut forged = job();
        forged.files.raw_path = "/etc/passwd".into();
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        assert!(keys.verify(&format!("{}.{}", payload, sig)).is_none());
        assert!(keys.verify("garbage").is_none());
        assert!(keys.verify("").is_none());
    }
}
