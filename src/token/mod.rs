//! Capability tokens.
//!
//! A token grants one subject read access to one object key in one bucket
//! class, until it expires. Tokens carry no server-side state; revocation is
//! only by expiry.
//!
//! # Format
//!
//! Three dot-separated base64url (unpadded) segments:
//!
//! ```text
//! base64url({"alg":"HS256","typ":"LGT"}) . base64url(claims JSON) . base64url(HMAC-SHA256)
//! ```
//!
//! The MAC is computed over the first two segments exactly as they appear in
//! the token, so the claims cannot be altered without invalidating it.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use lexgate::token::{BucketClass, Grant, TokenCodec};
//!
//! let codec = TokenCodec::new("an-example-secret-of-at-least-32-bytes!");
//! let grant = Grant::new("user-42", "videos/intro.mp4", BucketClass::Video);
//!
//! let minted = codec.mint(&grant, Duration::from_secs(600));
//! let claims = codec.verify(&minted.token).unwrap();
//! assert_eq!(claims.grant(), grant);
//! ```

mod claims;

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::clock::unix_now;

pub use claims::{
    BucketClass, Claims, Grant, TokenTtl, DEFAULT_DOCUMENT_TOKEN_TTL, DEFAULT_VIDEO_TOKEN_TTL,
};

type HmacSha256 = Hmac<Sha256>;

/// How far in the future `issued_at` may be before a token is refused.
pub const CLOCK_SKEW_TOLERANCE_SECS: u64 = 60;

const TOKEN_ALG: &str = "HS256";
const TOKEN_TYP: &str = "LGT";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Why a token was refused.
///
/// Every variant means "invalid" to the caller; the distinction only exists
/// for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token header is not supported")]
    UnsupportedHeader,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token expired at {expired_at} (current time: {now})")]
    Expired { expired_at: u64, now: u64 },

    #[error("Token issued in the future at {issued_at} (current time: {now})")]
    NotYetValid { issued_at: u64, now: u64 },
}

/// A freshly minted token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs and verifies capability tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    clock_skew: u64,
    header_segment: String,
}

impl TokenCodec {
    /// Create a codec with the given secret.
    ///
    /// The secret should be at least 32 bytes; configuration validation
    /// enforces this for the server.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let header = serde_json::to_vec(&TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        })
        .expect("token header serializes to JSON");

        Self {
            secret: secret.as_ref().to_vec(),
            clock_skew: CLOCK_SKEW_TOLERANCE_SECS,
            header_segment: URL_SAFE_NO_PAD.encode(header),
        }
    }

    /// Override the tolerated clock skew for `issued_at`.
    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.clock_skew = secs;
        self
    }

    /// Mint a token for `grant` valid for `ttl` from now.
    pub fn mint(&self, grant: &Grant, ttl: Duration) -> MintedToken {
        self.mint_at(grant, ttl, unix_now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn mint_at(&self, grant: &Grant, ttl: Duration, now: u64) -> MintedToken {
        let claims = Claims {
            subject: grant.subject.clone(),
            resource_key: grant.resource_key.clone(),
            bucket_class: grant.bucket_class,
            issued_at: now,
            expires_at: now.saturating_add(ttl.as_secs()),
        };

        let claims_json = serde_json::to_vec(&claims).expect("claims serialize to JSON");
        let signing_input = format!(
            "{}.{}",
            self.header_segment,
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signing_input.as_bytes()));

        MintedToken {
            token: format!("{}.{}", signing_input, signature),
            claims,
        }
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Never panics on untrusted input.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() => (h, c, s),
                _ => return Err(TokenError::Malformed),
            };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed)?;
        let header: TokenHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != TOKEN_ALG || header.typ != TOKEN_TYP {
            return Err(TokenError::UnsupportedHeader);
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        // The signed bytes are the first two segments as transmitted.
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        let expected = self.mac(token[..signing_input_len].as_bytes());

        if !bool::from(provided.ct_eq(&expected)) {
            return Err(TokenError::InvalidSignature);
        }

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;

        if now >= claims.expires_at {
            return Err(TokenError::Expired {
                expired_at: claims.expires_at,
                now,
            });
        }

        if claims.issued_at > now.saturating_add(self.clock_skew) {
            return Err(TokenError::NotYetValid {
                issued_at: claims.issued_at,
                now,
            });
        }

        Ok(claims)
    }

    fn mac(&self, message: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
