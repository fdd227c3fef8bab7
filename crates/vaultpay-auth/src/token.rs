//! Token Codec
//!
//! Compact three-part signed tokens:
//!
//! ```text
//! base64url(header) "." base64url(payload) "." base64url(HMAC-SHA256(secret, header "." payload))
//! ```
//!
//! Segments are unpadded. The header is fixed to `{"alg":"HS256","typ":"JWT"}`
//! and the payload carries `sub`, `exp` and `iat`. Verification checks the
//! signature before it looks at the payload.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::TokenClaims;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Signs and verifies access tokens with a symmetric secret.
///
/// The secret is owned by the codec and is read-only after construction.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Arc<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec; an empty secret is rejected
    pub fn new(secret: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::SecretNotConfigured);
        }
        Ok(Self {
            secret: Arc::new(Zeroizing::new(secret)),
        })
    }

    pub fn from_config(config: &TokenConfig) -> AuthResult<Self> {
        Self::new(config.secret.as_bytes().to_vec())
    }

    /// Issue a token for `subject` valid for `ttl`
    pub fn issue(&self, subject: &str, ttl: std::time::Duration) -> AuthResult<String> {
        self.issue_at(subject, ttl, Utc::now())
    }

    /// Issue a token as of `now`
    pub fn issue_at(
        &self,
        subject: &str,
        ttl: std::time::Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        if subject.is_empty() {
            return Err(AuthError::Internal("cannot issue a token for an empty subject".to_string()));
        }
        if ttl.is_zero() {
            return Err(AuthError::Internal("token lifetime must be positive".to_string()));
        }

        let claims = TokenClaims {
            subject: subject.to_string(),
            exp: expiry_after(now, ttl)?.timestamp(),
            iat: now.timestamp(),
        };

        self.encode(&claims)
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
                (h, p, s)
            }
            _ => return Err(AuthError::MalformedToken),
        };

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;

        let signing_input = &token[..header.len() + 1 + payload.len()];
        let expected = self.sign(signing_input.as_bytes())?;

        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(AuthError::InvalidSignature);
        }

        let header: TokenHeader = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::MalformedToken);
        }

        let claims: TokenClaims = decode_segment(payload)?;
        if claims.subject.is_empty() {
            return Err(AuthError::MalformedToken);
        }
        if claims.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn encode(&self, claims: &TokenClaims) -> AuthResult<String> {
        let header = TokenHeader {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };

        let mut token = String::with_capacity(256);
        token.push_str(&encode_segment(&header)?);
        token.push('.');
        token.push_str(&encode_segment(claims)?);

        let signature = self.sign(token.as_bytes())?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        Ok(token)
    }

    fn sign(&self, message: &[u8]) -> AuthResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("HMAC key rejected: {}", e)))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::Internal(format!("Failed to encode token segment: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

/// `now + ttl`, or `Internal` when the result falls outside the representable
/// date range
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: std::time::Duration) -> AuthResult<DateTime<Utc>> {
    Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AuthError::Internal(format!("lifetime {:?} overflows the expiry timestamp", ttl)))
}

/// Short, non-reversible label for a token, safe to put in logs
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long!!";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(TokenCodec::new(""), Err(AuthError::SecretNotConfigured)));
    }

    #[test]
    fn test_issue_then_verify() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue_at("alice@example.com", StdDuration::from_secs(75 * 60), now).unwrap();

        let claims = codec.verify_at(&token, now).unwrap();
        assert_eq!(claims.subject, "alice@example.com");
        assert_eq!(claims.exp, 1_700_000_000 + 75 * 60);
        assert_eq!(claims.iat, 1_700_000_000);
    }

    #[test]
    fn test_token_shape() {
        let token = codec().issue("alice@example.com", StdDuration::from_secs(60)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(!token.contains('='));

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header, serde_json::json!({"alg": "HS256", "typ": "JWT"}));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let codec = codec();
        let token = codec.issue_at("s", StdDuration::from_secs(10), at(1_000)).unwrap();

        assert!(codec.verify_at(&token, at(1_009)).is_ok());
        assert!(matches!(codec.verify_at(&token, at(1_010)), Err(AuthError::Expired)));
    }

    #[test]
    fn test_short_lived_token_expires() {
        let codec = codec();
        let token = codec.issue_at("s", StdDuration::from_secs(1), at(5_000)).unwrap();
        assert!(matches!(codec.verify_at(&token, at(5_002)), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = codec().issue("alice@example.com", StdDuration::from_secs(60)).unwrap();
        let other = TokenCodec::new("another-secret-key-that-is-32-bytes!!").unwrap();
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_swapped_payload_is_invalid_signature() {
        let codec = codec();
        let alice = codec.issue("alice@example.com", StdDuration::from_secs(60)).unwrap();
        let mallory = codec.issue("mallory@example.com", StdDuration::from_secs(60)).unwrap();

        let a: Vec<&str> = alice.split('.').collect();
        let m: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], m[1], a[2]);

        assert!(matches!(codec.verify(&forged), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_bytes_never_yield_another_subject() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue_at("alice@example.com", StdDuration::from_secs(60), now).unwrap();
        let payload_start = token.find('.').unwrap() + 1;

        for i in payload_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            if bytes[i] == b'.' {
                continue;
            }
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            match codec.verify_at(&tampered, now) {
                Err(AuthError::InvalidSignature) | Err(AuthError::MalformedToken) => {}
                other => panic!("byte {} tampered but verify returned {:?}", i, other),
            }
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        for token in ["", "abc", "a.b", "a.b.c.d", "a..c", ".b.c", "a.b."] {
            assert!(
                matches!(codec.verify(token), Err(AuthError::MalformedToken)),
                "expected malformed for {:?}",
                token
            );
        }
    }

    #[test]
    fn test_signature_checked_before_payload() {
        let codec = codec();
        // Payload is not JSON, but the signature is wrong, so the signature error wins
        let token = format!("{}.{}.{}", "e30", "bm90LWpzb24", URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert!(matches!(codec.verify(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_legacy_email_payload_verifies() {
        let codec = codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"email":"legacy@example.com","exp":2000}"#);
        let input = format!("{}.{}", header, payload);
        let sig = URL_SAFE_NO_PAD.encode(codec.sign(input.as_bytes()).unwrap());
        let token = format!("{}.{}", input, sig);

        let claims = codec.verify_at(&token, at(1_000)).unwrap();
        assert_eq!(claims.subject, "legacy@example.com");
    }

    #[test]
    fn test_issue_rejects_empty_subject_and_zero_ttl() {
        let codec = codec();
        assert!(codec.issue("", StdDuration::from_secs(60)).is_err());
        assert!(codec.issue("s", StdDuration::ZERO).is_err());
    }

    #[test]
    fn test_issue_with_oversized_ttl_is_an_error() {
        let err = codec()
            .issue("alice@example.com", StdDuration::from_secs(10u64.pow(15)))
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));

        let err = codec()
            .issue("alice@example.com", StdDuration::from_secs(u64::MAX))
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 12);
    }
}
