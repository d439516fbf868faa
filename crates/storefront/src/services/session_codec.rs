//! Signed session tokens.
//!
//! A token is `<payload>.<signature>`, where `payload` is the base64url
//! (unpadded) JSON encoding of a [`Session`] and `signature` is the base64url
//! HMAC-SHA256 of the payload text under the server secret.
//!
//! Decoding never fails loudly: a malformed, tampered or expired token is
//! simply "no session".

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::clock::Clock;
use crate::models::Session;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// Errors that can occur while minting a token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("session could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid signing key")]
    InvalidKey,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionCodec {
    secret: SecretString,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    #[must_use]
    pub fn new(secret: SecretString, ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            ttl_secs,
            clock,
        }
    }

    /// Session lifetime in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn mac(&self) -> Result<HmacSha256, CodecError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| CodecError::InvalidKey)
    }

    /// Serialize and sign a session.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the session cannot be serialized.
    pub fn encode(&self, session: &Session) -> Result<String, CodecError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session)?);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}{SEPARATOR}{signature}"))
    }

    /// Verify a token against the current time.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<Session> {
        self.decode_at(token, self.clock.unix_seconds())
    }

    /// Verify a token as of `now` (seconds since epoch).
    ///
    /// Returns `None` if the token is malformed, the signature does not
    /// match, the payload is not a session, or `now - issued_at` exceeds the
    /// TTL.
    #[must_use]
    pub fn decode_at(&self, token: &str, now: i64) -> Option<Session> {
        let (payload, signature) = token.trim().split_once(SEPARATOR)?;
        if signature.contains(SEPARATOR) {
            return None;
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&signature).ok()?;

        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let session: Session = serde_json::from_slice(&bytes).ok()?;

        let age = now.checked_sub(session.issued_at)?;
        (age <= self.ttl_secs).then_some(session)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use bubbling_bath_core::{Email, Role, Workspace};

    use super::*;
    use crate::clock::SystemClock;
    use crate::config::DEFAULT_SESSION_TTL_SECS;

    const NOW: i64 = 1_760_000_000;

    fn codec() -> SessionCodec {
        SessionCodec::new(
            SecretString::from("k7#Qp2!vX9@mL4$wZ8^rT1&nB6*yH3%c"),
            DEFAULT_SESSION_TTL_SECS,
            Arc::new(SystemClock),
        )
    }

    fn session(issued_at: i64) -> Session {
        Session {
            email: Email::parse("ops@bubblingbath.test").unwrap(),
            name: "Ops".to_owned(),
            roles: BTreeSet::from([Role::Employee]),
            workspace: Workspace::Employee,
            issued_at,
        }
    }

    #[test]
    fn test_roundtrip_within_ttl() {
        let codec = codec();
        let original = session(NOW - 60);
        let token = codec.encode(&original).unwrap();
        assert_eq!(codec.decode_at(&token, NOW), Some(original));
    }

    #[test]
    fn test_ttl_boundary() {
        let codec = codec();
        let ttl = DEFAULT_SESSION_TTL_SECS;

        let expired = codec.encode(&session(NOW - ttl - 1)).unwrap();
        assert_eq!(codec.decode_at(&expired, NOW), None);

        let fresh = codec.encode(&session(NOW - ttl + 1)).unwrap();
        assert!(codec.decode_at(&fresh, NOW).is_some());

        let exact = codec.encode(&session(NOW - ttl)).unwrap();
        assert!(codec.decode_at(&exact, NOW).is_some());
    }

    #[test]
    fn test_any_flipped_bit_is_rejected() {
        let codec = codec();
        let token = codec.encode(&session(NOW)).unwrap();
        let bytes = token.as_bytes();

        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut tampered = bytes.to_vec();
                tampered[index] ^= 1 << bit;
                let Ok(tampered) = String::from_utf8(tampered) else {
                    continue;
                };
                assert_eq!(
                    codec.decode_at(&tampered, NOW),
                    None,
                    "bit {bit} of byte {index} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = codec().encode(&session(NOW)).unwrap();
        let other = SessionCodec::new(
            SecretString::from("Zp9!uQ4@eR7#tY2$iO5%pA8^sD1&fG3*"),
            DEFAULT_SESSION_TTL_SECS,
            Arc::new(SystemClock),
        );
        assert_eq!(other.decode_at(&token, NOW), None);
    }

    #[test]
    fn test_garbage_never_panics() {
        let codec = codec();
        for token in ["", ".", "..", "abc", "abc.", ".abc", "a.b.c", "%%%.%%%", "e30.e30"] {
            assert_eq!(codec.decode_at(token, NOW), None);
        }
    }

    #[test]
    fn test_signed_non_session_payload_is_rejected() {
        let codec = codec();
        let payload = URL_SAFE_NO_PAD.encode(br#"{"hello":"world"}"#);
        let mut mac = codec.mac().unwrap();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        assert_eq!(codec.decode_at(&format!("{payload}.{signature}"), NOW), None);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let codec = codec();
        let token = codec.encode(&session(i64::MAX)).unwrap();
        assert!(codec.decode_at(&token, i64::MIN).is_none());
    }
}
