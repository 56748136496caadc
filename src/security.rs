use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::constants::STREAM_TOKEN_TTL_MS;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time in Unix epoch milliseconds
///
/// Injected into the token codec so expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// =============================================================================
// Stream Capability Tokens
// =============================================================================

/// Signs and verifies short-lived stream tokens
///
/// A token binds exactly one resource id to an expiry instant:
///
/// `base64url(id "|" expiry_ms) "." base64url(HMAC-SHA256(secret, id "|" expiry_ms))`
///
/// Validity depends only on the token bytes, the secret and the clock. There is
/// no server-side revocation list, so the signer holds no mutable state and can
/// be shared freely between concurrent requests.
///
/// Resource ids containing `|` can be signed but never verify; every id this
/// service mints tokens for is a UUID.
#[derive(Clone)]
pub struct StreamTokenSigner {
    keyed: HmacSha256,
    clock: Arc<dyn Clock>,
}

impl StreamTokenSigner {
    /// Create a signer using the wall clock
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, String> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Create a signer with an explicit clock
    pub fn with_clock(secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Result<Self, String> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err("Stream token secret must not be empty".to_string());
        }

        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| format!("Invalid stream token secret: {}", e))?;

        Ok(Self { keyed, clock })
    }

    /// Mint a token for `resource_id` that expires one TTL from now
    pub fn sign(&self, resource_id: &str) -> String {
        let expiry = self.clock.now_millis() + STREAM_TOKEN_TTL_MS;
        let payload = format!("{}|{}", resource_id, expiry);
        let signature = self.mac(payload.as_bytes()).finalize().into_bytes();

        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Verify a token and return the resource id it was minted for
    ///
    /// Returns `None` for every kind of failure. Callers must still compare the
    /// returned id against the resource actually requested.
    pub fn verify(&self, token: &str) -> Option<String> {
        // 1. Exactly two non-empty segments separated by a single '.'
        let mut segments = token.split('.');
        let (payload_b64, sig_b64) = match (segments.next(), segments.next(), segments.next()) {
            (Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (p, s),
            _ => return None,
        };

        let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

        // 2. Constant-time signature check over the decoded payload.
        // A signature of the wrong length is simply unequal.
        if self.mac(&payload_bytes).verify_slice(&signature).is_err() {
            return None;
        }

        // 3. Payload must be "<id>|<expiry>" with exactly one separator
        let payload = String::from_utf8(payload_bytes).ok()?;
        let mut fields = payload.split('|');
        let (resource_id, expiry) = match (fields.next(), fields.next(), fields.next()) {
            (Some(id), Some(exp), None) if !id.is_empty() => (id, exp),
            _ => return None,
        };

        // 4. Expiry must parse and must not be in the past
        let expiry: i64 = expiry.parse().ok()?;
        if expiry < self.clock.now_millis() {
            return None;
        }

        Some(resource_id.to_string())
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(data);
        mac
    }
}

impl std::fmt::Debug for StreamTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTokenSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    const SECRET: &str = "test-stream-secret";
    const START: i64 = 1_700_000_000_000;

    /// Clock that only moves when told to
    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn new(at: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(at)))
        }

        fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn signer_at(at: i64) -> (StreamTokenSigner, Arc<ManualClock>) {
        let clock = ManualClock::new(at);
        (
            StreamTokenSigner::with_clock(SECRET, clock.clone()).unwrap(),
            clock,
        )
    }

    /// Build a token with an arbitrary payload, signed with the test secret
    fn forge(payload: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        )
    }

    // =========================================================================
    // Round trip
    // =========================================================================

    #[test]
    fn test_verify_returns_signed_resource_id() {
        let (signer, _) = signer_at(START);

        for id in ["a", "8f14e45f-ceea-467f-a9f0-3b2c1d0e9a77", "video 42", "ünïcödé"] {
            let token = signer.sign(id);
            assert_eq!(signer.verify(&token).as_deref(), Some(id));
        }
    }

    #[test]
    fn test_token_wire_format() {
        let (signer, _) = signer_at(START);
        let token = signer.sign("abc");

        let (payload, sig) = token.split_once('.').unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(payload).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            format!("abc|{}", START + STREAM_TOKEN_TTL_MS)
        );
        // 32-byte HMAC without padding
        assert_eq!(URL_SAFE_NO_PAD.decode(sig).unwrap().len(), 32);
        assert!(!token.contains('=') && !token.contains('+') && !token.contains('/'));
    }

    #[test]
    fn test_matches_independent_hmac() {
        let (signer, _) = signer_at(START);
        let token = signer.sign("abc");
        let expected = forge(&format!("abc|{}", START + STREAM_TOKEN_TTL_MS), SECRET);
        assert_eq!(token, expected);
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    #[test]
    fn test_token_accepted_until_expiry_instant() {
        let (signer, clock) = signer_at(START);
        let token = signer.sign("vid");

        clock.advance(STREAM_TOKEN_TTL_MS);
        assert_eq!(signer.verify(&token).as_deref(), Some("vid"));
    }

    #[test]
    fn test_token_rejected_after_expiry() {
        let (signer, clock) = signer_at(START);
        let token = signer.sign("vid");

        clock.advance(STREAM_TOKEN_TTL_MS + 1);
        assert_eq!(signer.verify(&token), None);
    }

    #[test]
    fn test_non_numeric_expiry_rejected() {
        let (signer, _) = signer_at(START);
        assert_eq!(signer.verify(&forge("vid|soon", SECRET)), None);
        assert_eq!(signer.verify(&forge("vid|", SECRET)), None);
    }

    // =========================================================================
    // Tampering
    // =========================================================================

    #[test]
    fn test_any_single_bit_flip_rejected() {
        let (signer, _) = signer_at(START);
        let token = signer.sign("8f14e45f-ceea-467f-a9f0-3b2c1d0e9a77");
        let (payload_b64, sig_b64) = token.split_once('.').unwrap();

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).unwrap();

        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut tampered = payload.clone();
                tampered[byte] ^= 1 << bit;
                let token = format!("{}.{}", URL_SAFE_NO_PAD.encode(&tampered), sig_b64);
                assert_eq!(signer.verify(&token), None, "payload byte {byte} bit {bit}");
            }
        }

        for byte in 0..sig.len() {
            for bit in 0..8 {
                let mut tampered = sig.clone();
                tampered[byte] ^= 1 << bit;
                let token = format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(&tampered));
                assert_eq!(signer.verify(&token), None, "signature byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (signer, _) = signer_at(START);
        let other = StreamTokenSigner::with_clock("other-secret", ManualClock::new(START)).unwrap();
        assert_eq!(signer.verify(&other.sign("vid")), None);
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let (signer, _) = signer_at(START);
        let token = signer.sign("vid");
        let (payload_b64, sig_b64) = token.split_once('.').unwrap();
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).unwrap();

        let short = format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(&sig[..16]));
        assert_eq!(signer.verify(&short), None);
    }

    #[test]
    fn test_empty_secret_refused() {
        assert!(StreamTokenSigner::new("").is_err());
        assert!(StreamTokenSigner::new("s").is_ok());
    }

    // =========================================================================
    // Malformed input
    // =========================================================================

    #[test]
    fn test_malformed_tokens_rejected() {
        let (signer, _) = signer_at(START);
        let valid = signer.sign("vid");
        let (payload_b64, _) = valid.split_once('.').unwrap();

        assert_eq!(signer.verify(""), None);
        assert_eq!(signer.verify("."), None);
        assert_eq!(signer.verify(payload_b64), None);
        assert_eq!(signer.verify(&format!("{payload_b64}.")), None);
        assert_eq!(signer.verify(&format!(".{payload_b64}")), None);
        assert_eq!(signer.verify(&format!("{valid}.extra")), None);
        assert_eq!(signer.verify("not base64!.also not"), None);
    }

    #[test]
    fn test_payload_needs_exactly_one_separator() {
        let (signer, _) = signer_at(START);
        let expiry = START + 1000;

        assert_eq!(signer.verify(&forge(&format!("a|b|{expiry}"), SECRET)), None);
        assert_eq!(signer.verify(&forge(&format!("{expiry}"), SECRET)), None);
        assert_eq!(signer.verify(&forge(&format!("|{expiry}"), SECRET)), None);
        assert_eq!(
            signer.verify(&forge(&format!("ok|{expiry}"), SECRET)).as_deref(),
            Some("ok")
        );
    }
}
