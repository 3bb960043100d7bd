//! Access token inspection
//!
//! Tokens are only decoded, never verified: the signature belongs to the
//! resource server. A token that cannot be decoded is simply not valid.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::Deserialize;

/// Claims read from a token payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry as unix epoch seconds
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Whether the token is present, well formed and not yet expired
pub fn is_token_valid(token: Option<&str>) -> bool {
    is_token_valid_at(token, Utc::now().timestamp())
}

/// Same as [`is_token_valid`] against an explicit clock, in unix seconds
pub fn is_token_valid_at(token: Option<&str>, now: i64) -> bool {
    match token.and_then(decode_claims).and_then(|claims| claims.exp) {
        Some(exp) => exp > now,
        None => false,
    }
}

/// Decode the claims of a `header.payload.signature` token
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    if token.is_empty() {
        return None;
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = decode_segment(parts[1])?;
    serde_json::from_slice(&payload).ok()
}

/// Decode one base64url segment, restoring the padding the encoder dropped
///
/// A segment whose length leaves a remainder of 1 can never be valid base64
/// and is rejected.
pub fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let mut output = segment.replace('-', "+").replace('_', "/");
    match output.len() % 4 {
        2 => output.push_str("=="),
        3 => output.push('='),
        _ => {}
    }
    STANDARD.decode(output).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const NOW: i64 = 1_700_000_000;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_absent_and_empty_tokens() {
        assert!(!is_token_valid(None));
        assert!(!is_token_valid(Some("")));
    }

    #[test]
    fn test_wrong_segment_count() {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, NOW + 60));
        assert!(!is_token_valid_at(Some(&payload), NOW));
        assert!(!is_token_valid_at(Some(&format!("a.{}", payload)), NOW));
        assert!(!is_token_valid_at(Some(&format!("a.{}.c.d", payload)), NOW));
    }

    #[test]
    fn test_undecodable_payload() {
        assert!(!is_token_valid_at(Some("a.!!!!.c"), NOW));
        assert!(!is_token_valid_at(Some(&token_with_payload("not json")), NOW));
    }

    #[test]
    fn test_missing_expiry() {
        let token = token_with_payload(r#"{"sub":"user-1"}"#);
        assert!(!is_token_valid_at(Some(&token), NOW));
    }

    #[test]
    fn test_expiry_boundary() {
        for delta in [1, 60, 3600] {
            let token = token_with_payload(&format!(r#"{{"exp":{}}}"#, NOW + delta));
            assert!(is_token_valid_at(Some(&token), NOW), "delta {}", delta);
        }
        for delta in [0, -1, -3600] {
            let token = token_with_payload(&format!(r#"{{"exp":{}}}"#, NOW + delta));
            assert!(!is_token_valid_at(Some(&token), NOW), "delta {}", delta);
        }
    }

    #[test]
    fn test_decode_claims() {
        let token = token_with_payload(r#"{"exp":42,"sub":"x"}"#);
        assert_eq!(decode_claims(&token), Some(TokenClaims { exp: Some(42) }));
    }

    #[test]
    fn test_segment_padding_repair() {
        let mut checked = [false; 4];
        for len in 0..32usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 250) as u8).collect();
            let encoded = URL_SAFE_NO_PAD.encode(&bytes);
            checked[encoded.len() % 4] = true;
            assert_eq!(decode_segment(&encoded), Some(bytes));
        }
        assert!(checked[0] && checked[2] && checked[3]);
    }

    #[test]
    fn test_segment_with_remainder_one_is_rejected() {
        assert_eq!(decode_segment("a"), None);
        assert_eq!(decode_segment("abcde"), None);
        assert!(!is_token_valid_at(Some("x.abcde.y"), NOW));
    }
}
