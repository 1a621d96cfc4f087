//! API key check

use super::{GatewayError, API_KEY_HEADER};
use axum::http::HeaderMap;

/// Compare two byte strings in time that depends only on their lengths,
/// never on the position of the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Check the request's `X-API-Key` header against the configured key
pub fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), GatewayError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes())
        .ok_or(GatewayError::Forbidden)?;

    if constant_time_eq(presented, expected.as_bytes()) {
        Ok(())
    } else {
        Err(GatewayError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_eq_agrees_with_eq() {
        let cases: [(&[u8], &[u8]); 6] = [
            (b"secret", b"secret"),
            (b"secret", b"secreT"),
            (b"secret", b"Secret"),
            (b"secret", b"secret!"),
            (b"", b""),
            (b"", b"x"),
        ];
        for (a, b) in cases {
            assert_eq!(constant_time_eq(a, b), a == b, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_authorize() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            authorize(&headers, "k1"),
            Err(GatewayError::Forbidden)
        ));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(authorize(&headers, "k1").is_err());

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("k1"));
        assert!(authorize(&headers, "k1").is_ok());
    }
}
