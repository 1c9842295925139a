//! Structural checks on the access JWT.
//!
//! No signature verification happens here; the server remains the only
//! authority. The checks only decide whether a renewal is worth doing
//! before the server would reject the token anyway.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// Tokens expiring within this window are renewed early (seconds).
pub const DEFAULT_EXPIRY_LEEWAY_SECS: i64 = 5 * 60;

/// Outcome of [`validate_access_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    /// Well formed and not close to expiry.
    Valid { expires_at: i64 },
    /// Well formed but expiring inside the leeway window.
    ExpiringSoon { expires_at: i64 },
    /// Malformed, undecodable, or already expired.
    Invalid(String),
}

impl TokenValidation {
    /// Returns true if the token can still be sent as-is.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    /// Returns true if a renewal should happen now.
    pub fn needs_renewal(&self) -> bool {
        !matches!(self, Self::Valid { .. })
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    typ: Option<String>,
    alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Check JWT shape and expiry against `now` (Unix seconds).
pub fn validate_access_token(token: &str, now: i64, leeway_secs: i64) -> TokenValidation {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return TokenValidation::Invalid("invalid JWT format".to_owned());
    };

    let header: Header = match decode_segment(header) {
        Ok(h) => h,
        Err(reason) => return TokenValidation::Invalid(reason),
    };
    if header.typ.is_none() || header.alg.is_none() {
        return TokenValidation::Invalid("invalid JWT header".to_owned());
    }

    let claims: Claims = match decode_segment(payload) {
        Ok(c) => c,
        Err(reason) => return TokenValidation::Invalid(reason),
    };
    let Some(expires_at) = claims.exp else {
        return TokenValidation::Invalid("no expiration in token".to_owned());
    };

    if now >= expires_at {
        TokenValidation::Invalid("token expired".to_owned())
    } else if now.saturating_add(leeway_secs) >= expires_at {
        TokenValidation::ExpiringSoon { expires_at }
    } else {
        TokenValidation::Valid { expires_at }
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| format!("token decode error: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("token decode error: {e}"))
}
