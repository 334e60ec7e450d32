//! Bearer token issuance and verification (spec §4.9).
//!
//! A compact, HS256-equivalent signed token: base64url(header).base64url(claims).base64url(signature),
//! the signature being an HMAC-SHA256 over `header.claims`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
}

impl Role {
    /// Numeric rank for the admin ≥ operator ≥ viewer hierarchy.
    pub fn rank(self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Operator => 1,
            Role::Admin => 2,
        }
    }

    /// Case-insensitive parse. On an unknown name, returns `Viewer` alongside
    /// the error so a caller can choose to treat the input as viewer or
    /// surface the failure.
    pub fn validate(name: &str) -> (Role, Result<Role>) {
        match name.to_ascii_lowercase().as_str() {
            "viewer" => (Role::Viewer, Ok(Role::Viewer)),
            "operator" => (Role::Operator, Ok(Role::Operator)),
            "admin" => (Role::Admin, Ok(Role::Admin)),
            other => (
                Role::Viewer,
                Err(AppError::BadRequest(format!("unknown role '{other}'"))),
            ),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn issue(&self, user_id: &str, role: Role, now: i64, ttl_secs: i64) -> Result<String> {
        let claims = Claims {
            user_id: user_id.to_string(),
            role,
            iat: now,
            exp: now + ttl_secs,
        };
        let header = Header { alg: "HS256", typ: "JWT" };
        let header_b64 = encode_segment(&header)?;
        let claims_b64 = encode_segment(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = self.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify(&self, token: &str, now: i64) -> Result<Claims> {
        if token.is_empty() {
            return Err(AppError::InvalidToken("token cannot be empty".to_string()));
        }
        let parts: Vec<&str> = token.split('.').collect();
        let (header_b64, claims_b64, signature_b64) = match parts.as_slice() {
            [h, c, s] => (*h, *c, *s),
            _ => return Err(AppError::InvalidToken("malformed token".to_string())),
        };

        let signing_input = format!("{header_b64}.{claims_b64}");
        let expected = self.sign(signing_input.as_bytes());
        if !constant_time_eq(expected.as_bytes(), signature_b64.as_bytes()) {
            return Err(AppError::InvalidToken("signature mismatch".to_string()));
        }

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AppError::InvalidToken("malformed token".to_string()))?;
        let claims: Claims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| AppError::InvalidToken("malformed token".to_string()))?;

        if claims.user_id.is_empty() {
            return Err(AppError::InvalidToken("malformed token".to_string()));
        }
        if now >= claims.exp {
            return Err(AppError::InvalidToken("token expired".to_string()));
        }
        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(input);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(AppError::Serialization)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret".to_vec())
    }

    #[test]
    fn round_trips_a_valid_token() {
        let codec = codec();
        let token = codec.issue("alice", Role::Operator, 1_000, 3600).unwrap();
        let claims = codec.verify(&token, 1_500).unwrap();
        assert_eq!(claims.user_id, "alice");
        assert_eq!(claims.role, Role::Operator);
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = codec().verify("", 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(m) if m == "token cannot be empty"));
    }

    #[test]
    fn expired_is_inclusive_at_exact_boundary() {
        let codec = codec();
        let token = codec.issue("bob", Role::Viewer, 0, 100).unwrap();
        assert!(codec.verify(&token, 100).is_err());
        assert!(codec.verify(&token, 99).is_ok());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = codec();
        let mut token = codec.issue("carol", Role::Admin, 0, 100).unwrap();
        token.push('x');
        assert!(codec.verify(&token, 0).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(codec().verify("not-a-token", 0).is_err());
    }

    #[test]
    fn role_hierarchy_is_numeric_and_ordered() {
        assert!(Role::Admin.rank() > Role::Operator.rank());
        assert!(Role::Operator.rank() > Role::Viewer.rank());
    }

    #[test]
    fn validate_role_returns_viewer_and_error_on_unknown() {
        let (role, result) = Role::validate("bogus");
        assert_eq!(role, Role::Viewer);
        assert!(result.is_err());
    }

    #[test]
    fn validate_role_is_case_insensitive() {
        let (role, result) = Role::validate("ADMIN");
        assert_eq!(role, Role::Admin);
        assert!(result.is_ok());
    }
}
