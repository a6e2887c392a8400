use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiTokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decode the expiry claim from a backend-issued JWT without validation.
///
/// The token comes straight from the backend's own authenticate endpoint over
/// a trusted channel; we only need `exp` to know when to re-issue, so no
/// signature check is performed here.
pub fn decode_token_expiry(token: &str) -> Result<i64> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: ApiTokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn make_token(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS512"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn decodes_expiry_from_payload() {
        let token = make_token(r#"{"sub":"gateway","exp":9999999999}"#);
        assert_eq!(decode_token_expiry(&token).unwrap(), 9999999999);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(decode_token_expiry("not-a-jwt").is_err());
        assert!(decode_token_expiry("a.b").is_err());
    }

    #[test]
    fn rejects_non_json_payload() {
        let token = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS512"}"#),
            URL_SAFE_NO_PAD.encode("plain text")
        );
        assert!(decode_token_expiry(&token).is_err());
    }
}
