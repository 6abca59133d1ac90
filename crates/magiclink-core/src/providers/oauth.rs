//! OAuth helpers: PKCE generation, redirect parsing and token masking.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// PKCE code verifier and challenge
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generate PKCE code verifier and challenge
pub fn generate_pkce() -> Pkce {
    // Use two UUIDs (16 bytes each) to get 32 random bytes
    let uuid1 = uuid::Uuid::new_v4();
    let uuid2 = uuid::Uuid::new_v4();
    let mut verifier_bytes = [0u8; 32];
    verifier_bytes[..16].copy_from_slice(uuid1.as_bytes());
    verifier_bytes[16..].copy_from_slice(uuid2.as_bytes());
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    Pkce {
        challenge: challenge_for(&verifier),
        verifier,
    }
}

fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Result of the provider redirecting back to the local callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Error(String),
}

/// Extracts the authorization code from a raw HTTP request line.
///
/// Returns `None` for requests to other paths (favicon probes and the like).
pub fn parse_callback_request(request: &str, callback_path: &str) -> Option<CallbackOutcome> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let path = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    if url.path() != callback_path {
        return None;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    if let Some(code) = param("code").filter(|c| !c.is_empty()) {
        return Some(CallbackOutcome::Code(code));
    }
    let message = param("error_description")
        .or_else(|| param("error"))
        .unwrap_or_else(|| "OAuth callback did not include an authorization code".to_string());
    Some(CallbackOutcome::Error(message))
}

pub fn callback_success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Signed in</title></head><body><p>Sign-in complete. Return to your terminal to continue.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

pub fn callback_error_response(message: &str) -> String {
    let body = format!("Sign-in failed: {message}");
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Masks a token for display (shows first 12 chars).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 || !token.is_char_boundary(12) {
        return "***".to_string();
    }
    format!("{}...", &token[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let pkce = generate_pkce();
        assert_eq!(pkce.verifier.len(), 43);
        assert_eq!(pkce.challenge, challenge_for(&pkce.verifier));
        assert_ne!(generate_pkce().verifier, pkce.verifier);
    }

    #[test]
    fn test_parse_callback_with_code() {
        let request = "GET /auth/callback?code=abc123 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(
            parse_callback_request(request, "/auth/callback"),
            Some(CallbackOutcome::Code("abc123".to_string()))
        );
    }

    #[test]
    fn test_parse_callback_with_error() {
        let request =
            "GET /auth/callback?error=access_denied&error_description=User+denied HTTP/1.1\r\n\r\n";
        assert_eq!(
            parse_callback_request(request, "/auth/callback"),
            Some(CallbackOutcome::Error("User denied".to_string()))
        );
    }

    #[test]
    fn test_parse_callback_ignores_other_paths() {
        let request = "GET /favicon.ico HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback_request(request, "/auth/callback"), None);
        assert_eq!(parse_callback_request("", "/auth/callback"), None);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.body"), "eyJhbGciOiJI...");
        assert_eq!(mask_token("short"), "***");
    }
}
