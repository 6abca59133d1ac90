//! Supabase auth API wire types.

use serde::Deserialize;

use crate::providers::types::{Session, User, now_secs};

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<UserResponse> for User {
    fn from(user: UserResponse) -> Self {
        // Supabase reports missing contact fields as empty strings.
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        User {
            id: user.id,
            email: non_empty(user.email),
            phone: non_empty(user.phone),
        }
    }
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| now_secs().saturating_add(token.expires_in));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        }
    }
}

/// Error body variants returned by GoTrue.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Picks the human-readable message out of an error response body.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('{') {
                format!("Auth request failed (HTTP {status})")
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(error_message(400, body), "Invalid login credentials");
    }

    #[test]
    fn test_error_message_reads_msg_and_message() {
        assert_eq!(
            error_message(422, r#"{"code":422,"msg":"Token has expired or is invalid"}"#),
            "Token has expired or is invalid"
        );
        assert_eq!(
            error_message(429, r#"{"message":"Too many requests"}"#),
            "Too many requests"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(500, ""), "Auth request failed (HTTP 500)");
        assert_eq!(error_message(502, "{}"), "Auth request failed (HTTP 502)");
        assert_eq!(error_message(503, "upstream down"), "upstream down");
    }

    #[test]
    fn test_token_response_normalizes_user() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"expires_at":1900000000,
                "user":{"id":"u1","email":"","phone":"15551234567"}}"#,
        )
        .unwrap();
        let session = Session::from(token);
        assert_eq!(session.expires_at, 1_900_000_000);
        assert_eq!(session.user.email, None);
        assert_eq!(session.user.phone.as_deref(), Some("15551234567"));
    }
}
