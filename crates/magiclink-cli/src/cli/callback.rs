//! Local listener for the OAuth redirect.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use magiclink_core::config::OAUTH_CALLBACK_PATH;
use magiclink_core::providers::oauth::{
    CallbackOutcome, callback_error_response, callback_success_response, parse_callback_request,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::debug;

const NOT_FOUND_RESPONSE: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Binds the redirect port before the browser is sent anywhere.
pub async fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("listen on 127.0.0.1:{port} for the OAuth redirect"))
}

/// Waits for the provider to redirect back with an authorization code.
pub async fn wait_for_code(listener: TcpListener, timeout: Duration) -> Result<String> {
    tokio::time::timeout(timeout, accept_code(&listener))
        .await
        .map_err(|_| {
            anyhow!(
                "Timed out after {}s waiting for the OAuth redirect",
                timeout.as_secs()
            )
        })?
}

async fn accept_code(listener: &TcpListener) -> Result<String> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .context("accept OAuth callback")?;
        let mut buffer = [0u8; 4096];
        let read = stream.read(&mut buffer).await.unwrap_or(0);
        let request = String::from_utf8_lossy(&buffer[..read]);

        match parse_callback_request(&request, OAUTH_CALLBACK_PATH) {
            Some(CallbackOutcome::Code(code)) => {
                let _ = stream
                    .write_all(callback_success_response().as_bytes())
                    .await;
                return Ok(code);
            }
            Some(CallbackOutcome::Error(message)) => {
                let _ = stream
                    .write_all(callback_error_response(&message).as_bytes())
                    .await;
                bail!("OAuth sign-in failed: {message}");
            }
            None => {
                debug!(%peer, "ignoring unrelated request");
                let _ = stream.write_all(NOT_FOUND_RESPONSE).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpStream;

    use super::*;

    async fn send(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_returns_code_after_ignoring_other_paths() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiting = tokio::spawn(wait_for_code(listener, Duration::from_secs(5)));

        let favicon = send(addr, "GET /favicon.ico HTTP/1.1\r\n\r\n").await;
        assert!(favicon.starts_with("HTTP/1.1 404"));
        let callback = send(addr, "GET /auth/callback?code=abc123 HTTP/1.1\r\n\r\n").await;
        assert!(callback.starts_with("HTTP/1.1 200"));

        assert_eq!(waiting.await.unwrap().unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_provider_error_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiting = tokio::spawn(wait_for_code(listener, Duration::from_secs(5)));

        send(
            addr,
            "GET /auth/callback?error=access_denied&error_description=User%20cancelled HTTP/1.1\r\n\r\n",
        )
        .await;
        let err = waiting.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "OAuth sign-in failed: User cancelled");
    }

    #[tokio::test]
    async fn test_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = wait_for_code(listener, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }
}
