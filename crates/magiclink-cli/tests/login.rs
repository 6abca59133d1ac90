//! Integration tests for the login commands against a mocked Supabase project.


use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use fixtures::{ANON_KEY, can_bind_localhost, magiclink, session_path, temp_home, token_body};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_password_login_stores_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", ANON_KEY))
        .and(body_partial_json(json!({ "email": "a@b.com", "password": "x" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "user-1",
            Some("a@b.com"),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    magiclink(home.path(), &server.uri())
        .args(["login", "email", "--email", "a@b.com", "--password", "x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Login Successful"))
        .stdout(predicate::str::contains("Signed in as a@b.com"));

    assert!(session_path(home.path()).exists());
}

#[tokio::test]
async fn test_password_login_failure_shows_provider_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials",
        })))
        .mount(&server)
        .await;

    magiclink(home.path(), &server.uri())
        .args(["login", "email", "--email", "a@b.com", "--password", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid login credentials"));

    assert!(!session_path(home.path()).exists());
}

#[test]
fn test_login_when_already_signed_in() {
    let home = temp_home();
    fixtures::write_session(home.path(), "user-1", "a@b.com");

    // Nothing listens here; a valid stored session needs no request.
    magiclink(home.path(), "http://127.0.0.1:9")
        .args(["login", "email", "--email", "c@d.com", "--password", "x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already signed in as a@b.com"));
}

#[tokio::test]
async fn test_phone_login_verifies_code_from_stdin() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .and(body_partial_json(json!({ "phone": "+15551234567" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .and(body_partial_json(json!({
            "type": "sms",
            "phone": "+15551234567",
            "token": "123456",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "user-2",
            None,
            Some("15551234567"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    magiclink(home.path(), &server.uri())
        .args(["login", "phone", "--phone", "+15551234567"])
        .write_stdin("123456\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Code sent"))
        .stdout(predicate::str::contains("Signed in as 15551234567"));

    assert!(session_path(home.path()).exists());
}

#[tokio::test]
async fn test_phone_login_rejected_code_can_be_retried() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/verify"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({
                "code": 403,
                "error_code": "otp_expired",
                "msg": "Token has expired or is invalid",
            })),
        )
        .expect(2)
        .mount(&server)
        .await;

    magiclink(home.path(), &server.uri())
        .args(["login", "phone", "--phone", "+15551234567"])
        .write_stdin("000000\n111111\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Token has expired or is invalid"))
        .stderr(predicate::str::contains("No verification code entered"));

    assert!(!session_path(home.path()).exists());
}

#[tokio::test]
async fn test_signup_pending_confirmation() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "new@b.com",
            "data": { "name": "Ada Lovelace", "dob": "1990-12-10" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-3",
            "email": "new@b.com",
            "confirmation_sent_at": "2026-01-01T00:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    magiclink(home.path(), &server.uri())
        .args([
            "signup",
            "--email",
            "new@b.com",
            "--password",
            "secret",
            "--name",
            "Ada Lovelace",
            "--dob",
            "1990-12-10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Registration successful! Please check your email to confirm your account.",
        ));

    assert!(!session_path(home.path()).exists());
}

/// Plays the browser: retries until the CLI listens, then follows the redirect.
fn redirect_back(port: u16, code: &str) -> thread::JoinHandle<String> {
    let request = format!("GET /auth/callback?code={code} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    thread::spawn(move || {
        for _ in 0..200 {
            if let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)) {
                stream.write_all(request.as_bytes()).unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).unwrap();
                return response;
            }
            thread::sleep(Duration::from_millis(50));
        }
        panic!("nothing listened on port {port}");
    })
}

#[tokio::test]
async fn test_oauth_login_completes_through_redirect() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    fs::write(
        home.path().join("config.toml"),
        format!("[auth]\nredirect_port = {port}\noauth_timeout_secs = 20\n"),
    )
    .unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "pkce"))
        .and(header("apikey", ANON_KEY))
        .and(body_partial_json(json!({ "auth_code": "code-42" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "user-4",
            Some("gh@b.com"),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let browser = redirect_back(port, "code-42");

    magiclink(home.path(), &server.uri())
        .args(["login", "oauth", "--provider", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Continue with GitHub"))
        .stdout(predicate::str::contains("Logged in with GitHub."))
        .stdout(predicate::str::contains("Signed in as gh@b.com"));

    assert!(browser.join().unwrap().starts_with("HTTP/1.1 200"));
    let stored = fs::read_to_string(session_path(home.path())).unwrap();
    assert!(stored.contains("user-4"));
}
