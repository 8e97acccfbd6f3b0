
use super::CloudConnection;
use crate::auth::{Credentials, SCOPE_SSH};
use crate::connection::Connection;
use crate::error::Error;
use crate::models::SshCertRequest;
use crate::poller::PollPolicy;
use crate::test_support::{json_response, serve_once};
use std::time::Duration;

pub(super) const CLIENT_PUB: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ test@host";
pub(super) const UNREACHABLE: &str = "http://127.0.0.1:9";

pub(super) fn connection(base_url: &str) -> CloudConnection {
    CloudConnection::builder(base_url)
        .expect("builder")
        .poll_policy(PollPolicy::fixed(Duration::from_millis(10), 3))
        .build()
        .expect("build")
}

pub(super) fn authenticated(base_url: &str) -> CloudConnection {
    let conn = connection(base_url);
    conn.authenticate(&Credentials::access_token("tok", SCOPE_SSH), SCOPE_SSH)
        .expect("authenticate");
    conn
}

#[test]
fn api_key_is_checked_against_user_account() {
    let (base_url, rx, handle) = serve_once(json_response(
        "200 OK",
        r#"{"user":{"username":"jane@example.com","id":"u-1"}}"#,
    ));
    let conn = connection(&base_url);
    let token = conn
        .authenticate(&Credentials::api_key("key-123"), SCOPE_SSH)
        .expect("authenticate");
    assert_eq!(token.identity(), Some("jane@example.com"));
    assert_eq!(token.scope().to_string(), "ssh:manage");

    let req = rx.recv().expect("request");
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/v1/useraccounts");
    assert_eq!(req.headers.get("tppl-api-key").map(String::as_str), Some("key-123"));
    handle.join().expect("server");
}

#[test]
fn rejected_api_key_is_authentication_error() {
    let (base_url, _rx, handle) = serve_once(json_response(
        "401 Unauthorized",
        r#"{"errors":[{"code":10501,"message":"Invalid api key"}]}"#,
    ));
    let conn = connection(&base_url);
    let err = conn
        .authenticate(&Credentials::api_key("bad"), SCOPE_SSH)
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(api) if api.code == Some(10501)));
    assert!(conn.access_token().is_none());
    handle.join().expect("server");

    let mut request = SshCertRequest::new("CA1", "k1");
    assert!(matches!(
        conn.request_ssh_cert(&mut request),
        Err(Error::NotAuthenticated(_))
    ));
}

#[test]
fn password_credentials_are_not_accepted() {
    let conn = connection(UNREACHABLE);
    let err = conn
        .authenticate(&Credentials::user_password("u", "p"), SCOPE_SSH)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn bearer_token_with_narrow_scope_is_denied() {
    let conn = connection(UNREACHABLE);
    let err = conn
        .authenticate(
            &Credentials::access_token("tok", "certificate:manage"),
            SCOPE_SSH,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ScopeDenied { .. }));
}
