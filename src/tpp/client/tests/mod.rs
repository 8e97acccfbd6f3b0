
use super::TppConnection;
use crate::auth::{Credentials, SCOPE_SSH};
use crate::connection::Connection;
use crate::poller::PollPolicy;
use std::time::Duration;

pub(super) const CLIENT_PUB: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ test@host";
pub(super) const OTHER_PUB: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBERERERERERERERERERERERERERERERERERERERERER other";
/// Nothing listens here; used where a test must not reach the network.
pub(super) const UNREACHABLE: &str = "http://127.0.0.1:9";

pub(super) fn connection(base_url: &str) -> TppConnection {
    TppConnection::builder(base_url)
        .expect("builder")
        .poll_policy(PollPolicy::fixed(Duration::from_millis(10), 3))
        .build()
        .expect("build")
}

pub(super) fn authenticated(base_url: &str) -> TppConnection {
    let conn = connection(base_url);
    conn.authenticate(&Credentials::access_token("tok", SCOPE_SSH), SCOPE_SSH)
        .expect("authenticate");
    conn
}

#[test]
fn base_url_drops_api_root_segment() {
    let conn = connection("https://tpp.example.com/vedsdk/");
    assert_eq!(
        conn.build_url(&["vedauth", "authorize", "oauth"])
            .expect("url")
            .as_str(),
        "https://tpp.example.com/vedauth/authorize/oauth"
    );
    let conn = connection("https://tpp.example.com/prefix/vedauth");
    assert_eq!(
        conn.build_url(&["vedsdk"]).expect("url").as_str(),
        "https://tpp.example.com/prefix/vedsdk"
    );
}

#[test]
fn builder_rejects_non_http_base_url() {
    assert!(TppConnection::builder("ftp://tpp.example.com").is_err());
}
