mod common;

use common::{empty_response, json_response, serve, CLIENT_PUB};
use std::time::Duration;
use vcert_rs::{
    connect, Backend, Credentials, Error, PollPolicy, SshCertRequest, SshConfigRequest,
    TransportOptions, SCOPE_SSH,
};

#[test]
fn enrolls_with_api_key() {
    let issued = serde_json::json!({
        "status": "ISSUED",
        "issuingTemplate": "CA1",
        "certificate": "ssh-ed25519-cert-v01@openssh.com AAAA",
        "publicKey": CLIENT_PUB,
    });
    let server = serve(vec![
        json_response("200 OK", r#"{"user":{"username":"jane@example.com"}}"#),
        json_response("201 Created", r#"{"id":"req-9","status":"REQUESTED"}"#),
        json_response("202 Accepted", r#"{"status":"PENDING"}"#),
        json_response("200 OK", &issued.to_string()),
        empty_response("204 No Content"),
    ]);
    let conn = connect(
        Backend::Cloud,
        &server.base_url,
        TransportOptions::default(),
        PollPolicy::fixed(Duration::from_millis(10), 4),
    )
    .expect("connect");
    let token = conn
        .authenticate(&Credentials::api_key("key-1"), SCOPE_SSH)
        .expect("authenticate");
    assert_eq!(token.identity(), Some("jane@example.com"));

    let mut request = SshCertRequest::builder("CA1", "k1")
        .validity_period("4h")
        .source_addresses(["test.com"])
        .public_key_data(CLIENT_PUB)
        .build();
    assert!(conn.request_ssh_cert(&mut request).expect("request"));
    let response = conn.retrieve_ssh_cert(&request).expect("retrieve");
    assert_eq!(response.public_key_data, CLIENT_PUB);
    assert!(response.private_key_data.is_none());
    conn.retire_ssh_cert(&request).expect("retire");

    let requests = server.finish();
    assert_eq!(requests.len(), 5);
    for req in &requests {
        assert_eq!(req.header_value("tppl-api-key"), Some("key-1"));
    }
    assert_eq!(requests[2].path, "/v1/sshcertificaterequests/req-9/retrieval");
    assert_eq!(requests[4].method, "DELETE");
    assert_eq!(requests[4].path, "/v1/sshcertificaterequests/req-9");
}

#[test]
fn unknown_template_is_not_found() {
    let server = serve(vec![empty_response("404 Not Found")]);
    let conn = connect(
        Backend::Cloud,
        &server.base_url,
        TransportOptions::default(),
        PollPolicy::default(),
    )
    .expect("connect");
    let err = conn
        .retrieve_ssh_config(&SshConfigRequest::new("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(name) if name == "missing"));
    server.finish();
}
