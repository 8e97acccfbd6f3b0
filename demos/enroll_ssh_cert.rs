use std::env;
use vcert_rs::{
    generate_ssh_keypair, Connection, Credentials, SshCertRequest, TppConnection, SCOPE_SSH,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = env::var("TPP_TOKEN_URL").unwrap_or_else(|_| "https://tpp.example.com".to_string());
    let cadn = env::var("SSH_CADN").unwrap_or_else(|_| "CA1".to_string());
    let (user, password) = match (env::var("TPP_USER"), env::var("TPP_PASSWORD")) {
        (Ok(user), Ok(password)) => (user, password),
        _ => {
            eprintln!("TPP_USER and TPP_PASSWORD are not set. Skipping.");
            eprintln!("Example: TPP_USER=admin TPP_PASSWORD=secret SSH_CADN=CA1");
            return Ok(());
        }
    };

    let mut builder = TppConnection::builder(&url)?;
    if let Ok(path) = env::var("TPP_CA_BUNDLE") {
        builder = builder.ca_bundle_path(path)?;
    }
    let conn = builder.build()?;
    conn.authenticate(&Credentials::user_password(user, password), SCOPE_SSH)?;

    let keypair = generate_ssh_keypair(4096, None)?;
    let mut request = SshCertRequest::builder(cadn, "vcert-rs-demo")
        .validity_period("4h")
        .source_addresses(["test.com"])
        .public_key_data(keypair.public_key.clone())
        .build();

    if !conn.request_ssh_cert(&mut request)? {
        eprintln!("request was declined by the platform");
        return Ok(());
    }
    let response = conn.retrieve_ssh_cert(&request)?;

    println!("{}", response.cert_data);
    Ok(())
}
