use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_POLL_MAX_INTERVAL: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;
pub(crate) const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Tokens are treated as expired this long before their real expiry.
pub(crate) const TOKEN_EXPIRY_DRIFT: Duration = Duration::from_secs(60);

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("vcert-rs/", env!("CARGO_PKG_VERSION"));
