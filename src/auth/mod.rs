mod credentials;
mod scope;
mod store;
mod token;

pub use credentials::Credentials;
pub use scope::{Scope, SCOPE_SSH};
pub(crate) use store::TokenStore;
pub use token::AccessToken;
pub(crate) use token::{unix_to_system_time, TokenKind};
