mod client;

pub use client::{TppConnection, TppConnectionBuilder};
