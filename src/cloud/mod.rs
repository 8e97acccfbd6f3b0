mod client;

pub use client::{CloudConnection, CloudConnectionBuilder};
