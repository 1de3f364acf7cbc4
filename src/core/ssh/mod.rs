mod client;

pub use client::{is_connection_error, SshClient};
