//! # secure-storage-cli
//!
//! Host adapters for secure-storage: a line-delimited JSON request loop
//! over any reader/writer pair, used by the `secure-storage` binary.

mod stdio;

pub use stdio::{serve, StdioHost};
