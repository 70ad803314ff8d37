//! # netftp — FTP Client
//!
//! Implementation of the FTP protocol (RFC 959) client side with
//! extensions:
//! - **RFC 2389** — FEAT negotiation
//! - **RFC 3659** — MLSD machine-readable listings
//!
//! Architecture:
//! - `types` — all data structures, enums, config
//! - `error` — FTP-specific error type
//! - `protocol` — low-level command/response codec
//! - `connection` — TCP transport
//! - `client` — stateful FTP client (login, CWD, TYPE, listing, etc.)
//! - `parser` — Unix/Windows/MLSD LIST response parsing
//! - `data` — data channel management (PASV/PORT)
//! - `directory` — mkdir, rmdir, rename, delete
//! - `file_ops` — upload, download, append

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod client;
pub mod parser;
pub mod data;
pub mod directory;
pub mod file_ops;

// Re-exports for lib.rs consumers
pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use client::FtpClient;
pub use data::DataConnection;
pub use parser::ListingKind;
