//! Shared types for the FTP crate.

use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ─── Transfer mode / type ────────────────────────────────────────────

/// How the data connection for the *next* transfer is established
/// (RFC 959: PORT vs PASV).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferMode {
    /// Client listens, server connects in.
    Active,
    /// Client connects out to a server-advertised endpoint.
    Passive,
}

impl Default for TransferMode {
    fn default() -> Self {
        Self::Passive
    }
}

/// Server-side data representation (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    Binary,
}

impl Default for TransferType {
    fn default() -> Self {
        Self::Binary
    }
}

// ─── Port range ──────────────────────────────────────────────────────

/// Inclusive range of local ports used for data sockets. When absent
/// the operating system assigns an ephemeral port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Build a validated inclusive range.
    pub fn new(start: u16, end: u16) -> FtpResult<Self> {
        if start == 0 || start > end {
            return Err(FtpError::invalid_config(format!(
                "Invalid data port range {}-{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }
}

// ─── Connection configuration ────────────────────────────────────────

/// Configuration for a single FTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub transfer_mode: TransferMode,
    /// Local IP to bind data sockets to. Defaults to the control
    /// connection's local address.
    #[serde(default)]
    pub data_ip: Option<IpAddr>,
    /// Local ports usable for data sockets.
    #[serde(default)]
    pub data_port_range: Option<PortRange>,
    /// Control connection establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Passive-mode data connect timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// How long an active-mode transfer waits for the server to connect
    /// back, in seconds.
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout_sec: u64,
}

fn default_port() -> u16 {
    21
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_data_timeout() -> u64 {
    30
}
fn default_accept_timeout() -> u64 {
    20
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            transfer_mode: TransferMode::Passive,
            data_ip: None,
            data_port_range: None,
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
            accept_timeout_sec: default_accept_timeout(),
        }
    }
}

// ─── Directory listing ───────────────────────────────────────────────

/// One entry from a directory listing (parsed from LIST or MLSD output).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FtpEntry {
    pub name: String,
    /// Size in bytes. Always 0 for directories.
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

// ─── FTP response ────────────────────────────────────────────────────

/// A single logical FTP reply (may span multiple physical lines).
///
/// All lines of a multi-line reply share the 3-digit code of the first
/// line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the reply code indicates success (1xx–3xx).
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// Positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive-intermediate reply (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}
