//! FTP-specific error type.
//!
//! Three families of failure, kept distinguishable for callers:
//! - **usage** — the call itself was wrong (wrong state, transfer
//!   already in flight). Local, never sent to the server.
//! - **protocol** — the server answered with an unexpected reply code;
//!   carries the numeric code and trailing text.
//! - **transport** — the control or data channel itself failed
//!   (timeout, reset, premature disconnect).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    // ── Usage ────────────────────────────────────────────────────
    /// Operation requires an established control connection.
    NotConnected,
    /// Connect called on an already-connected client.
    AlreadyConnected,
    /// Authenticate called twice on the same session.
    AlreadyAuthenticated,
    /// A read/write transfer is already in flight on the data
    /// connection.
    TransferInProgress,
    /// Config / parameter validation error.
    InvalidConfig,

    // ── Transport ────────────────────────────────────────────────
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// A bounded wait elapsed.
    Timeout,
    /// The remote side closed the connection unexpectedly.
    Disconnected,
    /// Data channel could not be established or rebuilt.
    DataChannelFailed,
    /// Local I/O failure.
    Io,

    // ── Protocol ─────────────────────────────────────────────────
    /// Server returned an unexpected reply code for a command.
    CommandRejected,
    /// Wrong username/password (430/530).
    AuthFailed,
    /// Permission denied on the server.
    PermissionDenied,
    /// File or directory not found on the server.
    NotFound,
    /// Server sent an un-parseable or out-of-spec response.
    ProtocolError,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn not_connected() -> Self {
        Self::new(FtpErrorKind::NotConnected, "You must connect first")
    }

    pub fn already_connected() -> Self {
        Self::new(FtpErrorKind::AlreadyConnected, "Client is already connected")
    }

    pub fn already_authenticated() -> Self {
        Self::new(
            FtpErrorKind::AlreadyAuthenticated,
            "Session is already authenticated",
        )
    }

    pub fn transfer_in_progress() -> Self {
        Self::new(
            FtpErrorKind::TransferInProgress,
            "There is already an active read/write operation on the data connection",
        )
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Io, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else {
                    FtpErrorKind::CommandRejected
                }
            }
            _ => FtpErrorKind::CommandRejected,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
        }
    }

    // ── Taxonomy helpers ─────────────────────────────────────────

    /// The call itself was wrong; nothing reached the server.
    pub fn is_usage(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::NotConnected
                | FtpErrorKind::AlreadyConnected
                | FtpErrorKind::AlreadyAuthenticated
                | FtpErrorKind::TransferInProgress
                | FtpErrorKind::InvalidConfig
        )
    }

    /// The control or data channel failed, as opposed to the server
    /// rejecting a request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::ConnectionFailed
                | FtpErrorKind::Timeout
                | FtpErrorKind::Disconnected
                | FtpErrorKind::DataChannelFailed
                | FtpErrorKind::Io
        )
    }

    /// The server answered, but not with the expected reply class.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::CommandRejected
                | FtpErrorKind::AuthFailed
                | FtpErrorKind::PermissionDenied
                | FtpErrorKind::NotFound
                | FtpErrorKind::ProtocolError
        )
    }

    /// Permanent server failure (5xx reply).
    pub fn is_permanent(&self) -> bool {
        self.code.map_or(false, |c| c >= 500)
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}
