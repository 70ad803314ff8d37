//! Async FTP client library. See [`ftp`] for the module map and
//! [`ftp::FtpClient`] for the entry point.
//!
//! ```no_run
//! use netftp::{FtpClient, FtpConnectionConfig};
//!
//! # async fn example() -> netftp::FtpResult<()> {
//! let mut client = FtpClient::new(FtpConnectionConfig {
//!     host: "ftp.example.com".into(),
//!     ..Default::default()
//! });
//! client.connect().await?;
//! client.authenticate("anonymous", "guest@example.com").await?;
//! for entry in client.get_list(None).await? {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod ftp;

pub use ftp::{
    FtpClient, FtpConnectionConfig, FtpEntry, FtpError, FtpErrorKind, FtpResponse, FtpResult,
    PortRange, TransferMode, TransferType,
};
