//! Stateful FTP client — owns the control connection and issues
//! commands.
//!
//! Lifecycle: `new()` → `connect()` (greeting + FEAT probe) →
//! `authenticate()` → commands. `directory.rs` and `file_ops.rs` add
//! the filesystem-level operations on top of the session helpers here.
//!
//! One client drives one session and must be used from one task at a
//! time; every method takes `&mut self` and the type is not meant to be
//! shared behind a lock-free handle.

use crate::ftp::connection;
use crate::ftp::data::DataConnection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser::{self, ListingKind};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::*;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use uuid::Uuid;

/// An FTP client session (RFC 959).
pub struct FtpClient {
    id: String,
    config: FtpConnectionConfig,
    state: SessionState,
}

/// Connection state. Commands are only reachable through the
/// `Connected` arm, so "send while disconnected" cannot be expressed.
enum SessionState {
    Disconnected,
    Connected(Session),
}

/// Everything that only exists while the control connection is up.
pub(crate) struct Session {
    pub(crate) codec: FtpCodec,
    pub(crate) data: DataConnection,
    greeting: String,
    features: Vec<String>,
    authenticated: bool,
}

impl FtpClient {
    /// Create a client. No I/O happens until [`connect`](Self::connect).
    pub fn new(config: FtpConnectionConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            state: SessionState::Disconnected,
        }
    }

    // ─── Connect / disconnect ────────────────────────────────────

    /// Open the control connection, read the greeting and probe server
    /// capabilities via `FEAT`.
    pub async fn connect(&mut self) -> FtpResult<()> {
        if matches!(self.state, SessionState::Connected(_)) {
            return Err(FtpError::already_connected());
        }
        if self.config.host.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let (mut codec, greeting) = connection::connect(&self.config).await?;
        if greeting.code != 220 {
            return Err(FtpError::protocol_error(format!(
                "Unexpected greeting: {}",
                greeting.text()
            )));
        }
        let greeting_text = greeting_text(&greeting);

        // Capabilities are captured once per connection; re-querying
        // requires a new connection.
        let features = probe_features(&mut codec).await;

        let data = DataConnection::new(
            codec.local_addr().ip(),
            self.config.data_ip,
            self.config.data_port_range,
            Duration::from_secs(self.config.accept_timeout_sec),
            Duration::from_secs(self.config.data_timeout_sec),
        )?;

        log::debug!(
            "ftp session {} connected to {}:{}",
            self.id,
            self.config.host,
            self.config.port
        );

        self.state = SessionState::Connected(Session {
            codec,
            data,
            greeting: greeting_text,
            features,
            authenticated: false,
        });
        Ok(())
    }

    /// Close the session: best-effort `QUIT`, then drop the transport.
    /// Capability and authentication state are always cleared; the
    /// client can connect again afterwards.
    pub async fn disconnect(&mut self) -> FtpResult<()> {
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Disconnected => Err(FtpError::not_connected()),
            SessionState::Connected(mut session) => {
                // The server may already be gone; the QUIT is advisory.
                let _ = session.codec.send_command("QUIT").await;
                log::debug!("ftp session {} disconnected", self.id);
                Ok(())
            }
        }
    }

    // ─── Authentication ──────────────────────────────────────────

    /// Authenticate with `USER`/`PASS`. A `2xx` reply to `USER` alone
    /// completes authentication; a `3xx` reply is the password
    /// challenge.
    pub async fn authenticate(&mut self, user: &str, password: &str) -> FtpResult<()> {
        let session = self.session_mut()?;
        if session.authenticated {
            return Err(FtpError::already_authenticated());
        }

        let user_resp = session.codec.execute(&format!("USER {}", user)).await?;
        if user_resp.is_completion() {
            session.authenticated = true;
            return Ok(());
        }
        if !user_resp.is_intermediate() {
            return Err(FtpError::from_reply(user_resp.code, &user_resp.text()));
        }

        // The 230 may be multi-line ("230-User has group access ...").
        let pass_resp = session
            .codec
            .execute(&format!("PASS {}", password))
            .await?;
        if pass_resp.code != 230 {
            return Err(FtpError::from_reply(pass_resp.code, &pass_resp.text()));
        }
        session.authenticated = true;
        Ok(())
    }

    // ─── Session keep-alive / reset ──────────────────────────────

    /// `NOOP` — keeps the control connection from idling out.
    pub async fn noop(&mut self) -> FtpResult<()> {
        self.session_mut()?.codec.expect_ok("NOOP").await?;
        Ok(())
    }

    /// `ABOR` — ask the server to cancel an in-progress transfer. The
    /// data socket is not forcibly closed; cancellation is cooperative.
    pub async fn abort(&mut self) -> FtpResult<()> {
        self.session_mut()?.codec.expect_ok("ABOR").await?;
        Ok(())
    }

    /// `REIN` — flush server-side session state without closing the
    /// transport. The session must authenticate again afterwards.
    pub async fn reinitialize(&mut self) -> FtpResult<()> {
        let session = self.session_mut()?;
        session.codec.expect_ok("REIN").await?;
        session.authenticated = false;
        Ok(())
    }

    // ─── Working directory ───────────────────────────────────────

    /// `PWD` — current working directory on the server.
    pub async fn current_dir(&mut self) -> FtpResult<String> {
        let resp = self.session_mut()?.codec.expect_ok("PWD").await?;
        parse_quoted_path(&resp.text())
    }

    /// `CWD` — change the current working directory.
    pub async fn set_current_dir(&mut self, path: &str) -> FtpResult<()> {
        if path.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        self.session_mut()?
            .codec
            .expect_ok(&format!("CWD {}", path))
            .await?;
        Ok(())
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// List files and directories. `path = None` lists the current
    /// directory. Uses `MLSD` when the server advertises it, otherwise
    /// falls back to heuristic `LIST` parsing.
    pub async fn get_list(&mut self, path: Option<&str>) -> FtpResult<Vec<FtpEntry>> {
        let mode = self.config.transfer_mode;
        let session = self.session_mut()?;
        session.require_data_idle()?;

        let kind = if session.supports("MLSD") {
            ListingKind::Mlsd
        } else {
            ListingKind::List
        };
        let verb = match kind {
            ListingKind::Mlsd => "MLSD",
            ListingKind::List => "LIST",
        };
        let cmd = match path {
            Some(p) => format!("{} {}", verb, p),
            None => verb.to_string(),
        };

        session.negotiate_binary().await?;
        session.open_data_channel(mode).await?;
        session.codec.expect(&cmd, 1).await?;

        let mut payload: Vec<u8> = Vec::new();
        session.data.read_all(&mut payload).await?;

        let done = session.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }

        let raw = String::from_utf8_lossy(&payload);
        Ok(parser::parse_listing(kind, &raw))
    }

    // ─── Data-channel settings ───────────────────────────────────

    /// Data connection establishment mode for subsequent transfers.
    pub fn transfer_mode(&self) -> TransferMode {
        self.config.transfer_mode
    }

    /// Change the establishment mode. While connected this rebuilds the
    /// bound data socket.
    pub fn set_transfer_mode(&mut self, mode: TransferMode) -> FtpResult<()> {
        self.config.transfer_mode = mode;
        if let SessionState::Connected(session) = &mut self.state {
            session.require_data_idle()?;
            session.data.rebuild()?;
        }
        Ok(())
    }

    /// Override the local IP used for data sockets. `None` falls back
    /// to the control connection's local address.
    pub fn set_data_ip(&mut self, ip: Option<IpAddr>) -> FtpResult<()> {
        self.config.data_ip = ip;
        if let SessionState::Connected(session) = &mut self.state {
            session.require_data_idle()?;
            session.data.set_data_ip(ip)?;
        }
        Ok(())
    }

    /// Restrict local data ports to an inclusive range. `None` lets the
    /// OS assign ephemeral ports.
    pub fn set_data_port_range(&mut self, range: Option<PortRange>) -> FtpResult<()> {
        self.config.data_port_range = range;
        if let SessionState::Connected(session) = &mut self.state {
            session.require_data_idle()?;
            session.data.set_port_range(range)?;
        }
        Ok(())
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&self.state, SessionState::Connected(s) if s.authenticated)
    }

    /// Greeting text sent by the server at connect time.
    pub fn greeting(&self) -> FtpResult<&str> {
        match &self.state {
            SessionState::Connected(s) => Ok(&s.greeting),
            SessionState::Disconnected => Err(FtpError::not_connected()),
        }
    }

    /// Extension tokens the server advertised in response to `FEAT`,
    /// captured once at connect time.
    pub fn features(&self) -> FtpResult<&[String]> {
        match &self.state {
            SessionState::Connected(s) => Ok(&s.features),
            SessionState::Disconnected => Err(FtpError::not_connected()),
        }
    }

    /// Session id used in log lines.
    pub fn id(&self) -> &str {
        &self.id
    }

    // ─── Internals shared with directory.rs / file_ops.rs ────────

    pub(crate) fn session_mut(&mut self) -> FtpResult<&mut Session> {
        match &mut self.state {
            SessionState::Connected(session) => Ok(session),
            SessionState::Disconnected => Err(FtpError::not_connected()),
        }
    }

    pub(crate) fn current_mode(&self) -> TransferMode {
        self.config.transfer_mode
    }
}

impl Session {
    /// Reject transfer-style calls while a transfer is in flight,
    /// before anything touches the wire.
    pub(crate) fn require_data_idle(&self) -> FtpResult<()> {
        if self.data.is_active() {
            return Err(FtpError::transfer_in_progress());
        }
        Ok(())
    }

    /// Case-insensitive capability lookup against the FEAT tokens.
    pub(crate) fn supports(&self, feature: &str) -> bool {
        let want = feature.to_ascii_uppercase();
        self.features
            .iter()
            .any(|f| f.to_ascii_uppercase().starts_with(&want))
    }

    /// Transfers always run in binary representation.
    pub(crate) async fn negotiate_binary(&mut self) -> FtpResult<()> {
        self.codec.expect_ok("TYPE I").await?;
        Ok(())
    }

    /// Establish the data channel for the next transfer: `PORT` for
    /// active mode, `PASV` for passive mode.
    pub(crate) async fn open_data_channel(&mut self, mode: TransferMode) -> FtpResult<()> {
        match mode {
            TransferMode::Active => {
                let addr = self.data.switch_to_active()?;
                let ip = match addr.ip() {
                    IpAddr::V4(v4) => v4,
                    IpAddr::V6(_) => {
                        return Err(FtpError::data_channel(
                            "PORT requires an IPv4 data endpoint",
                        ))
                    }
                };
                let o = ip.octets();
                let port = addr.port();
                let cmd = format!(
                    "PORT {},{},{},{},{},{}",
                    o[0],
                    o[1],
                    o[2],
                    o[3],
                    port >> 8,
                    port & 0xff
                );
                self.codec.expect_ok(&cmd).await?;
            }
            TransferMode::Passive => {
                let resp = self.codec.expect_code("PASV", 227).await?;
                let remote = parse_pasv_response(&resp.text())?;
                self.data.switch_to_passive(remote).await?;
            }
        }
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Greeting text with the `220`/`220-` prefixes stripped.
fn greeting_text(resp: &FtpResponse) -> String {
    resp.lines
        .iter()
        .map(|l| {
            if l.len() > 4 {
                l[4..].to_string()
            } else {
                String::new()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Probe `FEAT` (RFC 2389). Servers without it just produce an empty
/// capability set.
async fn probe_features(codec: &mut FtpCodec) -> Vec<String> {
    let resp = match codec.execute("FEAT").await {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    if resp.code != 211 {
        return Vec::new();
    }
    resp.lines
        .iter()
        .filter(|l| l.starts_with(' '))
        .map(|l| l.trim().to_string())
        .collect()
}

/// Parse `257 "/some/path"` into the path; falls back to the second
/// whitespace token for servers that skip the quotes.
fn parse_quoted_path(text: &str) -> FtpResult<String> {
    if let Some(start) = text.find('"') {
        if let Some(end) = text[start + 1..].find('"') {
            return Ok(text[start + 1..start + 1 + end].to_string());
        }
    }
    text.split_whitespace()
        .nth(1)
        .map(|s| s.to_string())
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse path reply: {}", text)))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 reply.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let re = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV reply: {}", text)))?;

    let mut nums = [0u8; 6];
    for (i, num) in nums.iter_mut().enumerate() {
        *num = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::protocol_error("PASV number out of range"))?;
    }

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}
