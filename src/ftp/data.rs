//! Data-channel management for FTP transfers.
//!
//! A [`DataConnection`] owns one socket used for exactly one transfer
//! at a time. Before each transfer the orchestrator switches it to
//! active mode (listen, advertise via `PORT`) or passive mode (connect
//! to the server's `PASV` endpoint); after every transfer — success or
//! failure — the socket is closed and rebuilt, advancing the port-range
//! cursor when one is configured. A closed descriptor is never reused.
//!
//! Not thread-safe: the owning client serializes all access through
//! `&mut self`.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::PortRange;
use chrono::{DateTime, Utc};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;

/// Chunk size for data-channel byte copies (64 KiB).
const COPY_CHUNK: usize = 65_536;

/// The single owned socket, in exactly one of its three legal shapes.
/// `PORT` can only be advertised from `Listening`, a passive copy can
/// only run on `Connected`, so a mode mix-up is unrepresentable.
enum DataSocket {
    /// Created and bound, not yet committed to a mode.
    Bound(TcpSocket, SocketAddr),
    /// Active mode: waiting for the server to connect in.
    Listening(tokio::net::TcpListener, SocketAddr),
    /// Passive mode: already connected to the server's endpoint.
    Connected(TcpStream),
}

/// FTP client data connection. See the module docs for the lifecycle.
pub struct DataConnection {
    /// Local address of the control connection; used for address-family
    /// selection and as the default bind address.
    control_local_ip: IpAddr,
    data_ip: Option<IpAddr>,
    port_range: Option<PortRange>,
    /// Last port handed out from the range; `None` until first use.
    port_cursor: Option<u16>,
    accept_timeout: Duration,
    connect_timeout: Duration,
    socket: Option<DataSocket>,
    active: bool,
    last_activity: DateTime<Utc>,
}

impl DataConnection {
    /// Create a data connection with its socket already bound.
    pub fn new(
        control_local_ip: IpAddr,
        data_ip: Option<IpAddr>,
        port_range: Option<PortRange>,
        accept_timeout: Duration,
        connect_timeout: Duration,
    ) -> FtpResult<Self> {
        let mut dc = Self {
            control_local_ip,
            data_ip,
            port_range,
            port_cursor: None,
            accept_timeout,
            connect_timeout,
            socket: None,
            active: false,
            last_activity: Utc::now(),
        };
        dc.rebuild()?;
        Ok(dc)
    }

    /// Whether a read/write transfer is currently in flight.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last time the data channel read or wrote bytes.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Local endpoint of the owned socket.
    pub fn local_addr(&self) -> FtpResult<SocketAddr> {
        match &self.socket {
            Some(DataSocket::Bound(_, addr)) | Some(DataSocket::Listening(_, addr)) => Ok(*addr),
            Some(DataSocket::Connected(stream)) => Ok(stream.local_addr()?),
            None => Err(FtpError::data_channel("Data socket is not bound")),
        }
    }

    /// Update the bind-address override. Rebuilds the socket so the
    /// next transfer uses the new address.
    pub fn set_data_ip(&mut self, data_ip: Option<IpAddr>) -> FtpResult<()> {
        self.data_ip = data_ip;
        self.rebuild()
    }

    /// Update the local port range. Rebuilds the socket; the cursor
    /// restarts from the beginning of the new range.
    pub fn set_port_range(&mut self, range: Option<PortRange>) -> FtpResult<()> {
        self.port_range = range;
        self.port_cursor = None;
        self.rebuild()
    }

    /// Close whatever socket is held and bind a fresh one on the next
    /// port-range value.
    pub fn rebuild(&mut self) -> FtpResult<()> {
        self.socket = None;
        let (socket, addr) = self.create_socket()?;
        self.socket = Some(DataSocket::Bound(socket, addr));
        Ok(())
    }

    /// Put the owned socket into listening state (backlog 1) so it can
    /// be advertised to the server via `PORT`. No blocking I/O happens
    /// here. Returns the endpoint to advertise.
    pub fn switch_to_active(&mut self) -> FtpResult<SocketAddr> {
        let (socket, addr) = self.take_bound()?;
        let listener = socket
            .listen(1)
            .map_err(|e| FtpError::data_channel(format!("Data socket listen: {}", e)))?;
        self.socket = Some(DataSocket::Listening(listener, addr));
        log::debug!(
            "data channel switched to active mode, listening on {}",
            addr
        );
        Ok(addr)
    }

    /// Connect the owned socket to the server-advertised passive
    /// endpoint.
    pub async fn switch_to_passive(&mut self, remote: SocketAddr) -> FtpResult<()> {
        let (socket, local) = self.take_bound()?;
        let stream = timeout(self.connect_timeout, socket.connect(remote))
            .await
            .map_err(|_| {
                FtpError::timeout(format!("Passive data connect to {} timed out", remote))
            })?
            .map_err(|e| {
                FtpError::data_channel(format!("Passive data connect to {}: {}", remote, e))
            })?;
        self.socket = Some(DataSocket::Connected(stream));
        log::debug!(
            "data channel switched to passive mode, {} -> {}",
            local,
            remote
        );
        Ok(())
    }

    /// Read everything from the data channel into `dest`. Returns the
    /// byte count. The socket is rebuilt afterwards whether the
    /// transfer succeeded or not.
    pub async fn read_all<W>(&mut self, dest: &mut W) -> FtpResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.active = true;
        let result = self.read_all_inner(dest).await;
        self.active = false;
        let rebuilt = self.rebuild();
        let n = result?;
        rebuilt?;
        log::debug!("data channel read {} bytes", n);
        Ok(n)
    }

    /// Write everything from `src` to the data channel. Returns the
    /// byte count. The socket is rebuilt afterwards whether the
    /// transfer succeeded or not.
    pub async fn write_all<R>(&mut self, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.active = true;
        let result = self.write_all_inner(src).await;
        self.active = false;
        let rebuilt = self.rebuild();
        let n = result?;
        rebuilt?;
        log::debug!("data channel wrote {} bytes", n);
        Ok(n)
    }

    async fn read_all_inner<W>(&mut self, dest: &mut W) -> FtpResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = self.established_stream().await?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dest.write_all(&buf[..n]).await?;
            total += n as u64;
            self.last_activity = Utc::now();
        }
        dest.flush().await?;
        Ok(total)
    }

    async fn write_all_inner<R>(&mut self, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut stream = self.established_stream().await?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;
        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await?;
            total += n as u64;
            self.last_activity = Utc::now();
        }
        // The server treats EOF on the data channel as end of payload.
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(total)
    }

    /// Produce the transfer-ready stream: accept the server's inbound
    /// connect in active mode (bounded by the accept budget), or take
    /// the already-connected passive stream.
    async fn established_stream(&mut self) -> FtpResult<TcpStream> {
        match self.socket.take() {
            Some(DataSocket::Listening(listener, addr)) => {
                log::debug!("active data channel waiting for server connect on {}", addr);
                let (stream, peer) = timeout(self.accept_timeout, listener.accept())
                    .await
                    .map_err(|_| {
                        FtpError::timeout("FTP server didn't connect during expected time")
                    })?
                    .map_err(|e| FtpError::data_channel(format!("Data accept: {}", e)))?;
                log::debug!("active data channel established, peer {}", peer);
                Ok(stream)
            }
            Some(DataSocket::Connected(stream)) => Ok(stream),
            other => {
                self.socket = other;
                Err(FtpError::data_channel(
                    "Data channel has not been established for a transfer",
                ))
            }
        }
    }

    /// Take the bound-but-uncommitted socket, rebuilding first if the
    /// previous transfer left it in another shape.
    fn take_bound(&mut self) -> FtpResult<(TcpSocket, SocketAddr)> {
        if !matches!(self.socket, Some(DataSocket::Bound(..))) {
            self.rebuild()?;
        }
        match self.socket.take() {
            Some(DataSocket::Bound(socket, addr)) => Ok((socket, addr)),
            _ => Err(FtpError::data_channel("Data socket is not bound")),
        }
    }

    fn create_socket(&mut self) -> FtpResult<(TcpSocket, SocketAddr)> {
        let ip = self.data_ip.unwrap_or(self.control_local_ip);
        let socket = match ip {
            IpAddr::V4(_) => TcpSocket::new_v4(),
            IpAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| FtpError::data_channel(format!("Data socket create: {}", e)))?;

        // Range ports may linger in TIME_WAIT from a previous transfer.
        socket
            .set_reuseaddr(true)
            .map_err(|e| FtpError::data_channel(format!("Data socket reuseaddr: {}", e)))?;

        let port = self.next_port();
        let bind_addr = SocketAddr::new(ip, port);
        socket
            .bind(bind_addr)
            .map_err(|e| FtpError::data_channel(format!("Data socket bind {}: {}", bind_addr, e)))?;
        let local = socket
            .local_addr()
            .map_err(|e| FtpError::data_channel(format!("Data socket local_addr: {}", e)))?;
        Ok((socket, local))
    }

    /// Next local port: the range cursor advances by one per socket and
    /// wraps to `start` when it has never been set or would pass `end`.
    /// Without a range the OS chooses (port 0).
    fn next_port(&mut self) -> u16 {
        match self.port_range {
            None => 0,
            Some(range) => {
                let next = match self.port_cursor {
                    Some(p) if p < range.end() => p + 1,
                    _ => range.start(),
                };
                self.port_cursor = Some(next);
                next
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn force_active(&mut self, active: bool) {
        self.active = active;
    }
}
