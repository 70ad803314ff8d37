//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// The FTP command/response codec operating on split stream halves.
pub struct FtpCodec {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_addr: SocketAddr,
}

impl FtpCodec {
    /// Create a codec from a connected control stream.
    pub fn from_tcp(stream: TcpStream) -> FtpResult<Self> {
        let local_addr = stream.local_addr()?;
        let (rd, wr) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(rd),
            writer: wr,
            local_addr,
        })
    }

    /// Local endpoint of the control connection. Data sockets pick
    /// their address family and default bind address from this.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a raw FTP command (without trailing CRLF — we add it).
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes()).await?;
        log::trace!(">>> {}", cmd);
        Ok(())
    }

    /// Read a single line from the control channel.
    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).await?;
        if n == 0 {
            return Err(FtpError::disconnected(
                "Remote host closed the connection unexpectedly",
            ));
        }
        Ok(buf)
    }

    /// Read one complete FTP reply (possibly multi-line).
    ///
    /// Multi-line replies look like:
    /// ```text
    /// 230-User has group access to: users
    /// 230-Quota: unlimited
    /// 230 OK. Current directory is /
    /// ```
    /// The first line carries `NNN-`; every following line belongs to
    /// the reply until one starts with `NNN ` (that terminator line is
    /// part of the reply too). Intermediate lines that merely begin
    /// with digits are not terminators.
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let first_trimmed = first.trim_end_matches(['\r', '\n']);

        if first_trimmed.len() < 3 {
            return Err(FtpError::protocol_error(format!(
                "Response too short: '{}'",
                first_trimmed
            )));
        }

        let code = parse_code(first_trimmed)?;
        let mut lines = vec![first_trimmed.to_string()];

        let is_multi = first_trimmed.len() >= 4 && first_trimmed.as_bytes()[3] == b'-';
        if is_multi {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next_trimmed = next.trim_end_matches(['\r', '\n']);
                lines.push(next_trimmed.to_string());
                if next_trimmed.starts_with(&terminator) {
                    break;
                }
            }
        }

        let resp = FtpResponse { code, lines };
        log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
        Ok(resp)
    }

    /// Send a command and return the reply.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Send a command, expect a reply of the given class (first digit).
    pub async fn expect(&mut self, cmd: &str, expected_first_digit: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code / 100 != expected_first_digit {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    /// Send a command, expect a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.expect(cmd, 2).await
    }

    /// Send a command, expect one exact reply code.
    pub async fn expect_code(&mut self, cmd: &str, expected: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code != expected {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::error::FtpErrorKind;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Spawn a loopback peer that writes `payload` on accept, then
    /// closes. Returns a codec connected to it.
    async fn codec_reading(payload: &'static [u8]) -> FtpCodec {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut peer, _) = listener.accept().await.unwrap();
            peer.write_all(payload).await.unwrap();
        });
        let stream = TcpStream::connect(addr).await.unwrap();
        FtpCodec::from_tcp(stream).unwrap()
    }

    #[tokio::test]
    async fn single_line_reply() {
        let mut codec = codec_reading(b"220 FTP server ready\r\n").await;
        let resp = codec.read_response().await.unwrap();
        assert_eq!(resp.code, 220);
        assert_eq!(resp.lines, vec!["220 FTP server ready".to_string()]);
    }

    #[tokio::test]
    async fn multi_line_reply_keeps_all_lines() {
        let mut codec = codec_reading(
            b"230-User someuser has group access to: someuser\r\n\
              230-Quota: unlimited\r\n\
              230 OK. Current restricted directory is /\r\n",
        )
        .await;
        let resp = codec.read_response().await.unwrap();
        assert_eq!(resp.code, 230);
        assert_eq!(resp.lines.len(), 3);
        assert_eq!(resp.lines[2], "230 OK. Current restricted directory is /");
    }

    #[tokio::test]
    async fn multi_line_embedded_digits_are_not_terminators() {
        // RFC 959 §4.2 example: an intermediate line may begin with
        // digits; only "<code><SP>" at line start terminates.
        let mut codec = codec_reading(
            b"123-First line\r\n\
              Second line\r\n\
              234 A line beginning with numbers\r\n\
              123 The last line\r\n",
        )
        .await;
        let resp = codec.read_response().await.unwrap();
        assert_eq!(resp.code, 123);
        assert_eq!(resp.lines.len(), 4);
        assert_eq!(resp.lines[3], "123 The last line");
    }

    #[tokio::test]
    async fn premature_eof_is_disconnected() {
        let mut codec = codec_reading(b"226-Transfer complete\r\n").await;
        let err = codec.read_response().await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::Disconnected);
    }

    #[tokio::test]
    async fn short_garbage_is_protocol_error() {
        let mut codec = codec_reading(b"hi\r\n").await;
        let err = codec.read_response().await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ProtocolError);
    }
}
