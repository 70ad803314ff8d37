//! File transfers: RETR, STOR, APPE, plus local-filesystem
//! conveniences built on `tokio::fs`.
//!
//! Every transfer follows the same shape: refuse if a transfer is in
//! flight, force binary representation, establish the data channel for
//! the configured mode, send the transfer command expecting a 1xx
//! preliminary reply, move the bytes, then read the final completion
//! reply off the control channel.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::TransferMode;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

use super::client::FtpClient;

impl FtpClient {
    /// `RETR` — download a file, writing its bytes into `dest`.
    /// Returns the number of bytes received.
    pub async fn get_file<W>(&mut self, path: &str, dest: &mut W) -> FtpResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mode = self.current_mode();
        let session = self.begin_transfer(path, mode).await?;
        session.codec.expect(&format!("RETR {}", path), 1).await?;

        let n = session.data.read_all(dest).await?;
        session.finish_transfer().await?;
        Ok(n)
    }

    /// `STOR` — upload `src` to a file on the server, replacing any
    /// existing content. Returns the number of bytes sent.
    pub async fn store_file<R>(&mut self, path: &str, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mode = self.current_mode();
        let session = self.begin_transfer(path, mode).await?;
        session.codec.expect(&format!("STOR {}", path), 1).await?;

        let n = session.data.write_all(src).await?;
        session.finish_transfer().await?;
        Ok(n)
    }

    /// `APPE` — upload `src`, appending to the remote file (the server
    /// creates it when missing). Returns the number of bytes sent.
    pub async fn append_to_file<R>(&mut self, path: &str, src: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mode = self.current_mode();
        let session = self.begin_transfer(path, mode).await?;
        session.codec.expect(&format!("APPE {}", path), 1).await?;

        let n = session.data.write_all(src).await?;
        session.finish_transfer().await?;
        Ok(n)
    }

    /// Download a remote file to a local path, creating parent
    /// directories as needed.
    pub async fn download(&mut self, remote: &str, local: impl AsRef<Path>) -> FtpResult<u64> {
        let local = local.as_ref();
        if let Some(parent) = local.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::File::create(local).await?;
        self.get_file(remote, &mut file).await
    }

    /// Upload a local file to a remote path via `STOR`.
    pub async fn upload(&mut self, local: impl AsRef<Path>, remote: &str) -> FtpResult<u64> {
        let mut file = tokio::fs::File::open(local.as_ref()).await?;
        self.store_file(remote, &mut file).await
    }

    /// Shared front half of every transfer: usage checks, `TYPE I`,
    /// data-channel establishment.
    async fn begin_transfer(
        &mut self,
        path: &str,
        mode: TransferMode,
    ) -> FtpResult<&mut super::client::Session> {
        if path.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        let session = self.session_mut()?;
        session.require_data_idle()?;
        session.negotiate_binary().await?;
        session.open_data_channel(mode).await?;
        Ok(session)
    }
}

impl super::client::Session {
    /// Read the completion reply that follows the data-channel EOF.
    pub(crate) async fn finish_transfer(&mut self) -> FtpResult<()> {
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::error::FtpErrorKind;
    use crate::ftp::types::FtpConnectionConfig;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Scripted server with a passive data channel: answers the opening
    /// exchange, then drives one transfer command.
    async fn passive_transfer_script(
        expected_cmd: &'static str,
        server_payload: Option<&'static [u8]>,
        final_reply: &'static str,
    ) -> (FtpClient, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let script = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = stream.into_split();
            let mut rd = BufReader::new(rd);
            let mut line = String::new();

            wr.write_all(b"220 ready\r\n").await.unwrap();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "FEAT");
            wr.write_all(b"502 no\r\n").await.unwrap();

            let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let data_addr = data_listener.local_addr().unwrap();

            line.clear();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "TYPE I");
            wr.write_all(b"200 binary\r\n").await.unwrap();

            line.clear();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "PASV");
            let p = data_addr.port();
            wr.write_all(
                format!("227 Entering Passive Mode (127,0,0,1,{},{})\r\n", p / 256, p % 256)
                    .as_bytes(),
            )
            .await
            .unwrap();

            line.clear();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), expected_cmd);
            wr.write_all(b"150 opening data connection\r\n")
                .await
                .unwrap();

            let (mut data, _) = data_listener.accept().await.unwrap();
            let received = match server_payload {
                Some(payload) => {
                    data.write_all(payload).await.unwrap();
                    drop(data);
                    Vec::new()
                }
                None => {
                    let mut buf = Vec::new();
                    data.read_to_end(&mut buf).await.unwrap();
                    buf
                }
            };

            wr.write_all(final_reply.as_bytes()).await.unwrap();
            received
        });

        let config = FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            ..Default::default()
        };
        let mut client = FtpClient::new(config);
        client.connect().await.unwrap();
        (client, script)
    }

    #[tokio::test]
    async fn get_file_downloads_payload() {
        let (mut client, script) = passive_transfer_script(
            "RETR data.bin",
            Some(b"binary file content"),
            "226 Transfer complete\r\n",
        )
        .await;

        let mut sink: Vec<u8> = Vec::new();
        let n = client.get_file("data.bin", &mut sink).await.unwrap();
        assert_eq!(n, 19);
        assert_eq!(sink, b"binary file content");
        script.await.unwrap();
    }

    #[tokio::test]
    async fn get_file_failed_completion_is_reported() {
        let (mut client, script) = passive_transfer_script(
            "RETR data.bin",
            Some(b"partial"),
            "426 Connection closed; transfer aborted\r\n",
        )
        .await;

        let mut sink: Vec<u8> = Vec::new();
        let err = client.get_file("data.bin", &mut sink).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::DataChannelFailed);
        assert_eq!(err.code, Some(426));
        script.await.unwrap();
    }

    #[tokio::test]
    async fn store_file_uploads_payload() {
        let (mut client, script) = passive_transfer_script(
            "STOR out.bin",
            None,
            "226 Transfer complete\r\n",
        )
        .await;

        let mut src = &b"bytes to store"[..];
        let n = client.store_file("out.bin", &mut src).await.unwrap();
        assert_eq!(n, 14);
        assert_eq!(script.await.unwrap(), b"bytes to store");
    }

    #[tokio::test]
    async fn append_sends_appe_verb() {
        let (mut client, script) = passive_transfer_script(
            "APPE log.txt",
            None,
            "226 Transfer complete\r\n",
        )
        .await;

        let mut src = &b"appended line\n"[..];
        let n = client.append_to_file("log.txt", &mut src).await.unwrap();
        assert_eq!(n, 14);
        assert_eq!(script.await.unwrap(), b"appended line\n");
    }

    #[tokio::test]
    async fn rejected_retr_leaves_channel_usable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let script = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = stream.into_split();
            let mut rd = BufReader::new(rd);
            let mut line = String::new();

            wr.write_all(b"220 ready\r\n").await.unwrap();
            rd.read_line(&mut line).await.unwrap();
            wr.write_all(b"502 no\r\n").await.unwrap();

            let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let p = data_listener.local_addr().unwrap().port();

            line.clear();
            rd.read_line(&mut line).await.unwrap();
            wr.write_all(b"200 binary\r\n").await.unwrap();
            line.clear();
            rd.read_line(&mut line).await.unwrap();
            wr.write_all(
                format!("227 Entering Passive Mode (127,0,0,1,{},{})\r\n", p / 256, p % 256)
                    .as_bytes(),
            )
            .await
            .unwrap();

            line.clear();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "RETR secret.txt");
            wr.write_all(b"550 Permission denied.\r\n").await.unwrap();

            // The client must be able to issue another command.
            line.clear();
            rd.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "NOOP");
            wr.write_all(b"200 zzz\r\n").await.unwrap();
        });

        let config = FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            ..Default::default()
        };
        let mut client = FtpClient::new(config);
        client.connect().await.unwrap();

        let mut sink: Vec<u8> = Vec::new();
        let err = client.get_file("secret.txt", &mut sink).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::PermissionDenied);
        assert_eq!(err.code, Some(550));

        client.noop().await.unwrap();
        script.await.unwrap();
    }

    #[tokio::test]
    async fn empty_path_is_rejected_locally() {
        let mut client = FtpClient::new(FtpConnectionConfig::default());
        let mut sink: Vec<u8> = Vec::new();
        let err = client.get_file("", &mut sink).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn download_creates_parent_directories() {
        let (mut client, script) = passive_transfer_script(
            "RETR remote.txt",
            Some(b"saved to disk"),
            "226 Transfer complete\r\n",
        )
        .await;

        let dir = std::env::temp_dir().join(format!("netftp-test-{}", std::process::id()));
        let target = dir.join("nested/remote.txt");
        let n = client.download("remote.txt", &target).await.unwrap();
        assert_eq!(n, 13);
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"saved to disk");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
        script.await.unwrap();
    }
}
