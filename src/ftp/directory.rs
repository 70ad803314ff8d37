//! Directory and name management: DELE, MKD, RMD and the RNFR/RNTO
//! rename pair.

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};

impl FtpClient {
    /// `DELE` — remove a file on the server.
    pub async fn delete_file(&mut self, path: &str) -> FtpResult<()> {
        if path.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        self.session_mut()?
            .codec
            .expect_code(&format!("DELE {}", path), 250)
            .await?;
        Ok(())
    }

    /// `MKD` — create a directory. Returns the server-reported path of
    /// the created directory when the 257 reply quotes one, otherwise
    /// echoes the requested path.
    pub async fn create_directory(&mut self, path: &str) -> FtpResult<String> {
        if path.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        let resp = self
            .session_mut()?
            .codec
            .expect_code(&format!("MKD {}", path), 257)
            .await?;
        Ok(quoted_path(&resp.text()).unwrap_or_else(|| path.to_string()))
    }

    /// `RMD` — remove a directory. The server rejects non-empty
    /// directories with a 550.
    pub async fn delete_directory(&mut self, path: &str) -> FtpResult<()> {
        if path.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        self.session_mut()?
            .codec
            .expect_code(&format!("RMD {}", path), 250)
            .await?;
        Ok(())
    }

    /// Rename (or move) via the `RNFR`/`RNTO` pair. `RNFR` must yield
    /// 350 before `RNTO` is sent; a failed `RNFR` leaves the target
    /// untouched.
    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        if from.is_empty() || to.is_empty() {
            return Err(FtpError::invalid_config("Path must not be empty"));
        }
        let session = self.session_mut()?;
        session
            .codec
            .expect_code(&format!("RNFR {}", from), 350)
            .await?;
        session
            .codec
            .expect_code(&format!("RNTO {}", to), 250)
            .await?;
        Ok(())
    }
}

/// Extract the first double-quoted token from a 257 reply text.
fn quoted_path(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let end = text[start + 1..].find('"')?;
    Some(text[start + 1..start + 1 + end].to_string())
}
