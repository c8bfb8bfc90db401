// ABOUTME: russh-backed transport: connection, authentication, command execution.
// ABOUTME: The stat channel is an SFTP subsystem session opened with russh-sftp.

use super::{Connection, FileStat, RawOutput, StatChannel, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::keys::{PrivateKeyWithHashAlg, load_public_key, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport that opens real SSH connections.
#[derive(Debug, Clone)]
pub struct RusshTransport {
    inactivity_timeout: Option<Duration>,
}

impl Default for RusshTransport {
    fn default() -> Self {
        Self {
            inactivity_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RusshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }
}

/// Records the server key fingerprint; trust decisions belong to the session.
pub(crate) struct FingerprintRecorder {
    fingerprint: Arc<Mutex<Option<String>>>,
}

impl client::Handler for FingerprintRecorder {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key
            .fingerprint(ssh_key::HashAlg::Sha256)
            .to_string();
        *self.fingerprint.lock() = Some(fingerprint);
        Ok(true)
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Connection>, TransportError> {
        let russh_config = Config {
            inactivity_timeout: self.inactivity_timeout,
            ..Default::default()
        };

        let fingerprint = Arc::new(Mutex::new(None));
        let handler = FingerprintRecorder {
            fingerprint: Arc::clone(&fingerprint),
        };

        let handle = client::connect(Arc::new(russh_config), (host, port), handler)
            .await
            .map_err(|e| {
                if e.to_string().contains("Connection refused") {
                    TransportError::Connect(format!("connection refused to {}:{}", host, port))
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        tracing::debug!(host, port, "SSH handshake complete");

        Ok(Box::new(RusshConnection {
            handle,
            fingerprint,
        }))
    }
}

struct RusshConnection {
    handle: Handle<FingerprintRecorder>,
    fingerprint: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Connection for RusshConnection {
    fn fingerprint(&self) -> Option<String> {
        self.fingerprint.lock().clone()
    }

    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<bool, TransportError> {
        let result = self.handle.authenticate_password(user, password).await?;
        Ok(result.success())
    }

    async fn authenticate_keypair(
        &mut self,
        user: &str,
        public_key: &Path,
        private_key: &Path,
        passphrase: Option<&str>,
    ) -> Result<bool, TransportError> {
        let key = load_secret_key(private_key, passphrase).map_err(|e| {
            TransportError::KeyLoadFailed {
                path: private_key.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        let public = load_public_key(public_key).map_err(|e| TransportError::KeyLoadFailed {
            path: public_key.to_path_buf(),
            reason: e.to_string(),
        })?;
        if public.key_data() != key.public_key().key_data() {
            return Err(TransportError::KeyMismatch(public_key.to_path_buf()));
        }

        let hash_alg = self.handle.best_supported_rsa_hash().await?.flatten();

        let result = self
            .handle
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await?;

        Ok(result.success())
    }

    async fn execute(&self, command: &str) -> Result<RawOutput, TransportError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Channel(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Channel(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        let mut exit_signal = None;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    tracing::debug!(command, signal = ?signal_name, "command terminated by signal");
                    exit_signal = Some(format!("{:?}", signal_name));
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if exit_status.is_some() || exit_signal.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => break,
            }
        }

        // Neither a terminal message nor end of output: torn down underneath us.
        if exit_status.is_none() && exit_signal.is_none() && !got_eof {
            return Err(TransportError::ChannelClosed);
        }

        Ok(RawOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_status,
            exit_signal,
        })
    }

    async fn open_stat_channel(&self) -> Result<Arc<dyn StatChannel>, TransportError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Channel(format!("failed to open channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| {
                TransportError::Channel(format!("failed to request sftp subsystem: {}", e))
            })?;

        let sftp = SftpSession::new(channel.into_stream()).await?;
        tracing::debug!("SFTP stat channel opened");

        Ok(Arc::new(SftpStatChannel { sftp }))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

struct SftpStatChannel {
    sftp: SftpSession,
}

fn is_no_such_file(err: &SftpError) -> bool {
    matches!(err, SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile)
}

impl SftpStatChannel {
    async fn create_one(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        self.sftp.create_dir(path).await?;
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..FileAttributes::empty()
        };
        self.sftp.set_metadata(path, attrs).await?;
        Ok(())
    }
}

#[async_trait]
impl StatChannel for SftpStatChannel {
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, TransportError> {
        match self.sftp.metadata(path).await {
            Ok(attrs) => Ok(Some(FileStat {
                mode: attrs.permissions.unwrap_or(0),
                size: attrs.size,
                mtime: attrs.mtime.map(u64::from),
            })),
            Err(e) if is_no_such_file(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError> {
        if !recursive {
            return self.create_one(path, mode).await;
        }

        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            match self.sftp.metadata(prefix.as_str()).await {
                Ok(_) => continue,
                Err(e) if is_no_such_file(&e) => self.create_one(&prefix, mode).await?,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn reader(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, TransportError> {
        let file = self.sftp.open(path).await?;
        Ok(Box::new(file))
    }

    async fn writer(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError> {
        let file = self.sftp.create(path).await?;
        Ok(Box::new(file))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sftp.close().await?;
        Ok(())
    }
}
