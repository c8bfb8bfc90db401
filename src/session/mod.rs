// ABOUTME: Session manager owning one connection to one host:port.
// ABOUTME: Handles connect/disconnect, host key trust, and the command execution protocol.

mod host_keys;

pub use host_keys::{HostKeyCheck, HostKeyRegistry};

use crate::auth::Authentication;
use crate::error::{Error, Result};
use crate::transport::{Connection, RawOutput, RusshTransport, StatChannel, Transport};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for establishing a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Credential presented after the handshake.
    pub credential: Option<Arc<dyn Authentication>>,
    /// Whether to check the server key against `host_keys` (default: true).
    pub host_key_verification: bool,
    /// Pinned and previously learned fingerprints.
    pub host_keys: HostKeyRegistry,
    /// Where newly learned fingerprints are written, if anywhere.
    pub host_key_file: Option<PathBuf>,
    /// Upper bound for a single command. None waits indefinitely.
    pub command_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            credential: None,
            host_key_verification: true,
            host_keys: HostKeyRegistry::default(),
            host_key_file: None,
            command_timeout: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credential(mut self, credential: impl Authentication + 'static) -> Self {
        self.credential = Some(Arc::new(credential));
        self
    }

    pub fn host_key_verification(mut self, enabled: bool) -> Self {
        self.host_key_verification = enabled;
        self
    }

    pub fn host_keys(mut self, registry: HostKeyRegistry) -> Self {
        self.host_keys = registry;
        self
    }

    pub fn host_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_key_file = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }
}

/// Output lines of a command plus its exit status when requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Standard output split into lines, each trimmed.
    pub lines: Vec<String>,
    /// Exit status, present only when it was asked for.
    pub exit_code: Option<u32>,
}

impl CommandResult {
    /// True unless an exit status was captured and is non-zero.
    pub fn success(&self) -> bool {
        self.exit_code.is_none_or(|code| code == 0)
    }

    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

struct Connected {
    connection: Box<dyn Connection>,
    stat: Option<Arc<dyn StatChannel>>,
}

/// A (lazily) authenticated session to one remote host.
pub struct Session {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    state: tokio::sync::Mutex<Option<Connected>>,
    host_keys: Mutex<HostKeyRegistry>,
    fingerprint: Mutex<Option<String>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("fingerprint", &*self.fingerprint.lock())
            .finish()
    }
}

impl Session {
    /// Create an unconnected session using the russh transport.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, Arc::new(RusshTransport::new()))
    }

    /// Create an unconnected session over an arbitrary transport.
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let host_keys = Mutex::new(config.host_keys.clone());
        Self {
            config,
            transport,
            state: tokio::sync::Mutex::new(None),
            host_keys,
            fingerprint: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fingerprint recorded by the last successful connect.
    pub fn fingerprint(&self) -> Option<String> {
        self.fingerprint.lock().clone()
    }

    /// Snapshot of the host key registry.
    pub fn host_keys(&self) -> HostKeyRegistry {
        self.host_keys.lock().clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Connect and authenticate. Does nothing when already connected.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.connection(&mut state).await?;
        Ok(())
    }

    /// Disconnect the session. Safe to call when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let taken = self.state.lock().await.take();
        *self.fingerprint.lock() = None;
        let Some(connected) = taken else {
            return Ok(());
        };
        tracing::debug!(host = %self.config.host, port = self.config.port, "disconnecting");
        teardown(connected).await
    }

    /// Execute a command, connecting first if needed.
    ///
    /// Anything written to stderr fails the command with [`Error::Execution`].
    /// With `want_exit_code`, the result carries the command's exit status.
    pub async fn execute(&self, command: &str, want_exit_code: bool) -> Result<CommandResult> {
        let mut state = self.state.lock().await;
        let connected = self.connection(&mut state).await?;

        let native = connected.connection.reports_exit_status();
        let text = if want_exit_code && !native {
            with_exit_status(command)
        } else {
            command.to_string()
        };

        tracing::debug!(host = %self.config.host, command, "executing");
        let run = connected.connection.execute(&text);
        let raw = match self.config.command_timeout {
            Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
                Error::CommandTimeout {
                    host: self.config.host.clone(),
                    command: command.to_string(),
                    timeout,
                }
            })?,
            None => run.await,
        }?;
        drop(state);

        self.interpret(command, raw, want_exit_code, native)
    }

    /// Execute commands in order; a failure is recorded at its index and the batch continues.
    pub async fn execute_batch<S: AsRef<str>>(
        &self,
        commands: &[S],
        want_exit_code: bool,
    ) -> Vec<Result<CommandResult>> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.execute(command.as_ref(), want_exit_code).await);
        }
        results
    }

    /// The stat channel of the current connection, opened on first use.
    pub(crate) async fn stat_channel(&self) -> Result<Arc<dyn StatChannel>> {
        let mut state = self.state.lock().await;
        let connected = self.connection(&mut state).await?;
        if let Some(stat) = &connected.stat {
            return Ok(Arc::clone(stat));
        }
        let stat = connected.connection.open_stat_channel().await?;
        connected.stat = Some(Arc::clone(&stat));
        Ok(stat)
    }

    fn interpret(
        &self,
        command: &str,
        raw: RawOutput,
        want_exit_code: bool,
        native: bool,
    ) -> Result<CommandResult> {
        let stderr = raw.stderr.trim();
        if !stderr.is_empty() {
            return Err(self.execution_error(command, stderr));
        }

        let (stdout, exit_code) = match (want_exit_code, native) {
            (false, _) => (raw.stdout.as_str(), None),
            (true, true) => match (raw.exit_status, &raw.exit_signal) {
                (Some(status), _) => (raw.stdout.as_str(), Some(status)),
                (None, Some(signal)) => {
                    let reason = format!("terminated by signal {signal}");
                    return Err(self.execution_error(command, &reason));
                }
                (None, None) => {
                    return Err(self.execution_error(command, "no exit status reported"));
                }
            },
            (true, false) => {
                let (stdout, status) = split_exit_status(&raw.stdout)
                    .ok_or_else(|| self.execution_error(command, "no exit status reported"))?;
                (stdout, Some(status))
            }
        };

        let lines = stdout.lines().map(|line| line.trim().to_string()).collect();
        Ok(CommandResult { lines, exit_code })
    }

    fn execution_error(&self, command: &str, stderr: &str) -> Error {
        Error::Execution {
            host: self.config.host.clone(),
            command: command.to_string(),
            stderr: stderr.to_string(),
        }
    }

    async fn connection<'a>(&self, state: &'a mut Option<Connected>) -> Result<&'a mut Connected> {
        match state {
            Some(connected) => Ok(connected),
            slot @ None => Ok(slot.insert(self.establish().await?)),
        }
    }

    async fn establish(&self) -> Result<Connected> {
        let host = self.config.host.as_str();
        let port = self.config.port;

        let credential = self.config.credential.as_ref().ok_or_else(|| {
            Error::Configuration(format!("no credential configured for {}:{}", host, port))
        })?;

        tracing::debug!(host, port, "connecting");
        let mut connection =
            self.transport
                .connect(host, port)
                .await
                .map_err(|e| Error::Connection {
                    host: host.to_string(),
                    port,
                    reason: e.to_string(),
                })?;

        let fingerprint = connection.fingerprint();
        let mut learn_key = false;
        if self.config.host_key_verification {
            match self.verify_host_key(fingerprint.as_deref()) {
                Ok(unknown) => learn_key = unknown,
                Err(e) => {
                    abandon(connection, host).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = credential.authenticate(&mut *connection).await {
            abandon(connection, host).await;
            return Err(match e {
                Error::Authentication { client, source, .. } => Error::Authentication {
                    client,
                    host: host.to_string(),
                    source,
                },
                other => Error::Authentication {
                    client: credential.client().unwrap_or("<unset>").to_string(),
                    host: host.to_string(),
                    source: Box::new(other),
                },
            });
        }

        tracing::debug!(host, port, "authenticated");
        if let (Some(actual), true) = (fingerprint.as_deref(), learn_key) {
            self.trust_host_key(actual);
        }
        *self.fingerprint.lock() = fingerprint;
        Ok(Connected {
            connection,
            stat: None,
        })
    }

    /// Check the live fingerprint against the registry. Returns true when the
    /// host is unknown and the key should be learned once authentication succeeds.
    fn verify_host_key(&self, fingerprint: Option<&str>) -> Result<bool> {
        let host = self.config.host.as_str();
        let port = self.config.port;

        let Some(actual) = fingerprint else {
            return Err(Error::Security {
                host: format!("{}:{}", host, port),
                expected: "a host key".to_string(),
                actual: "none presented".to_string(),
            });
        };

        match self.host_keys.lock().check(host, port, actual) {
            HostKeyCheck::Trusted => Ok(false),
            HostKeyCheck::Mismatch { expected } => {
                tracing::error!(host, port, %expected, actual, "host key mismatch");
                Err(Error::Security {
                    host: format!("{}:{}", host, port),
                    expected,
                    actual: actual.to_string(),
                })
            }
            HostKeyCheck::Unknown => Ok(true),
        }
    }

    fn trust_host_key(&self, fingerprint: &str) {
        let host = self.config.host.as_str();
        let port = self.config.port;

        tracing::warn!(
            "Trust-On-First-Use: accepting unknown host key for {}:{}",
            host,
            port
        );
        let mut registry = self.host_keys.lock();
        if !registry.trust(host, port, fingerprint) {
            return;
        }
        if let Some(path) = &self.config.host_key_file {
            if let Err(e) = registry.save(path) {
                tracing::warn!("Failed to save host key to {}: {}", path.display(), e);
            }
        }
    }
}

const EXIT_STATUS_MARKER: &str = "__shellfs_exit_status__";

/// Wrap `command` so its exit status follows the output on a marked line.
///
/// The subshell keeps `exit` inside `command` from ending the outer shell.
pub fn with_exit_status(command: &str) -> String {
    format!("( {command} ); printf '\\n{EXIT_STATUS_MARKER}%s\\n' \"$?\"")
}

/// Split output produced by [`with_exit_status`] into the command's own
/// output and its status.
fn split_exit_status(stdout: &str) -> Option<(&str, u32)> {
    let marker = format!("\n{EXIT_STATUS_MARKER}");
    let at = stdout.rfind(&marker)?;
    let status = stdout[at + marker.len()..].trim().parse().ok()?;
    Some((&stdout[..at], status))
}

/// Drop a connection that never reached the connected state.
async fn abandon(mut connection: Box<dyn Connection>, host: &str) {
    if let Err(e) = connection.disconnect().await {
        tracing::debug!(host, error = %e, "failed to close abandoned connection");
    }
}

async fn teardown(mut connected: Connected) -> Result<()> {
    if let Some(stat) = connected.stat.take() {
        if let Err(e) = stat.close().await {
            tracing::warn!("Failed to close stat channel: {}", e);
        }
    }
    connected.connection.disconnect().await?;
    Ok(())
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(connected) = self.state.get_mut().take() else {
            return;
        };
        let host = self.config.host.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = teardown(connected).await {
                        tracing::warn!(host, "Failed to disconnect on drop: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::debug!(host, "no runtime on drop; closing connection without goodbye");
            }
        }
    }
}
