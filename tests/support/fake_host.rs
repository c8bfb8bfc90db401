// ABOUTME: In-memory remote host implementing the transport traits.
// ABOUTME: Runs the shell commands the file system issues and serves an SFTP-like stat channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use shellfs::transport::{
    Connection, FileStat, RawOutput, S_IFDIR, StatChannel, Transport, TransportError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub const FINGERPRINT: &str = "SHA256:fake-host-key";
pub const HOME: &str = "/home/test";
pub const FILE_MODE: u32 = 0o100644;
pub const DIR_MODE: u32 = S_IFDIR | 0o755;

const STATUS_MARKER: &str = "__shellfs_exit_status__";
const EXIT_SUFFIX: &str = " ); printf '\\n__shellfs_exit_status__%s\\n' \"$?\"";

#[derive(Debug, Clone)]
pub struct Entry {
    pub mode: u32,
    pub size: Option<u64>,
    pub mtime: Option<u64>,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn dir() -> Self {
        Entry {
            mode: DIR_MODE,
            size: Some(4096),
            mtime: Some(1_700_000_000),
            data: Vec::new(),
        }
    }

    pub fn file(contents: &[u8]) -> Self {
        Entry {
            mode: FILE_MODE,
            size: Some(contents.len() as u64),
            mtime: Some(1_700_000_000),
            data: contents.to_vec(),
        }
    }

    fn is_dir(&self) -> bool {
        self.mode & 0o170000 == S_IFDIR
    }
}

struct HostState {
    fingerprint: Option<String>,
    passwords: HashMap<String, String>,
    key_users: HashSet<String>,
    native_exit_status: bool,
    refuse_connections: bool,
    command_delay: Option<Duration>,
    cwd: String,
    entries: BTreeMap<String, Entry>,
    failures: Vec<(String, u32)>,
    executed: Vec<String>,
    connects: usize,
    disconnects: usize,
    stat_channels: usize,
    stat_closes: usize,
}

/// Shared handle to the fake host; clones observe the same state.
#[derive(Clone)]
pub struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

#[allow(dead_code)]
impl FakeHost {
    /// Host with `/home/test` as working directory and user `test`/`secret`.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), Entry::dir());
        entries.insert("/home".to_string(), Entry::dir());
        entries.insert(HOME.to_string(), Entry::dir());

        let mut passwords = HashMap::new();
        passwords.insert("test".to_string(), "secret".to_string());

        FakeHost {
            state: Arc::new(Mutex::new(HostState {
                fingerprint: Some(FINGERPRINT.to_string()),
                passwords,
                key_users: HashSet::new(),
                native_exit_status: true,
                refuse_connections: false,
                command_delay: None,
                cwd: HOME.to_string(),
                entries,
                failures: Vec::new(),
                executed: Vec::new(),
                connects: 0,
                disconnects: 0,
                stat_channels: 0,
                stat_closes: 0,
            })),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn fingerprint(self, fingerprint: Option<&str>) -> Self {
        self.state.lock().fingerprint = fingerprint.map(str::to_string);
        self
    }

    pub fn key_user(self, user: &str) -> Self {
        self.state.lock().key_users.insert(user.to_string());
        self
    }

    /// Report exit statuses only through the command's own output.
    pub fn without_exit_status(self) -> Self {
        self.state.lock().native_exit_status = false;
        self
    }

    pub fn refuse_connections(self) -> Self {
        self.state.lock().refuse_connections = true;
        self
    }

    pub fn command_delay(self, delay: Duration) -> Self {
        self.state.lock().command_delay = Some(delay);
        self
    }

    /// Make every command starting with `prefix` exit with `status`.
    pub fn fail_command(self, prefix: &str, status: u32) -> Self {
        self.state.lock().failures.push((prefix.to_string(), status));
        self
    }

    pub fn dir(self, path: &str) -> Self {
        self.entry(path, Entry::dir())
    }

    pub fn file(self, path: &str, contents: &[u8]) -> Self {
        self.entry(path, Entry::file(contents))
    }

    pub fn entry(self, path: &str, entry: Entry) -> Self {
        self.state.lock().entries.insert(absolute(path), entry);
        self
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().entries.contains_key(&absolute(path))
    }

    pub fn get(&self, path: &str) -> Option<Entry> {
        self.state.lock().entries.get(&absolute(path)).cloned()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn stat_channels(&self) -> usize {
        self.state.lock().stat_channels
    }

    pub fn stat_closes(&self) -> usize {
        self.state.lock().stat_closes
    }
}

fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", HOME, path)
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn is_child_of(path: &str, dir: &str) -> bool {
    path != dir && parent_of(path) == Some(dir)
}

fn is_within(path: &str, dir: &str) -> bool {
    path == dir || path.starts_with(&format!("{}/", dir.trim_end_matches('/')))
}

/// Split a command line into words, honouring single quotes and backslashes.
fn words(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        if quoted {
            if c == '\'' {
                quoted = false;
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '\'' => {
                quoted = true;
                in_word = true;
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

struct Outcome {
    stdout: String,
    stderr: String,
    status: u32,
    signal: Option<String>,
}

impl Outcome {
    fn ok(stdout: impl Into<String>) -> Self {
        Outcome {
            stdout: stdout.into(),
            stderr: String::new(),
            status: 0,
            signal: None,
        }
    }

    fn fail(stderr: impl Into<String>, status: u32) -> Self {
        Outcome {
            stdout: String::new(),
            stderr: stderr.into(),
            status,
            signal: None,
        }
    }

    /// Killed by `signal`; a shell reports this as status 128 + signal number.
    fn killed(signal: &str) -> Self {
        Outcome {
            stdout: String::new(),
            stderr: String::new(),
            status: 137,
            signal: Some(signal.to_string()),
        }
    }
}

impl HostState {
    fn run(&mut self, command: &str) -> Outcome {
        if let Some((_, status)) = self
            .failures
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            return Outcome::fail("", *status);
        }

        let argv = words(command);
        let args: Vec<&str> = argv.iter().map(String::as_str).collect();
        match args.as_slice() {
            [] | ["true"] => Outcome::ok(""),
            ["false"] => Outcome::fail("", 1),
            ["pwd"] => Outcome::ok(format!("{}\n", self.cwd)),
            ["exit", code] => Outcome::fail("", code.parse().unwrap_or(2)),
            ["echo", rest @ .., ">&2"] => Outcome::fail(format!("{}\n", rest.join(" ")), 0),
            ["echo", rest @ ..] => Outcome::ok(format!("{}\n", rest.join(" "))),
            ["printf", rest @ ..] => Outcome::ok(rest.join(" ")),
            ["kill", signal, "$$"] => Outcome::killed(signal.trim_start_matches('-')),
            ["chmod", mode, path] => self.chmod(mode, path),
            ["rm", "-rf", path] => {
                let target = absolute(path);
                self.entries.retain(|p, _| !is_within(p, &target));
                Outcome::ok("")
            }
            ["ls", "-1Ap", path] => self.ls(path),
            [program, ..] => Outcome::fail(format!("sh: {}: command not found\n", program), 127),
        }
    }

    fn chmod(&mut self, mode: &str, path: &str) -> Outcome {
        let Ok(bits) = u32::from_str_radix(mode, 8) else {
            return Outcome::fail(format!("chmod: invalid mode: '{}'\n", mode), 1);
        };
        match self.entries.get_mut(&absolute(path)) {
            Some(entry) => {
                entry.mode = (entry.mode & 0o170000) | bits;
                Outcome::ok("")
            }
            None => Outcome::fail(
                format!("chmod: cannot access '{}': No such file or directory\n", path),
                1,
            ),
        }
    }

    fn ls(&self, path: &str) -> Outcome {
        let dir = absolute(path);
        match self.entries.get(&dir) {
            Some(entry) if entry.is_dir() => {
                let listing: String = self
                    .entries
                    .iter()
                    .filter(|(p, _)| is_child_of(p, &dir))
                    .map(|(p, e)| {
                        let name = p.rsplit('/').next().unwrap_or_default();
                        if e.is_dir() {
                            format!("{}/\n", name)
                        } else {
                            format!("{}\n", name)
                        }
                    })
                    .collect();
                Outcome::ok(listing)
            }
            Some(_) => Outcome::ok(format!("{}\n", dir)),
            None => Outcome::fail(
                format!("ls: cannot access '{}': No such file or directory\n", path),
                2,
            ),
        }
    }
}

#[async_trait]
impl Transport for FakeHost {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Connection>, TransportError> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(TransportError::Connect(format!(
                "{}:{}: Connection refused",
                host, port
            )));
        }
        state.connects += 1;
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<HostState>>,
}

#[async_trait]
impl Connection for FakeConnection {
    fn fingerprint(&self) -> Option<String> {
        self.state.lock().fingerprint.clone()
    }

    fn reports_exit_status(&self) -> bool {
        self.state.lock().native_exit_status
    }

    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<bool, TransportError> {
        let state = self.state.lock();
        Ok(state.passwords.get(user).is_some_and(|p| p == password))
    }

    async fn authenticate_keypair(
        &mut self,
        user: &str,
        _public_key: &Path,
        private_key: &Path,
        _passphrase: Option<&str>,
    ) -> Result<bool, TransportError> {
        if !private_key.exists() {
            return Err(TransportError::KeyLoadFailed {
                path: private_key.to_path_buf(),
                reason: "No such file or directory".to_string(),
            });
        }
        Ok(self.state.lock().key_users.contains(user))
    }

    async fn execute(&self, command: &str) -> Result<RawOutput, TransportError> {
        let delay = self.state.lock().command_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.executed.push(command.to_string());

        if state.native_exit_status {
            let outcome = state.run(command);
            let exit_status = match outcome.signal {
                Some(_) => None,
                None => Some(outcome.status),
            };
            return Ok(RawOutput {
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exit_status,
                exit_signal: outcome.signal,
            });
        }

        let wrapped = command
            .strip_prefix("( ")
            .and_then(|rest| rest.strip_suffix(EXIT_SUFFIX));
        let outcome = match wrapped {
            Some(inner) => {
                let mut outcome = state.run(inner);
                let status_line = format!("\n{}{}\n", STATUS_MARKER, outcome.status);
                outcome.stdout.push_str(&status_line);
                outcome
            }
            None => state.run(command),
        };
        Ok(RawOutput {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_status: None,
            exit_signal: None,
        })
    }

    async fn open_stat_channel(&self) -> Result<Arc<dyn StatChannel>, TransportError> {
        self.state.lock().stat_channels += 1;
        Ok(Arc::new(FakeStatChannel {
            state: Arc::clone(&self.state),
        }))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state.lock().disconnects += 1;
        Ok(())
    }
}

struct FakeStatChannel {
    state: Arc<Mutex<HostState>>,
}

#[async_trait]
impl StatChannel for FakeStatChannel {
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, TransportError> {
        Ok(self.state.lock().entries.get(path).map(|e| FileStat {
            mode: e.mode,
            size: e.size,
            mtime: e.mtime,
        }))
    }

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(p) = current {
            if state.entries.contains_key(p) {
                break;
            }
            missing.push(p.to_string());
            current = parent_of(p);
        }
        if missing.len() > 1 && !recursive {
            return Err(TransportError::Other(format!("{}: no such directory", path)));
        }
        for p in missing {
            state.entries.insert(
                p,
                Entry {
                    mode: S_IFDIR | mode,
                    ..Entry::dir()
                },
            );
        }
        Ok(())
    }

    async fn reader(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, TransportError> {
        match self.state.lock().entries.get(path) {
            Some(entry) if !entry.is_dir() => Ok(Box::new(Cursor::new(entry.data.clone()))),
            _ => Err(TransportError::Other(format!("{}: no such file", path))),
        }
    }

    async fn writer(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError> {
        let state = self.state.lock();
        let parent_is_dir = parent_of(path)
            .and_then(|p| state.entries.get(p))
            .is_some_and(Entry::is_dir);
        if !parent_is_dir {
            return Err(TransportError::Other(format!("{}: no such directory", path)));
        }
        Ok(Box::new(FakeWriter {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.lock().stat_closes += 1;
        Ok(())
    }
}

/// Buffers writes and stores the file on shutdown.
struct FakeWriter {
    state: Arc<Mutex<HostState>>,
    path: String,
    buffer: Vec<u8>,
}

impl AsyncWrite for FakeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let entry = Entry::file(&self.buffer);
        self.state.lock().entries.insert(self.path.clone(), entry);
        Poll::Ready(Ok(()))
    }
}
