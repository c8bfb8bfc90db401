// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and session helpers over the in-memory fake host.

use shellfs::auth::Password;
use shellfs::session::{HostKeyRegistry, Session, SessionConfig};
use shellfs::RemoteFileSystem;
use std::sync::{Arc, Once};

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_host;

pub use fake_host::FakeHost;

pub const HOST: &str = "fake.example";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("shellfs=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Session config for the fake host with the password it accepts.
#[allow(dead_code)]
pub fn config() -> SessionConfig {
    SessionConfig::new(HOST)
        .port(22)
        .credential(Password::new("test", "secret"))
        .host_keys(HostKeyRegistry::default())
}

#[allow(dead_code)]
pub fn session(host: &FakeHost) -> Arc<Session> {
    init_tracing();
    Arc::new(Session::with_transport(config(), host.transport()))
}

#[allow(dead_code)]
pub fn file_system(host: &FakeHost) -> Arc<RemoteFileSystem> {
    RemoteFileSystem::new(session(host))
}
