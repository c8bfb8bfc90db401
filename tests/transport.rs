// ABOUTME: Integration tests for the russh transport that need no SSH server.
// ABOUTME: Exercises connection failures against a closed loopback port.

mod support;

use shellfs::Error;
use shellfs::auth::Password;
use shellfs::session::{Session, SessionConfig};
use shellfs::transport::{RusshTransport, Transport, TransportError};
use std::time::Duration;

/// A loopback port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    support::init_tracing();
    let transport = RusshTransport::new().inactivity_timeout(Some(Duration::from_secs(5)));

    let result = transport.connect("127.0.0.1", closed_port()).await;

    match result {
        Err(TransportError::Connect(reason)) => assert!(!reason.is_empty()),
        Err(other) => panic!("expected connect error, got {other:?}"),
        Ok(_) => panic!("expected connect error, got a connection"),
    }
}

#[tokio::test]
async fn session_reports_connection_error_with_host_and_port() {
    support::init_tracing();
    let port = closed_port();
    let config = SessionConfig::new("127.0.0.1")
        .port(port)
        .credential(Password::new("nobody", "nothing"));
    let session = Session::new(config);

    let err = session.connect().await.unwrap_err();

    match err {
        Error::Connection { host, port: p, .. } => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(p, port);
        }
        other => panic!("expected connection error, got {other:?}"),
    }
    assert!(!session.is_connected().await);
    assert_eq!(session.fingerprint(), None);
}
