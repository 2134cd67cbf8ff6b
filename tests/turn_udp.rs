//! UDP negotiation against a fake relay on localhost.

use std::time::Duration;

use readiness_check::config::{AUTH_CHALLENGE_ERROR_CODE, UNREACHABLE_ERROR_CODE};
use readiness_check::probe::{Negotiation, RelayNegotiator};
use readiness_check::registry::IceServer;
use readiness_check::turn::{stun, UdpRelayNegotiator};
use tokio::net::UdpSocket;

fn ice_server(url: String) -> IceServer {
    IceServer {
        urls: vec![url],
        username: "test".into(),
        credential: "test".into(),
    }
}

/// Answers every Allocate request with a 401 challenge. Returns the relay URL.
async fn spawn_challenging_relay() -> String {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(request) = stun::decode(&buf[..len]) else {
                continue;
            };
            assert_eq!(request.class, stun::MessageClass::Request);
            assert_eq!(request.method, stun::METHOD_ALLOCATE);
            let response = stun::encode_allocate_error(
                &request.transaction_id,
                401,
                "Unauthorized",
                Some("example.org"),
                Some("nonce-123"),
            );
            let _ = socket.send_to(&response, peer).await;
        }
    });
    format!("turn:127.0.0.1:{}", addr.port())
}

#[tokio::test]
async fn test_challenge_surfaces_as_401_candidate_error() {
    let url = spawn_challenging_relay().await;
    let mut session = UdpRelayNegotiator::new()
        .open(&ice_server(url.clone()))
        .expect("session opens inside a runtime");
    session.create_data_channel("");

    let mut errors = session.start_gathering();
    let candidate_error = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .expect("relay answers quickly")
        .expect("a candidate error arrives");

    assert_eq!(candidate_error.error_code, AUTH_CHALLENGE_ERROR_CODE);
    assert_eq!(candidate_error.url, url);
    assert_eq!(candidate_error.error_text, "Unauthorized");
    session.close();
}

#[tokio::test]
async fn test_silent_relay_produces_nothing_and_close_ends_gathering() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let url = format!("turn:127.0.0.1:{}", silent.local_addr().unwrap().port());

    let mut session = UdpRelayNegotiator::new()
        .open(&ice_server(url))
        .unwrap();
    session.create_data_channel("");
    let mut errors = session.start_gathering();

    let waited = tokio::time::timeout(Duration::from_millis(600), errors.recv()).await;
    assert!(waited.is_err(), "silent relay must not produce a candidate error");

    session.close();
    let after_close = tokio::time::timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("channel closes once gathering is aborted");
    assert!(after_close.is_none());
}

#[tokio::test]
async fn test_unresolvable_host_reports_unreachable() {
    let mut session = UdpRelayNegotiator::new()
        .open(&ice_server("turn:relay.invalid:3478".into()))
        .unwrap();
    session.create_data_channel("");
    let mut errors = session.start_gathering();

    let candidate_error = tokio::time::timeout(Duration::from_secs(10), errors.recv())
        .await
        .expect("resolution fails promptly")
        .expect("a candidate error arrives");
    assert_eq!(candidate_error.error_code, UNREACHABLE_ERROR_CODE);
}
