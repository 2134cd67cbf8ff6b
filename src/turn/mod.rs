//! UDP relay negotiation.
//!
//! Native implementation of [`RelayNegotiator`]: for every `turn:` URL of the
//! ICE server it sends an unauthenticated TURN Allocate request over UDP and
//! reports the relay's error response as a candidate error. A healthy relay
//! answers with 401 (authentication challenge), which is all the probe needs.
//! Hosts that cannot be resolved or reached are reported with code 701, as a
//! browser's candidate gathering would.

pub mod stun;

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use futures::future::join_all;
use log::{debug, trace};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{STUN_RETRANSMIT_INTERVAL, TURN_PORT, UNREACHABLE_ERROR_CODE};
use crate::error_handling::NegotiationError;
use crate::probe::{CandidateError, Negotiation, RelayNegotiator};
use crate::registry::IceServer;

/// Splits `turn:<host>[:<port>][?transport=udp]` into host and port.
///
/// IPv6 hosts must be bracketed. The port defaults to 3478.
pub fn parse_turn_url(url: &str) -> Option<(String, u16)> {
    let rest = url.strip_prefix("turn:")?;
    let rest = rest.split('?').next().unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }

    if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None if after.is_empty() => TURN_PORT,
            None => return None,
        };
        return Some((host.to_string(), port));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Some((host.to_string(), port.parse().ok()?)),
        Some(_) => None,
        None => Some((rest.to_string(), TURN_PORT)),
    }
}

#[derive(Debug, Clone)]
struct RelayAddr {
    url: String,
    host: String,
    port: u16,
}

/// Opens UDP negotiation sessions on the current Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpRelayNegotiator;

impl UdpRelayNegotiator {
    pub fn new() -> Self {
        Self
    }
}

impl RelayNegotiator for UdpRelayNegotiator {
    type Session = UdpNegotiation;

    fn open(&self, server: &IceServer) -> Result<UdpNegotiation, NegotiationError> {
        let runtime =
            Handle::try_current().map_err(|e| NegotiationError::Unsupported(e.to_string()))?;
        if server.urls.is_empty() {
            return Err(NegotiationError::NoServerUrls);
        }
        let relays = server
            .urls
            .iter()
            .map(|url| {
                parse_turn_url(url)
                    .map(|(host, port)| RelayAddr {
                        url: url.clone(),
                        host,
                        port,
                    })
                    .ok_or_else(|| NegotiationError::InvalidServerUrl(url.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UdpNegotiation {
            runtime,
            relays,
            data_channels: Vec::new(),
            gathering: None,
        })
    }
}

/// One UDP negotiation session; gathering runs on a spawned task.
pub struct UdpNegotiation {
    runtime: Handle,
    relays: Vec<RelayAddr>,
    data_channels: Vec<String>,
    gathering: Option<JoinHandle<()>>,
}

impl Negotiation for UdpNegotiation {
    fn create_data_channel(&mut self, label: &str) {
        self.data_channels.push(label.to_string());
    }

    fn start_gathering(&mut self) -> mpsc::UnboundedReceiver<CandidateError> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.data_channels.is_empty() {
            debug!("No data channel open; nothing to gather");
            return rx;
        }

        let relays = self.relays.clone();
        self.gathering = Some(self.runtime.spawn(async move {
            join_all(relays.into_iter().map(|relay| gather(relay, tx.clone()))).await;
        }));
        rx
    }

    fn close(&mut self) {
        if let Some(task) = self.gathering.take() {
            task.abort();
        }
    }
}

impl Drop for UdpNegotiation {
    fn drop(&mut self) {
        self.close();
    }
}

async fn gather(relay: RelayAddr, tx: mpsc::UnboundedSender<CandidateError>) {
    let candidate_error = match request_allocation(&relay).await {
        Ok(Some(error)) => CandidateError {
            url: relay.url,
            error_code: error.code,
            error_text: error.reason,
        },
        Ok(None) => {
            debug!("{} granted an unauthenticated allocation", relay.url);
            return;
        }
        Err(e) => CandidateError {
            url: relay.url,
            error_code: UNREACHABLE_ERROR_CODE,
            error_text: e.to_string(),
        },
    };
    // The receiver is gone once the race has been decided
    let _ = tx.send(candidate_error);
}

/// Sends Allocate until the relay answers; `Ok(None)` means it granted one.
async fn request_allocation(relay: &RelayAddr) -> io::Result<Option<stun::ErrorCode>> {
    let addr = tokio::net::lookup_host((relay.host.as_str(), relay.port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"))?;

    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;

    let transaction_id = stun::new_transaction_id();
    let request = stun::encode_allocate_request(&transaction_id);
    let mut buf = [0u8; 1500];
    let mut retransmit = tokio::time::interval(STUN_RETRANSMIT_INTERVAL);

    loop {
        tokio::select! {
            _ = retransmit.tick() => {
                trace!("Allocate -> {}", addr);
                socket.send(&request).await?;
            }
            received = socket.recv(&mut buf) => {
                let len = received?;
                match stun::decode(&buf[..len]) {
                    Ok(message)
                        if message.transaction_id == transaction_id
                            && message.method == stun::METHOD_ALLOCATE =>
                    {
                        match message.class {
                            stun::MessageClass::ErrorResponse => {
                                return Ok(Some(message.error_code.unwrap_or(stun::ErrorCode {
                                    code: 0,
                                    reason: "error response without ERROR-CODE".into(),
                                })));
                            }
                            stun::MessageClass::SuccessResponse => return Ok(None),
                            _ => {}
                        }
                    }
                    Ok(_) => debug!("Ignoring unrelated STUN message from {}", addr),
                    Err(e) => debug!("Discarding datagram from {}: {}", addr, e),
                }
            }
        }
    }
}
