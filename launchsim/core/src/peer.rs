use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Connection descriptor of a validator node, as declared in its join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Node ID derived from the node key.
    pub id: String,
    pub connection: PeerConnection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerConnection {
    /// Directly reachable `host:port` address.
    TcpAddress(String),
    /// Node only reachable through an HTTP tunnel.
    HttpTunnel { name: String, address: String },
}

impl Peer {
    pub fn tcp<I, A>(id: I, address: A) -> Self
    where
        I: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            connection: PeerConnection::TcpAddress(address.into()),
        }
    }

    pub fn http_tunnel<I, N, A>(id: I, name: N, address: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            connection: PeerConnection::HttpTunnel {
                name: name.into(),
                address: address.into(),
            },
        }
    }

    /// Checks the shape of the connection descriptor.
    pub fn is_valid_format(&self) -> bool {
        verify_peer_format(&self.connection)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connection {
            PeerConnection::TcpAddress(address) => write!(f, "{}@{}", self.id, address),
            PeerConnection::HttpTunnel { name, address } => {
                write!(f, "{}@{} (tunnel {})", self.id, address, name)
            }
        }
    }
}

/// Returns `true` when a TCP connection is exactly `host:port` with both parts non-empty, or when
/// an HTTP tunnel carries a well-formed `http(s)` URL.
pub fn verify_peer_format(connection: &PeerConnection) -> bool {
    match connection {
        PeerConnection::TcpAddress(address) => {
            let parts: Vec<&str> = address.split(':').collect();
            parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty()
        }
        PeerConnection::HttpTunnel { address, .. } => is_http_url(address),
    }
}

fn is_http_url(address: &str) -> bool {
    match Url::parse(address) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}
