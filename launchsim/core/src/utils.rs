use std::{future::Future, net::TcpListener, time::Duration};

use anyhow::Result;
use log::debug;
use tokio_util::sync::CancellationToken;

/// Finds `count` distinct free TCP ports on the local host.
///
/// Ports are released before returning, so another process may grab them in between. This is
/// acceptable for short lived simulations.
pub fn find_available_ports(count: usize) -> Result<Vec<u16>> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind(("127.0.0.1", 0)))
        .collect::<std::io::Result<Vec<_>>>()?;

    listeners
        .iter()
        .map(|listener| Ok(listener.local_addr()?.port()))
        .collect()
}

/// Runs `operation` every `interval` until it reports success or `cancellation` fires.
///
/// Returns `false` when cancelled before the operation succeeded.
pub async fn poll_until<F, Fut>(
    operation: F,
    label: &str,
    interval: Duration,
    cancellation: &CancellationToken,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut attempts: u32 = 0;
    loop {
        let outcome = tokio::select! {
            _ = cancellation.cancelled() => return false,
            outcome = operation() => outcome,
        };

        attempts += 1;
        match outcome {
            Ok(true) => return true,
            Ok(false) => debug!("Operation {} not ready on attempt {}", label, attempts),
            Err(err) => debug!("Operation {} failed on attempt {}: {:#}", label, attempts, err),
        }

        tokio::select! {
            _ = cancellation.cancelled() => return false,
            _ = tokio::time::sleep(interval) => {},
        }
    }
}

/// (De)serializes raw bytes as a base64 string.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
