//! Peer call interface with bounded-retry wrappers

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::messages::{Envelope, GetTransactions, TransactionsResponse};
use crate::peers::PeerId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{error, info, warn};

/// Raw peer call surface provided by the surrounding node
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// One-way publish to a peer
    async fn post(&self, peer: &PeerId, payload: Vec<u8>) -> Result<()>;

    /// Request/response call to a peer
    async fn fetch(&self, peer: &PeerId, payload: Vec<u8>) -> Result<Vec<u8>>;
}

/// Publish with exponential backoff retry
pub async fn post_with_retry(
    client: &dyn PeerClient,
    peer: &PeerId,
    payload: Vec<u8>,
    config: &TransportConfig,
) -> Result<()> {
    with_retry(peer, config, || {
        Box::pin(client.post(peer, payload.clone()))
    })
    .await
}

/// Fetch a peer's mergeable transactions with exponential backoff retry
pub async fn fetch_transactions(
    client: &dyn PeerClient,
    peer: &PeerId,
    config: &TransportConfig,
) -> Result<TransactionsResponse> {
    let request = Envelope::Get(GetTransactions).to_bytes()?;
    let raw = with_retry(peer, config, || {
        Box::pin(client.fetch(peer, request.clone()))
    })
    .await?;

    match Envelope::from_bytes(&raw)? {
        Envelope::Transactions(response) => Ok(response),
        other => Err(Error::Peer(format!(
            "unexpected reply to transaction fetch: {:?}",
            other
        ))),
    }
}

/// Run a peer call with per-attempt timeout and exponential backoff
///
/// Operational policy: bounded attempts, then the caller abandons the peer
/// for this tick.
async fn with_retry<'a, T>(
    peer: &'a PeerId,
    config: &'a TransportConfig,
    mut call: impl FnMut() -> BoxFuture<'a, Result<T>>,
) -> Result<T> {
    let mut attempts = 0;
    let mut delay = Duration::from_millis(config.initial_retry_delay_ms);

    loop {
        attempts += 1;

        let outcome = match tokio::time::timeout(
            Duration::from_millis(config.fetch_timeout_ms),
            call(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(config.fetch_timeout_ms)),
        };

        match outcome {
            Ok(value) => {
                if attempts > 1 {
                    info!("peer {} call succeeded after {} attempts", peer, attempts);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempts >= config.max_retry_attempts {
                    error!(
                        "giving up on peer {} after {} attempts: {}",
                        peer, attempts, e
                    );
                    return Err(e);
                }

                warn!(
                    "peer {} call failed (attempt {}), retrying in {:?}: {}",
                    peer, attempts, delay, e
                );
                tokio::time::sleep(delay).await;

                // Exponential backoff
                delay = (delay * 2).min(Duration::from_millis(config.max_retry_delay_ms));
            }
        }
    }
}
