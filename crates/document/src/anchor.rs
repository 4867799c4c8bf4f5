//! External anchoring of document content hashes.
//!
//! An anchor is a reference to a tamper-resistant external record (for
//! example a ledger transaction) of a content hash. The anchor network is an
//! external collaborator reached through [`AnchorClient`]; [`AnchorService`]
//! wraps it with:
//!
//! - **Idempotency**: the content hash is the idempotency key. Resubmitting a
//!   hash returns the existing [`AnchorRef`]. The local map is only written
//!   after a submit completes, so a cancelled submission leaves no partial
//!   reference behind and can simply be retried.
//! - **Retry**: transient failures back off exponentially per [`RetryConfig`].
//! - **Bounded waits**: a whole submission is bounded by a timeout and
//!   reported as [`AnchorError::Pending`]; confirmations are bounded and fail
//!   closed to [`AnchorConfirmation::Unavailable`].
//!
//! Anchoring never affects document validity; it only feeds the
//! `blockchain_verified` check.
//!
//! [`RetryConfig`]: custodia_core::RetryConfig

use async_trait::async_trait;
use custodia_core::{AnchorConfig, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Reference to an anchored content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub network: String,
    pub tx_id: String,
    /// Block that included the transaction, once known
    pub block_number: Option<u64>,
    /// Hex BLAKE3 content hash that was anchored
    pub content_hash: String,
    pub anchored_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// Retryable I/O failure reported by the client
    #[error("Transient anchor failure: {0}")]
    Transient(String),

    /// The anchor network refused the submission
    #[error("Anchor submission rejected: {0}")]
    Rejected(String),

    /// Timed out; the submission may still land and is safe to resubmit
    #[error("Anchor submission pending for content hash {content_hash}")]
    Pending { content_hash: String },

    /// Retries exhausted
    #[error("Anchor service unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
}

/// Outcome of looking an anchor up on its network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorConfirmation {
    Confirmed { block_number: u64 },
    /// The network does not (yet) know the transaction
    Unconfirmed,
    /// Lookup failed or timed out; treat as not verified
    Unavailable { reason: String },
}

/// Client for an external anchor network.
///
/// `submit` must itself be idempotent on `content_hash`.
#[async_trait]
pub trait AnchorClient: Send + Sync {
    fn network(&self) -> &str;

    async fn submit(&self, content_hash: &str) -> Result<AnchorRef, AnchorError>;

    /// Block number of a transaction, `None` if unknown or not yet mined.
    async fn confirm(&self, tx_id: &str) -> Result<Option<u64>, AnchorError>;
}

/// Idempotent, retrying, time-bounded front for an [`AnchorClient`].
pub struct AnchorService {
    client: Arc<dyn AnchorClient>,
    config: AnchorConfig,
    anchored: RwLock<HashMap<String, AnchorRef>>,
}

impl AnchorService {
    pub fn new(client: Arc<dyn AnchorClient>, config: AnchorConfig) -> Self {
        Self {
            client,
            config,
            anchored: RwLock::new(HashMap::new()),
        }
    }

    pub fn network(&self) -> &str {
        self.client.network()
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Anchor a hex content hash using the configured submit timeout.
    pub async fn anchor_hash(&self, content_hash: &str) -> Result<AnchorRef, AnchorError> {
        let timeout = Duration::from_millis(self.config.submit_timeout_ms);
        self.anchor_hash_with_timeout(content_hash, timeout).await
    }

    /// Anchor a hex content hash, giving up after `timeout`.
    pub async fn anchor_hash_with_timeout(
        &self,
        content_hash: &str,
        timeout: Duration,
    ) -> Result<AnchorRef, AnchorError> {
        if let Some(existing) = self.lookup(content_hash).await {
            debug!(content_hash = %content_hash, tx_id = %existing.tx_id, "Anchor already recorded");
            return Ok(existing);
        }

        match tokio::time::timeout(timeout, self.submit_with_retry(content_hash)).await {
            Ok(Ok(anchor)) => {
                let mut anchored = self.anchored.write().await;
                // A concurrent submit for the same hash may have landed first
                let recorded = anchored
                    .entry(content_hash.to_string())
                    .or_insert(anchor)
                    .clone();
                info!(
                    content_hash = %content_hash,
                    network = %recorded.network,
                    tx_id = %recorded.tx_id,
                    "Content hash anchored"
                );
                Ok(recorded)
            }
            Ok(Err(e)) => {
                warn!(content_hash = %content_hash, error = %e, "Anchor submission failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    content_hash = %content_hash,
                    timeout_ms = timeout.as_millis() as u64,
                    "Anchor submission timed out, treating as pending"
                );
                Err(AnchorError::Pending {
                    content_hash: content_hash.to_string(),
                })
            }
        }
    }

    async fn submit_with_retry(&self, content_hash: &str) -> Result<AnchorRef, AnchorError> {
        let retry = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            match self.client.submit(content_hash).await {
                Ok(anchor) => return Ok(anchor),
                Err(AnchorError::Transient(reason)) if attempt < retry.max_retries => {
                    let delay_ms = retry.delay_for(attempt);
                    warn!(
                        content_hash = %content_hash,
                        attempt = attempt + 1,
                        delay_ms,
                        reason = %reason,
                        "Transient anchor failure, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(AnchorError::Transient(reason)) => {
                    return Err(AnchorError::Unavailable {
                        attempts: attempt + 1,
                        reason,
                    })
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Previously recorded anchor for a content hash.
    pub async fn lookup(&self, content_hash: &str) -> Option<AnchorRef> {
        self.anchored.read().await.get(content_hash).cloned()
    }

    /// Confirm an anchor using the configured confirm timeout.
    pub async fn confirm(&self, anchor: &AnchorRef) -> AnchorConfirmation {
        let timeout = Duration::from_millis(self.config.confirm_timeout_ms);
        self.confirm_with_timeout(anchor, timeout).await
    }

    /// Look an anchor up on its network. Never blocks past `timeout`.
    pub async fn confirm_with_timeout(
        &self,
        anchor: &AnchorRef,
        timeout: Duration,
    ) -> AnchorConfirmation {
        if anchor.network != self.client.network() {
            return AnchorConfirmation::Unavailable {
                reason: format!(
                    "anchor is on network '{}', client serves '{}'",
                    anchor.network,
                    self.client.network()
                ),
            };
        }

        match tokio::time::timeout(timeout, self.client.confirm(&anchor.tx_id)).await {
            Ok(Ok(Some(block_number))) => AnchorConfirmation::Confirmed { block_number },
            Ok(Ok(None)) => AnchorConfirmation::Unconfirmed,
            Ok(Err(e)) => AnchorConfirmation::Unavailable {
                reason: e.to_string(),
            },
            Err(_) => {
                warn!(tx_id = %anchor.tx_id, "Anchor confirmation timed out");
                AnchorConfirmation::Unavailable {
                    reason: "confirmation timed out".to_string(),
                }
            }
        }
    }
}

#[derive(Default)]
struct InMemoryLedger {
    by_hash: HashMap<String, AnchorRef>,
    blocks: HashMap<String, u64>,
    next_block: u64,
    pending_failures: u32,
    submit_calls: u64,
}

/// In-process anchor network for development and tests.
///
/// Idempotent by content hash, mines every submission into its own block,
/// and can inject transient failures and latency.
pub struct InMemoryAnchorClient {
    network: String,
    ledger: Mutex<InMemoryLedger>,
    latency: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAnchorClient {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ledger: Mutex::new(InMemoryLedger {
                next_block: 1,
                ..InMemoryLedger::default()
            }),
            latency: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` submissions fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.lock().pending_failures = count;
    }

    /// Number of `submit` calls received, including failed ones.
    pub fn submit_calls(&self) -> u64 {
        self.lock().submit_calls
    }

    /// Number of distinct hashes anchored.
    pub fn anchored_count(&self) -> usize {
        self.lock().by_hash.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryLedger> {
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AnchorClient for InMemoryAnchorClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn submit(&self, content_hash: &str) -> Result<AnchorRef, AnchorError> {
        self.simulate_latency().await;

        let mut ledger = self.lock();
        ledger.submit_calls += 1;

        if ledger.pending_failures > 0 {
            ledger.pending_failures -= 1;
            return Err(AnchorError::Transient("simulated network failure".to_string()));
        }

        if let Some(existing) = ledger.by_hash.get(content_hash) {
            return Ok(existing.clone());
        }

        let block_number = ledger.next_block;
        ledger.next_block += 1;

        let tx_id = hex::encode(
            &blake3::hash(format!("{}:{}", self.network, content_hash).as_bytes()).as_bytes()[..16],
        );
        let anchor = AnchorRef {
            network: self.network.clone(),
            tx_id: tx_id.clone(),
            block_number: Some(block_number),
            content_hash: content_hash.to_string(),
            anchored_at: self.clock.now_ms(),
        };

        ledger.blocks.insert(tx_id, block_number);
        ledger
            .by_hash
            .insert(content_hash.to_string(), anchor.clone());
        Ok(anchor)
    }

    async fn confirm(&self, tx_id: &str) -> Result<Option<u64>, AnchorError> {
        self.simulate_latency().await;
        Ok(self.lock().blocks.get(tx_id).copied())
    }
}
