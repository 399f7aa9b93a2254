//! Prekey lifecycle management.
//!
//! A device registers with a batch of one-time prekeys plus one
//! last-resort key, then keeps the remote pool topped up for as long as
//! the session store lives. The store pushes a [`LowPrekeyNotice`] when
//! its pool runs low; the manager generates a continuation batch and
//! hands it to the publication sink. It never polls.
//!
//! The id sequence is an explicit atomic counter owned by the manager.
//! Concurrent batch generation reserves disjoint id ranges, so ids never
//! collide. Standard ids grow monotonically toward — and must never
//! reach — the reserved last-resort id.
//!
//! Generation failure is fatal and propagates: there is no safe default
//! prekey. Retry policy, if any, belongs to the caller.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use quill_core::{LowPrekeyNotice, SessionStore};
use quill_proto::{LAST_RESORT_PREKEY_ID, Prekey};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Number of prekeys generated per replenishment batch.
pub const REPLENISH_BATCH_SIZE: u16 = 8;

/// Uploading freshly generated prekeys to the remote directory failed.
#[derive(Debug, Error)]
#[error("prekey publication failed: {reason}")]
pub struct PublishError {
    /// Description of the failure.
    pub reason: String,
}

/// Sink for freshly generated prekeys.
///
/// Implemented by the external upload API client; the manager only
/// cares that a batch was handed over.
#[async_trait]
pub trait PrekeyPublisher: Send + Sync {
    /// Upload a batch of transport-form prekeys.
    async fn publish(&self, prekeys: &[Prekey]) -> Result<(), PublishError>;
}

/// Generates prekeys and reacts to low-pool notices.
pub struct PrekeyLifecycle<S> {
    store: Arc<S>,
    /// Next standard prekey id. Widened past `u16` so exhaustion is a
    /// detectable state instead of silent wraparound into reserved ids.
    next_id: AtomicU32,
}

impl<S: SessionStore> PrekeyLifecycle<S> {
    /// Create a manager whose id sequence starts at 0.
    pub fn new(store: Arc<S>) -> Self {
        Self::starting_at(store, 0)
    }

    /// Create a manager whose id sequence starts at `start_id`, for
    /// devices restoring a previously advanced sequence.
    pub fn starting_at(store: Arc<S>, start_id: u16) -> Self {
        Self { store, next_id: AtomicU32::new(u32::from(start_id)) }
    }

    /// Generate the last-resort prekey.
    ///
    /// Always uses the fixed reserved id ([`LAST_RESORT_PREKEY_ID`]), on
    /// every invocation; generated once per device registration and kept
    /// available as the fallback when the one-time pool is exhausted.
    pub async fn create_last_resort(&self) -> Result<Prekey, ClientError> {
        let material = self.store.new_prekey(LAST_RESORT_PREKEY_ID).await?;
        Ok(Prekey::from_material(LAST_RESORT_PREKEY_ID, &material))
    }

    /// Generate `count` standard prekeys with monotonically increasing
    /// ids.
    ///
    /// The id range is reserved atomically up front, so concurrent
    /// callers receive disjoint ranges.
    pub async fn create_batch(&self, count: u16) -> Result<Vec<Prekey>, ClientError> {
        let start = self.next_id.fetch_add(u32::from(count), Ordering::Relaxed);
        let end = start + u32::from(count);
        if end > u32::from(LAST_RESORT_PREKEY_ID) {
            return Err(ClientError::PrekeyIdsExhausted { next: start });
        }

        let mut batch = Vec::with_capacity(usize::from(count));
        for id in start..end {
            let material = self.store.new_prekey(id as u16).await?;
            batch.push(Prekey::from_material(id as u16, &material));
        }
        Ok(batch)
    }

    /// Generate a replenishment batch continuing the id sequence
    /// reported by `notice`.
    pub async fn replenish(&self, notice: LowPrekeyNotice) -> Result<Vec<Prekey>, ClientError> {
        // The store may have issued ids this manager never saw (state
        // restored from disk); never reissue below them.
        self.next_id.fetch_max(u32::from(notice.max_issued_id) + 1, Ordering::Relaxed);
        self.create_batch(REPLENISH_BATCH_SIZE).await
    }

    /// Consume low-pool notices for the lifetime of the store, uploading
    /// a fresh batch per notice.
    ///
    /// Returns when the notice channel closes (the store was dropped).
    /// Publication failure is logged and the loop keeps listening;
    /// generation failure propagates and ends the loop.
    pub async fn run_replenisher<P: PrekeyPublisher>(
        &self,
        mut notices: mpsc::UnboundedReceiver<LowPrekeyNotice>,
        publisher: &P,
    ) -> Result<(), ClientError> {
        while let Some(notice) = notices.recv().await {
            tracing::info!(
                remaining = notice.remaining,
                max_issued_id = notice.max_issued_id,
                "prekey pool low; generating replenishment batch"
            );

            let batch = self.replenish(notice).await?;
            let ids: Vec<u16> = batch.iter().map(|p| p.id).collect();

            match publisher.publish(&batch).await {
                Ok(()) => {
                    tracing::info!(count = batch.len(), ?ids, "uploaded replenishment prekeys");
                },
                Err(e) => tracing::warn!(error = %e, "prekey upload failed"),
            }
        }
        Ok(())
    }
}
