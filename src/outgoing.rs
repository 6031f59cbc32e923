use crate::combine::Combine;
use crate::error::PregelError;
use crate::format::MessageFormat;
use crate::incoming::{FxDashMap, IncomingCache, Inbox};
use crate::message::{MessageBatch, VertexId};
use crate::network::NetworkSender;
use crate::partition::{PartitionId, PartitionResolver, WorkerAddress};

use dashmap::mapref::entry::Entry;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Messages bound for one remote partition.
struct Bucket<M> {
    worker: WorkerAddress,
    messages: FxHashMap<VertexId, Inbox<M>>,
    stored: usize,
}

impl<M> Bucket<M> {
    fn new(worker: WorkerAddress) -> Self {
        Bucket {
            worker,
            messages: FxHashMap::default(),
            stored: 0,
        }
    }

    /// Returns how many stored messages the push added (0 when combined).
    fn push(&mut self, target: VertexId, message: M, combiner: Option<&dyn Combine<M>>) -> usize {
        let added = match self.messages.get_mut(&target) {
            Some(inbox) => {
                let before = inbox.len();
                inbox.push(message, combiner, usize::MAX);
                inbox.len() - before
            }
            None => {
                self.messages
                    .insert(target, Inbox::new(message, combiner.is_some()));
                1
            }
        };
        self.stored += added;
        added
    }

    fn into_batch(self, superstep: u64) -> MessageBatch<M> {
        let mut batch = MessageBatch::new(superstep);
        for (target, inbox) in self.messages {
            for message in inbox.into_vec() {
                batch.push(target.clone(), message);
            }
        }
        batch
    }
}

/// Buffers the messages a worker sends during one superstep, grouped by
/// destination partition, and ships each group as a single batch.
///
/// Messages for vertices this worker owns never reach a bucket; they go
/// straight into the incoming cache of the next round.
pub struct OutgoingCache<M> {
    local: WorkerAddress,
    resolver: Arc<dyn PartitionResolver>,
    network: Arc<dyn NetworkSender>,
    format: Arc<dyn MessageFormat<M>>,
    combiner: Option<Arc<dyn Combine<M>>>,
    buckets: FxDashMap<PartitionId, Bucket<M>>,
    max_pending: usize,
    superstep: AtomicU64,
    pending: AtomicUsize,
    sent: AtomicUsize,
    unresolved: AtomicUsize,
    batches: AtomicUsize,
    failed_batches: AtomicUsize,
}

impl<M> OutgoingCache<M> {
    pub fn new(
        local: WorkerAddress,
        resolver: Arc<dyn PartitionResolver>,
        network: Arc<dyn NetworkSender>,
        format: Arc<dyn MessageFormat<M>>,
        combiner: Option<Arc<dyn Combine<M>>>,
        max_pending: usize,
    ) -> Self {
        OutgoingCache {
            local,
            resolver,
            network,
            format,
            combiner,
            buckets: FxDashMap::default(),
            max_pending,
            superstep: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
            unresolved: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            failed_batches: AtomicUsize::new(0),
        }
    }

    /// Tags every following batch with `superstep` and resets the per-round
    /// counters. Buffered messages are kept.
    pub fn begin_round(&self, superstep: u64) {
        self.superstep.store(superstep, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.unresolved.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.failed_batches.store(0, Ordering::Relaxed);
    }

    /// Routes a message to `target`.
    ///
    /// An unresolvable destination is dropped and counted. When the buffered
    /// messages exceed the configured bound the cache flushes early, and a
    /// failing early flush is fatal.
    pub fn send(&self, target: VertexId, message: M, local: &IncomingCache<M>) -> Result<(), PregelError> {
        let Some(route) = self.resolver.resolve(&target) else {
            self.unresolved.fetch_add(1, Ordering::Relaxed);
            warn!(worker = %self.local, vertex = %target, "no partition owns the destination, dropping message");
            return Ok(());
        };

        self.sent.fetch_add(1, Ordering::Relaxed);
        if route.worker == self.local {
            local.insert(target, message);
            return Ok(());
        }

        let combiner = self.combiner.as_deref();
        let pending = {
            let mut bucket = match self.buckets.entry(route.partition) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => entry.insert(Bucket::new(route.worker)),
            };
            // counted under the bucket lock so a concurrent flush never
            // subtracts more than was added
            let added = bucket.push(target, message, combiner);
            self.pending.fetch_add(added, Ordering::Relaxed) + added
        };

        if pending > self.max_pending {
            debug!(worker = %self.local, pending, bound = self.max_pending, "outgoing bound reached, flushing early");
            if let Err(source) = self.flush() {
                return Err(PregelError::MemoryBoundExceeded {
                    pending: self.pending_count(),
                    bound: self.max_pending,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }

    /// Ships one batch per non-empty partition bucket and empties the buckets.
    ///
    /// Every bucket is attempted. The first failure is returned after the
    /// others went out; the failed batches are lost and counted.
    pub fn flush(&self) -> Result<usize, PregelError> {
        let partitions: Vec<PartitionId> = self.buckets.iter().map(|entry| *entry.key()).collect();
        let superstep = self.superstep.load(Ordering::Relaxed);
        let mut shipped = 0;
        let mut first_error = None;

        for partition in partitions {
            let Some((_, bucket)) = self.buckets.remove(&partition) else {
                continue;
            };
            self.pending.fetch_sub(bucket.stored, Ordering::Relaxed);

            let worker = bucket.worker.clone();
            let size = bucket.stored;
            let result = self
                .format
                .encode(&bucket.into_batch(superstep))
                .and_then(|payload| self.network.send_batch(&worker, payload));

            match result {
                Ok(()) => {
                    shipped += 1;
                    trace!(%partition, %worker, messages = size, superstep, "batch sent");
                }
                Err(e) => {
                    self.failed_batches.fetch_add(1, Ordering::Relaxed);
                    warn!(%partition, %worker, messages = size, error = %e, "failed to send batch");
                    first_error.get_or_insert(e);
                }
            }
        }

        self.batches.fetch_add(shipped, Ordering::Relaxed);
        match first_error {
            Some(e) => Err(e),
            None => Ok(shipped),
        }
    }

    /// Buffered messages after combining, waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Messages accepted this round, local deliveries included.
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.load(Ordering::Relaxed)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn failed_batch_count(&self) -> usize {
        self.failed_batches.load(Ordering::Relaxed)
    }
}
