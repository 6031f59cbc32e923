use crate::aggregate::{AggregateReport, AggregateValues, Aggregators};
use crate::algorithm::{Algorithm, AlgorithmSetup};
use crate::config::WorkerConfig;
use crate::context::{ComputeContext, RoundTally, StepInfo};
use crate::error::PregelError;
use crate::format::MessageFormat;
use crate::graph::{GraphSink, GraphSource};
use crate::incoming::IncomingCache;
use crate::message::VertexId;
use crate::network::NetworkSender;
use crate::outgoing::OutgoingCache;
use crate::partition::{PartitionResolver, WorkerAddress};
use crate::state::{inbox_index, Phase, RoundState};
use crate::vertex::Vertex;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What the conductor hands every worker when a superstep begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuperstepStart {
    pub superstep: u64,
    pub vertex_count: u64,
    pub edge_count: u64,
    /// Aggregator values reduced at the end of the previous superstep.
    pub aggregates: AggregateReport,
}

/// What a worker reports once its share of a superstep is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperstepReport {
    pub worker: WorkerAddress,
    pub superstep: u64,
    /// Vertices whose `compute` ran.
    pub computed: usize,
    /// Vertices still active after computing.
    pub active: usize,
    pub received: usize,
    pub sent: usize,
    pub dropped: usize,
    pub errors: usize,
    pub aggregates: AggregateReport,
    pub elapsed_ms: u64,
}

/// Counters accumulated over the whole computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub supersteps: u64,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub batches_sent: usize,
    pub malformed_batches: usize,
    pub stale_batches: usize,
    pub failed_batches: usize,
    pub unknown_vertex_messages: usize,
    pub unresolved_messages: usize,
    pub incoming_overflow: usize,
    pub aggregate_warnings: usize,
}

#[derive(Default)]
struct ReceiveCounters {
    malformed: AtomicUsize,
    stale: AtomicUsize,
    unknown: AtomicUsize,
}

struct Partition<V, E> {
    vertices: Vec<Vertex<V, E>>,
    edges: u64,
}

/// Runs the vertex computations of one worker, superstep after superstep.
///
/// `receive_batch` may be called from any thread at any time, including
/// while a superstep is computing.
pub struct Worker<A: Algorithm> {
    address: WorkerAddress,
    algorithm: Arc<A>,
    resolver: Arc<dyn PartitionResolver>,
    aggregators: Arc<Aggregators>,
    format: Arc<dyn MessageFormat<A::Message>>,
    pool: ThreadPool,

    partition: Mutex<Partition<A::Value, A::Edge>>,
    index: RwLock<FxHashMap<VertexId, usize>>,

    inboxes: [IncomingCache<A::Message>; 2],
    outgoing: OutgoingCache<A::Message>,

    round: RwLock<RoundState>,
    step: RwLock<StepInfo>,
    globals: RwLock<AggregateValues>,

    received: ReceiveCounters,
    stats: Mutex<WorkerStats>,
}

impl<A: Algorithm> Worker<A> {
    pub fn new(
        address: WorkerAddress,
        algorithm: Arc<A>,
        config: &WorkerConfig,
        resolver: Arc<dyn PartitionResolver>,
        network: Arc<dyn NetworkSender>,
    ) -> Result<Self, PregelError> {
        let setup = AlgorithmSetup::new(algorithm.as_ref(), config)?;

        let name = address.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.parallelism)
            .thread_name(move |i| format!("{}-compute-{}", name, i))
            .build()?;

        let inboxes = [
            IncomingCache::new(setup.combiner.clone(), config.max_messages_per_vertex),
            IncomingCache::new(setup.combiner.clone(), config.max_messages_per_vertex),
        ];
        let outgoing = OutgoingCache::new(
            address.clone(),
            resolver.clone(),
            network,
            setup.format.clone(),
            setup.combiner,
            config.max_pending_messages,
        );

        Ok(Worker {
            address,
            algorithm,
            resolver,
            aggregators: setup.aggregators,
            format: setup.format,
            pool,
            partition: Mutex::new(Partition {
                vertices: Vec::new(),
                edges: 0,
            }),
            index: RwLock::new(FxHashMap::default()),
            inboxes,
            outgoing,
            round: RwLock::new(RoundState::new()),
            step: RwLock::new(StepInfo::default()),
            globals: RwLock::new(AggregateValues::new()),
            received: ReceiveCounters::default(),
            stats: Mutex::new(WorkerStats::default()),
        })
    }

    pub fn address(&self) -> &WorkerAddress {
        &self.address
    }

    pub fn aggregators(&self) -> &Arc<Aggregators> {
        &self.aggregators
    }

    /// Keeps the vertices of `source` this worker owns. Returns how many were
    /// added.
    pub fn load(&self, source: &mut dyn GraphSource<A::Value, A::Edge>) -> Result<usize, PregelError> {
        let mut loaded = 0;
        let mut unowned = 0;
        source.load(&mut |vertex: Vertex<A::Value, A::Edge>| -> Result<(), PregelError> {
            match self.resolver.resolve(vertex.id()) {
                Some(route) if route.worker == self.address => {
                    self.add_vertex(vertex)?;
                    loaded += 1;
                }
                Some(_) => {}
                None => {
                    unowned += 1;
                    warn!(worker = %self.address, vertex = %vertex.id(), "no partition owns the vertex, skipping");
                }
            }
            Ok(())
        })?;

        debug!(worker = %self.address, loaded, unowned, "graph loaded");
        Ok(loaded)
    }

    pub fn add_vertex(&self, vertex: Vertex<A::Value, A::Edge>) -> Result<(), PregelError> {
        let mut index = self.index.write();
        if index.contains_key(vertex.id()) {
            return Err(PregelError::DuplicateVertex(vertex.id().clone()));
        }

        let mut partition = self.partition.lock();
        index.insert(vertex.id().clone(), partition.vertices.len());
        partition.edges += vertex.edge_count() as u64;
        partition.vertices.push(vertex);
        Ok(())
    }

    /// Decodes a batch from another worker and files its messages for the
    /// round after the one they were produced in. Returns the number of
    /// messages accepted.
    ///
    /// Malformed and stale batches, and messages for vertices this worker
    /// does not hold, are dropped and counted.
    pub fn receive_batch(&self, payload: &[u8]) -> Result<usize, PregelError> {
        let batch = match self.format.decode(payload) {
            Ok(batch) => batch,
            Err(e) => {
                self.received.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(worker = %self.address, error = %e, "dropping malformed batch");
                return Err(e);
            }
        };

        // held while inserting so the round cannot move on underneath
        let round = self.round.read();
        let Some(slot) = round.inbox_for(batch.superstep) else {
            self.received.stale.fetch_add(1, Ordering::Relaxed);
            warn!(
                worker = %self.address,
                batch = batch.superstep,
                superstep = round.superstep,
                "dropping stale batch"
            );
            return Err(PregelError::StaleBatch {
                batch: batch.superstep,
                current: round.superstep,
                phase: round.phase,
            });
        };

        let inbox = &self.inboxes[slot];
        let index = self.index.read();
        let mut accepted = 0;
        for (target, message) in batch.messages {
            if index.contains_key(&target) {
                inbox.insert(target, message);
                accepted += 1;
            } else {
                self.received.unknown.fetch_add(1, Ordering::Relaxed);
                trace!(worker = %self.address, vertex = %target, "message for unknown vertex");
            }
        }
        Ok(accepted)
    }

    pub fn start_superstep(&self, start: SuperstepStart) -> Result<(), PregelError> {
        let mut round = self.round.write();
        let mut next = *round;
        next.begin(start.superstep)?;

        self.globals.write().apply(&self.aggregators, &start.aggregates)?;
        *self.step.write() = StepInfo {
            superstep: start.superstep,
            vertex_count: start.vertex_count,
            edge_count: start.edge_count,
        };
        self.outgoing.begin_round(start.superstep);
        *round = next;

        debug!(worker = %self.address, superstep = start.superstep, "superstep started");
        Ok(())
    }

    /// Runs `compute` for every active vertex and for every halted vertex
    /// that received messages, then flushes the outgoing cache.
    ///
    /// A fatal error in any computation fails the whole round.
    pub fn run_superstep(&self) -> Result<SuperstepReport, PregelError> {
        let now = Instant::now();
        let RoundState { superstep, phase } = *self.round.read();
        if phase != Phase::Computing {
            return Err(PregelError::SuperstepOrder {
                requested: superstep,
                current: superstep,
                phase,
            });
        }

        let step = *self.step.read();
        let current = &self.inboxes[inbox_index(superstep)];
        let next = &self.inboxes[inbox_index(superstep + 1)];
        let received = current.message_count();
        let overflow = current.dropped_count();

        let tally = {
            let globals = self.globals.read();
            let globals: &AggregateValues = &globals;
            let mut partition = self.partition.lock();
            let vertices: &mut Vec<Vertex<A::Value, A::Edge>> = &mut partition.vertices;

            let algorithm = self.algorithm.as_ref();
            let aggregators = self.aggregators.as_ref();
            let outgoing = &self.outgoing;

            self.pool.install(|| {
                vertices
                    .par_iter_mut()
                    .fold(RoundTally::default, |mut tally, vertex| {
                        let messages = current.take(vertex.id());
                        if !vertex.active() && messages.is_empty() {
                            return tally;
                        }

                        vertex.activate();
                        let mut ctx = ComputeContext::new(
                            vertex,
                            step,
                            outgoing,
                            next,
                            aggregators,
                            globals,
                            &mut tally,
                        );
                        algorithm.compute(&mut ctx, &messages);

                        tally.computed += 1;
                        if vertex.active() {
                            tally.active += 1;
                        }
                        tally
                    })
                    .reduce(RoundTally::default, |a, b| a.merge(b, aggregators))
            })
        };

        if let Some(failure) = tally.failure {
            warn!(worker = %self.address, superstep, error = %failure, "vertex computation failed");
            return Err(failure);
        }

        if let Err(e) = self.outgoing.flush() {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(worker = %self.address, superstep, error = %e, "some batches were lost");
        }

        // local sends to vertices this worker does not hold
        let orphaned = current.arrival_count();
        current.clear();
        self.round.write().finish();

        let aggregates = tally.aggregates.report(&self.aggregators)?;
        let report = SuperstepReport {
            worker: self.address.clone(),
            superstep,
            computed: tally.computed,
            active: tally.active,
            received,
            sent: self.outgoing.sent_count(),
            dropped: overflow + orphaned + self.outgoing.unresolved_count(),
            errors: self.outgoing.failed_batch_count() + tally.warnings,
            aggregates,
            elapsed_ms: now.elapsed().as_millis() as u64,
        };

        {
            let mut stats = self.stats.lock();
            stats.supersteps += 1;
            stats.messages_received += received;
            stats.messages_sent += report.sent;
            stats.batches_sent += self.outgoing.batch_count();
            stats.failed_batches += self.outgoing.failed_batch_count();
            stats.unresolved_messages += self.outgoing.unresolved_count();
            stats.incoming_overflow += overflow;
            stats.unknown_vertex_messages += orphaned;
            stats.aggregate_warnings += tally.warnings;
        }

        debug!(
            worker = %self.address,
            superstep,
            computed = report.computed,
            active = report.active,
            received = report.received,
            sent = report.sent,
            elapsed_ms = report.elapsed_ms,
            "superstep computed"
        );
        Ok(report)
    }

    /// Writes every local vertex value to `sink`.
    pub fn store(&self, sink: &mut dyn GraphSink<A::Value>) -> Result<usize, PregelError> {
        let partition = self.partition.lock();
        for vertex in &partition.vertices {
            sink.store(vertex.id(), &vertex.value)?;
        }
        Ok(partition.vertices.len())
    }

    pub fn vertex_value(&self, id: &str) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        let position = *self.index.read().get(id)?;
        let partition = self.partition.lock();
        partition.vertices.get(position).map(|vertex| vertex.value.clone())
    }

    pub fn stats(&self) -> WorkerStats {
        let mut stats = *self.stats.lock();
        stats.malformed_batches = self.received.malformed.load(Ordering::Relaxed);
        stats.stale_batches = self.received.stale.load(Ordering::Relaxed);
        stats.unknown_vertex_messages += self.received.unknown.load(Ordering::Relaxed);
        stats
    }

    pub fn local_vertex_count(&self) -> u64 {
        self.partition.lock().vertices.len() as u64
    }

    pub fn local_edge_count(&self) -> u64 {
        self.partition.lock().edges
    }
}
