use crate::aggregate::{Aggregators, AggregateValues, LocalAggregates};
use crate::error::PregelError;
use crate::incoming::IncomingCache;
use crate::message::VertexId;
use crate::outgoing::OutgoingCache;
use crate::vertex::{Edge, Vertex};

use tracing::debug;

use std::any::Any;

/// Global figures of the running superstep, identical on every worker.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StepInfo {
    pub superstep: u64,
    pub vertex_count: u64,
    pub edge_count: u64,
}

/// Everything one compute thread accumulates while running its share of the
/// vertices of a superstep.
#[derive(Default)]
pub(crate) struct RoundTally {
    pub computed: usize,
    pub active: usize,
    pub aggregates: LocalAggregates,
    pub warnings: usize,
    pub failure: Option<PregelError>,
}

impl RoundTally {
    pub fn merge(mut self, other: RoundTally, aggregators: &Aggregators) -> RoundTally {
        self.computed += other.computed;
        self.active += other.active;
        self.warnings += other.warnings;
        if let Err(e) = self.aggregates.merge(aggregators, other.aggregates) {
            self.warnings += 1;
            debug!(error = %e, "dropping aggregate contribution");
        }
        if self.failure.is_none() {
            self.failure = other.failure;
        }
        self
    }
}

/// The view a vertex computation gets of its vertex and of the worker.
///
/// Sends made here become visible to their destinations in the next
/// superstep. Aggregate contributions become visible to everyone in the next
/// superstep as well.
pub struct ComputeContext<'a, V, E, M> {
    vertex: &'a mut Vertex<V, E>,
    step: StepInfo,
    outgoing: &'a OutgoingCache<M>,
    next: &'a IncomingCache<M>,
    aggregators: &'a Aggregators,
    globals: &'a AggregateValues,
    tally: &'a mut RoundTally,
}

impl<'a, V, E, M> ComputeContext<'a, V, E, M> {
    pub(crate) fn new(
        vertex: &'a mut Vertex<V, E>,
        step: StepInfo,
        outgoing: &'a OutgoingCache<M>,
        next: &'a IncomingCache<M>,
        aggregators: &'a Aggregators,
        globals: &'a AggregateValues,
        tally: &'a mut RoundTally,
    ) -> Self {
        ComputeContext {
            vertex,
            step,
            outgoing,
            next,
            aggregators,
            globals,
            tally,
        }
    }

    pub fn vertex_id(&self) -> &VertexId {
        self.vertex.id()
    }

    pub fn value(&self) -> &V {
        &self.vertex.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.vertex.value
    }

    pub fn edges(&self) -> &[Edge<E>] {
        self.vertex.get_outer_edges()
    }

    pub fn superstep(&self) -> u64 {
        self.step.superstep
    }

    /// Vertices in the whole graph, not just on this worker.
    pub fn vertex_count(&self) -> u64 {
        self.step.vertex_count
    }

    pub fn edge_count(&self) -> u64 {
        self.step.edge_count
    }

    pub fn send_message(&mut self, target: impl Into<VertexId>, message: M) {
        deliver(self.outgoing, self.next, self.tally, target.into(), message);
    }

    /// Sends a copy of `message` along every outgoing edge.
    pub fn send_to_neighbors(&mut self, message: M)
    where
        M: Clone,
    {
        for edge in self.vertex.get_outer_edges() {
            deliver(
                self.outgoing,
                self.next,
                self.tally,
                edge.target().clone(),
                message.clone(),
            );
        }
    }

    /// Folds `value` into the named aggregator. Unknown names and values of
    /// the wrong type are dropped and counted.
    pub fn aggregate<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        if let Err(e) = self.tally.aggregates.add(self.aggregators, name, Box::new(value)) {
            self.tally.warnings += 1;
            debug!(vertex = %self.vertex.id(), error = %e, "dropping aggregate contribution");
        }
    }

    /// The value reduced at the end of the previous superstep, or the latest
    /// one before that if nobody contributed since.
    pub fn aggregated_value<T: 'static>(&self, name: &str) -> Option<&T> {
        self.globals.get(name)
    }

    /// Halts the vertex until a message wakes it up again.
    pub fn vote_to_halt(&mut self) {
        self.vertex.deactivate();
    }
}

fn deliver<M>(
    outgoing: &OutgoingCache<M>,
    next: &IncomingCache<M>,
    tally: &mut RoundTally,
    target: VertexId,
    message: M,
) {
    if let Err(e) = outgoing.send(target, message, next) {
        if tally.failure.is_none() {
            tally.failure = Some(e);
        }
    }
}
