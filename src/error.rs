use crate::message::VertexId;
use crate::partition::WorkerAddress;
use crate::state::Phase;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PregelError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("algorithm {algorithm} requires a message combiner but none is configured")]
    MissingCombiner { algorithm: String },

    #[error("algorithm {algorithm} requires aggregator {name}, which is not registered")]
    MissingAggregator { algorithm: String, name: String },

    #[error("aggregator {0} is registered more than once")]
    DuplicateAggregator(String),

    #[error("unknown aggregator {0}")]
    UnknownAggregator(String),

    #[error("aggregator {0} received a value of the wrong type")]
    AggregateType(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed payload: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("batch for superstep {batch} arrived while at superstep {current} ({phase:?})")]
    StaleBatch {
        batch: u64,
        current: u64,
        phase: Phase,
    },

    #[error("failed to send batch to {address}: {reason}")]
    Network {
        address: WorkerAddress,
        reason: String,
    },

    #[error("{pending} outgoing messages exceed the bound of {bound} and could not be flushed")]
    MemoryBoundExceeded {
        pending: usize,
        bound: usize,
        #[source]
        source: Box<PregelError>,
    },

    #[error("cannot start superstep {requested} at superstep {current} ({phase:?})")]
    SuperstepOrder {
        requested: u64,
        current: u64,
        phase: Phase,
    },

    #[error("vertex {0} is loaded twice")]
    DuplicateVertex(VertexId),

    #[error("worker {address} failed: {source}")]
    WorkerFailed {
        address: WorkerAddress,
        #[source]
        source: Box<PregelError>,
    },

    #[error("worker {0} panicked during the superstep")]
    WorkerPanicked(WorkerAddress),

    #[error("failed to build the compute pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PregelError {
    /// Whether the error ends this worker's participation in the computation.
    ///
    /// Per-batch and per-message errors are recovered locally; everything
    /// structural is reported to the conductor.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PregelError::Decode(_)
                | PregelError::StaleBatch { .. }
                | PregelError::Network { .. }
                | PregelError::UnknownAggregator(_)
                | PregelError::AggregateType(_)
        )
    }
}
