use crate::error::PregelError;
use crate::message::VertexId;

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Where a worker can be reached. Opaque to the core, interpreted by the
/// network collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerAddress(Arc<str>);

impl WorkerAddress {
    pub fn new(address: impl Into<Arc<str>>) -> Self {
        WorkerAddress(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerAddress {
    fn from(address: &str) -> Self {
        WorkerAddress::new(address)
    }
}

impl fmt::Display for WorkerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    pub partition: PartitionId,
    pub worker: WorkerAddress,
}

/// Maps a vertex to the partition that owns it and the worker holding that
/// partition. Must give the same answer on every worker for the lifetime of
/// one computation.
pub trait PartitionResolver: Send + Sync {
    fn resolve(&self, vertex: &VertexId) -> Option<Route>;
}

/// Hashes vertex ids onto a fixed number of partitions and spreads the
/// partitions round-robin over the workers.
#[derive(Debug, Clone)]
pub struct HashPartitioner {
    partitions: u32,
    workers: Vec<WorkerAddress>,
}

impl HashPartitioner {
    pub fn new(partitions: u32, workers: Vec<WorkerAddress>) -> Result<Self, PregelError> {
        if partitions == 0 {
            return Err(PregelError::Config(
                "a partitioner needs at least one partition".to_string(),
            ));
        }
        if workers.is_empty() {
            return Err(PregelError::Config(
                "a partitioner needs at least one worker".to_string(),
            ));
        }
        Ok(HashPartitioner {
            partitions,
            workers,
        })
    }

    pub fn partition_of(&self, vertex: &VertexId) -> PartitionId {
        // FxHasher is unseeded, so every process computes the same partition.
        let mut hasher = FxHasher::default();
        vertex.as_str().hash(&mut hasher);
        PartitionId((hasher.finish() % self.partitions as u64) as u32)
    }

    pub fn owner(&self, partition: PartitionId) -> &WorkerAddress {
        &self.workers[partition.0 as usize % self.workers.len()]
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn workers(&self) -> &[WorkerAddress] {
        &self.workers
    }
}

impl PartitionResolver for HashPartitioner {
    fn resolve(&self, vertex: &VertexId) -> Option<Route> {
        let partition = self.partition_of(vertex);
        Some(Route {
            partition,
            worker: self.owner(partition).clone(),
        })
    }
}

/// Explicit vertex to route assignments. Vertices missing from the table are
/// unresolvable.
#[derive(Debug, Clone, Default)]
pub struct TablePartitioner {
    table: FxHashMap<VertexId, Route>,
}

impl TablePartitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(
        &mut self,
        vertex: impl Into<VertexId>,
        partition: PartitionId,
        worker: WorkerAddress,
    ) -> &mut Self {
        self.table
            .insert(vertex.into(), Route { partition, worker });
        self
    }
}

impl PartitionResolver for TablePartitioner {
    fn resolve(&self, vertex: &VertexId) -> Option<Route> {
        self.table.get(vertex).cloned()
    }
}
