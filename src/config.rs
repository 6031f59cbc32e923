use crate::error::PregelError;

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Compute threads per worker, 0 for one per core.
    pub parallelism: usize,
    /// Buffered outgoing messages, after combining, that force an early
    /// flush.
    pub max_pending_messages: usize,
    /// Uncombined messages kept per vertex and round.
    pub max_messages_per_vertex: usize,
    pub max_supersteps: u64,
    pub partitions_per_worker: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            parallelism: 0,
            max_pending_messages: 1 << 20,
            max_messages_per_vertex: 1 << 16,
            max_supersteps: 100,
            partitions_per_worker: 4,
        }
    }
}

impl WorkerConfig {
    pub fn from_json(json: &str) -> Result<Self, PregelError> {
        let config: WorkerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PregelError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), PregelError> {
        if self.max_pending_messages == 0 {
            return Err(PregelError::Config(
                "max_pending_messages must be positive".to_string(),
            ));
        }
        if self.max_messages_per_vertex == 0 {
            return Err(PregelError::Config(
                "max_messages_per_vertex must be positive".to_string(),
            ));
        }
        if self.max_supersteps == 0 {
            return Err(PregelError::Config(
                "max_supersteps must be positive".to_string(),
            ));
        }
        if self.partitions_per_worker == 0 {
            return Err(PregelError::Config(
                "partitions_per_worker must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_max_pending_messages(mut self, max: usize) -> Self {
        self.max_pending_messages = max;
        self
    }

    pub fn with_max_messages_per_vertex(mut self, max: usize) -> Self {
        self.max_messages_per_vertex = max;
        self
    }

    pub fn with_max_supersteps(mut self, max: u64) -> Self {
        self.max_supersteps = max;
        self
    }

    pub fn with_partitions_per_worker(mut self, partitions: u32) -> Self {
        self.partitions_per_worker = partitions;
        self
    }
}
