use serde::{Deserialize, Serialize};

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque, globally unique vertex identifier.
///
/// Cloning is cheap, the string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(Arc<str>);

impl VertexId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        VertexId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(id: &str) -> Self {
        VertexId::new(id)
    }
}

impl From<String> for VertexId {
    fn from(id: String) -> Self {
        VertexId::new(id)
    }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for VertexId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VertexId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// The unit shipped between workers: every message one worker produced for
/// one destination partition during one superstep.
///
/// A vertex id may appear several times when no combiner is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch<M> {
    pub superstep: u64,
    pub messages: Vec<(VertexId, M)>,
}

impl<M> MessageBatch<M> {
    pub fn new(superstep: u64) -> Self {
        MessageBatch {
            superstep,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, receiver: VertexId, value: M) {
        self.messages.push((receiver, value));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
