use crate::aggregate::Aggregators;
use crate::combine::Combine;
use crate::config::WorkerConfig;
use crate::context::ComputeContext;
use crate::error::PregelError;
use crate::format::{BincodeFormat, MessageFormat};
use crate::incoming::Messages;

use serde::de::DeserializeOwned;
use serde::Serialize;

use std::sync::Arc;

/// One vertex-centric algorithm: how a vertex computes, and how its messages
/// are encoded, combined and aggregated.
pub trait Algorithm: Send + Sync + 'static {
    type Value: Send + Sync;
    type Edge: Send + Sync;
    type Message: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    fn name(&self) -> &str;

    /// Runs once per active vertex and superstep, with the messages sent to
    /// the vertex during the previous superstep.
    fn compute(
        &self,
        ctx: &mut ComputeContext<'_, Self::Value, Self::Edge, Self::Message>,
        messages: &Messages<Self::Message>,
    );

    fn combiner(&self) -> Option<Arc<dyn Combine<Self::Message>>> {
        None
    }

    fn message_format(&self) -> Arc<dyn MessageFormat<Self::Message>> {
        Arc::new(BincodeFormat)
    }

    fn register_aggregators(&self, _aggregators: &mut Aggregators) -> Result<(), PregelError> {
        Ok(())
    }

    /// Whether the algorithm is only correct when messages are combined.
    fn requires_combiner(&self) -> bool {
        false
    }

    /// Aggregators `compute` reads or writes.
    ///
    /// List every name `compute` passes to `aggregate` or
    /// `aggregated_value`. Startup checks only these names; a contribution to
    /// a name that was never registered is dropped mid-round and only shows
    /// up as an aggregate warning.
    fn required_aggregators(&self) -> &[&'static str] {
        &[]
    }
}

/// The plug-in points of an algorithm, resolved and checked once before the
/// first superstep.
pub struct AlgorithmSetup<M> {
    pub combiner: Option<Arc<dyn Combine<M>>>,
    pub format: Arc<dyn MessageFormat<M>>,
    pub aggregators: Arc<Aggregators>,
}

impl<M> AlgorithmSetup<M> {
    pub fn new<A>(algorithm: &A, config: &WorkerConfig) -> Result<Self, PregelError>
    where
        A: Algorithm<Message = M>,
    {
        config.validate()?;

        let combiner = algorithm.combiner();
        if combiner.is_none() && algorithm.requires_combiner() {
            return Err(PregelError::MissingCombiner {
                algorithm: algorithm.name().to_string(),
            });
        }

        let mut aggregators = Aggregators::new();
        algorithm.register_aggregators(&mut aggregators)?;
        for name in algorithm.required_aggregators() {
            if !aggregators.contains(name) {
                return Err(PregelError::MissingAggregator {
                    algorithm: algorithm.name().to_string(),
                    name: name.to_string(),
                });
            }
        }

        Ok(AlgorithmSetup {
            combiner,
            format: algorithm.message_format(),
            aggregators: Arc::new(aggregators),
        })
    }
}
