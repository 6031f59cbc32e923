use crate::aggregate::{Aggregators, MaxAggregator};
use crate::algorithm::Algorithm;
use crate::combine::{Combine, SumCombiner};
use crate::context::ComputeContext;
use crate::error::PregelError;
use crate::incoming::Messages;

use std::sync::Arc;

pub const CONVERGENCE: &str = "convergence";

/// Rank propagation with a damping factor of 0.85.
///
/// Superstep 0 passes the loaded values on. Every later round sets the rank
/// to `0.15 / N + 0.85 * sum(incoming)`. After the last round every vertex
/// halts. The largest rank change of a round is published as `convergence`.
#[derive(Debug, Clone)]
pub struct PageRank {
    rounds: u64,
}

impl Default for PageRank {
    fn default() -> Self {
        PageRank { rounds: 30 }
    }
}

impl PageRank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }
}

impl Algorithm for PageRank {
    type Value = f64;
    type Edge = ();
    type Message = f64;

    fn name(&self) -> &str {
        "pagerank"
    }

    fn compute(&self, ctx: &mut ComputeContext<'_, f64, (), f64>, messages: &Messages<f64>) {
        let old = *ctx.value();
        if ctx.superstep() > 0 {
            let sum: f64 = messages.iter().sum();
            *ctx.value_mut() = 0.15 / ctx.vertex_count() as f64 + 0.85 * sum;
        }

        if ctx.superstep() < self.rounds {
            let rank = *ctx.value();
            let degree = ctx.edges().len();
            if degree > 0 {
                ctx.send_to_neighbors(rank / degree as f64);
            }
            ctx.aggregate(CONVERGENCE, (old - rank).abs());
        } else {
            ctx.vote_to_halt();
        }
    }

    fn combiner(&self) -> Option<Arc<dyn Combine<f64>>> {
        Some(Arc::new(SumCombiner))
    }

    fn register_aggregators(&self, aggregators: &mut Aggregators) -> Result<(), PregelError> {
        aggregators.register(CONVERGENCE, MaxAggregator::new(0.0_f64))?;
        Ok(())
    }

    fn requires_combiner(&self) -> bool {
        true
    }

    fn required_aggregators(&self) -> &[&'static str] {
        &[CONVERGENCE]
    }
}
