use crate::algorithm::Algorithm;
use crate::combine::{Combine, MinCombiner};
use crate::context::ComputeContext;
use crate::incoming::Messages;
use crate::message::VertexId;

use std::sync::Arc;

/// Single source shortest paths over non-negative edge weights.
///
/// Every vertex halts after each round and only wakes up when a shorter
/// distance reaches it. Unreachable vertices end at infinity.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    source: VertexId,
    combined: bool,
}

impl ShortestPaths {
    pub fn new(source: impl Into<VertexId>) -> Self {
        ShortestPaths {
            source: source.into(),
            combined: true,
        }
    }

    /// Without a combiner every candidate distance is delivered.
    pub fn with_combiner(mut self, combined: bool) -> Self {
        self.combined = combined;
        self
    }

    fn relax(ctx: &mut ComputeContext<'_, f64, f64, f64>, distance: f64) {
        let candidates: Vec<(VertexId, f64)> = ctx
            .edges()
            .iter()
            .map(|edge| (edge.target().clone(), distance + edge.value))
            .collect();
        for (target, candidate) in candidates {
            ctx.send_message(target, candidate);
        }
    }
}

impl Algorithm for ShortestPaths {
    type Value = f64;
    type Edge = f64;
    type Message = f64;

    fn name(&self) -> &str {
        "sssp"
    }

    fn compute(&self, ctx: &mut ComputeContext<'_, f64, f64, f64>, messages: &Messages<f64>) {
        if ctx.superstep() == 0 {
            if ctx.vertex_id() == &self.source {
                *ctx.value_mut() = 0.0;
                Self::relax(ctx, 0.0);
            } else {
                *ctx.value_mut() = f64::INFINITY;
            }
        } else {
            let best = messages.iter().copied().fold(f64::INFINITY, f64::min);
            if best < *ctx.value() {
                *ctx.value_mut() = best;
                Self::relax(ctx, best);
            }
        }
        ctx.vote_to_halt();
    }

    fn combiner(&self) -> Option<Arc<dyn Combine<f64>>> {
        if self.combined {
            Some(Arc::new(MinCombiner))
        } else {
            None
        }
    }
}
