use std::ops::Add;

/// Merges two messages bound for the same vertex into one.
///
/// Implementations must be associative and must not depend on the order in
/// which messages arrive.
pub trait Combine<M>: Send + Sync {
    fn combine(&self, a: M, b: M) -> M;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombiner;

impl<M: Add<Output = M>> Combine<M> for SumCombiner {
    fn combine(&self, a: M, b: M) -> M {
        a + b
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinCombiner;

impl<M: PartialOrd> Combine<M> for MinCombiner {
    fn combine(&self, a: M, b: M) -> M {
        if b < a {
            b
        } else {
            a
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxCombiner;

impl<M: PartialOrd> Combine<M> for MaxCombiner {
    fn combine(&self, a: M, b: M) -> M {
        if b > a {
            b
        } else {
            a
        }
    }
}
