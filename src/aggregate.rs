//! Named global accumulators.
//!
//! Every `aggregate(name, value)` call a vertex makes is folded into a
//! worker-local value with [`Aggregate::add`]. Local values from the compute
//! threads of a worker, and later from all workers, are merged with
//! [`Aggregate::combine`]. The reduced value is what vertices read during the
//! following superstep.

use crate::error::PregelError;

use num_traits::{Bounded, Zero};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::AddAssign;

pub type AggVal = Box<dyn Any + Send + Sync>;

pub trait Aggregate: Send + Sync + 'static {
    type Value: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    fn zero(&self) -> Self::Value;

    fn add(&self, acc: &mut Self::Value, contribution: Self::Value);

    fn combine(&self, acc: &mut Self::Value, other: Self::Value);
}

#[derive(Debug, Clone)]
pub struct MaxAggregator<T> {
    init: T,
}

impl<T> MaxAggregator<T> {
    pub fn new(init: T) -> Self {
        MaxAggregator { init }
    }
}

impl<T: Bounded> Default for MaxAggregator<T> {
    fn default() -> Self {
        MaxAggregator::new(T::min_value())
    }
}

impl<T> Aggregate for MaxAggregator<T>
where
    T: PartialOrd + Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    type Value = T;

    fn zero(&self) -> T {
        self.init.clone()
    }

    fn add(&self, acc: &mut T, contribution: T) {
        if contribution > *acc {
            *acc = contribution;
        }
    }

    fn combine(&self, acc: &mut T, other: T) {
        self.add(acc, other);
    }
}

#[derive(Debug, Clone)]
pub struct MinAggregator<T> {
    init: T,
}

impl<T> MinAggregator<T> {
    pub fn new(init: T) -> Self {
        MinAggregator { init }
    }
}

impl<T: Bounded> Default for MinAggregator<T> {
    fn default() -> Self {
        MinAggregator::new(T::max_value())
    }
}

impl<T> Aggregate for MinAggregator<T>
where
    T: PartialOrd + Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    type Value = T;

    fn zero(&self) -> T {
        self.init.clone()
    }

    fn add(&self, acc: &mut T, contribution: T) {
        if contribution < *acc {
            *acc = contribution;
        }
    }

    fn combine(&self, acc: &mut T, other: T) {
        self.add(acc, other);
    }
}

#[derive(Debug, Clone)]
pub struct SumAggregator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SumAggregator<T> {
    pub fn new() -> Self {
        SumAggregator {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SumAggregator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Aggregate for SumAggregator<T>
where
    T: Zero + AddAssign + Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    type Value = T;

    fn zero(&self) -> T {
        T::zero()
    }

    fn add(&self, acc: &mut T, contribution: T) {
        *acc += contribution;
    }

    fn combine(&self, acc: &mut T, other: T) {
        *acc += other;
    }
}

/// Object-safe view of an [`Aggregate`] working on type-erased values.
trait DynAggregate: Send + Sync {
    fn zero_value(&self) -> AggVal;
    fn add_value(&self, acc: &mut AggVal, contribution: AggVal) -> bool;
    fn combine_value(&self, acc: &mut AggVal, other: AggVal) -> bool;
    fn encode_value(&self, value: &AggVal) -> Option<Result<Vec<u8>, bincode::Error>>;
    fn decode_value(&self, bytes: &[u8]) -> Result<AggVal, bincode::Error>;
}

impl<A: Aggregate> DynAggregate for A {
    fn zero_value(&self) -> AggVal {
        Box::new(self.zero())
    }

    fn add_value(&self, acc: &mut AggVal, contribution: AggVal) -> bool {
        match (acc.downcast_mut::<A::Value>(), contribution.downcast::<A::Value>()) {
            (Some(acc), Ok(contribution)) => {
                self.add(acc, *contribution);
                true
            }
            _ => false,
        }
    }

    fn combine_value(&self, acc: &mut AggVal, other: AggVal) -> bool {
        match (acc.downcast_mut::<A::Value>(), other.downcast::<A::Value>()) {
            (Some(acc), Ok(other)) => {
                self.combine(acc, *other);
                true
            }
            _ => false,
        }
    }

    fn encode_value(&self, value: &AggVal) -> Option<Result<Vec<u8>, bincode::Error>> {
        value
            .downcast_ref::<A::Value>()
            .map(|value| bincode::serialize(value))
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<AggVal, bincode::Error> {
        let value: A::Value = bincode::deserialize(bytes)?;
        Ok(Box::new(value))
    }
}

/// The aggregators of one computation, keyed by name. Built once when the
/// computation starts and shared by every round.
#[derive(Default)]
pub struct Aggregators {
    entries: FxHashMap<String, Box<dyn DynAggregate>>,
}

impl Aggregators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: Aggregate>(
        &mut self,
        name: impl Into<String>,
        aggregator: A,
    ) -> Result<&mut Self, PregelError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(PregelError::DuplicateAggregator(name));
        }
        self.entries.insert(name, Box::new(aggregator));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|name| name.as_str())
    }

    fn get(&self, name: &str) -> Result<&dyn DynAggregate, PregelError> {
        self.entries
            .get(name)
            .map(|aggregator| aggregator.as_ref())
            .ok_or_else(|| PregelError::UnknownAggregator(name.to_string()))
    }

    fn decode(&self, name: &str, bytes: &[u8]) -> Result<AggVal, PregelError> {
        self.get(name)?
            .decode_value(bytes)
            .map_err(|e| PregelError::Decode(e))
    }

    fn encode(&self, name: &str, value: &AggVal) -> Result<Vec<u8>, PregelError> {
        match self.get(name)?.encode_value(value) {
            Some(encoded) => encoded.map_err(|e| PregelError::Encode(e)),
            None => Err(PregelError::AggregateType(name.to_string())),
        }
    }

    /// Global reduction: merges the local results every worker reported for
    /// one superstep. The outcome does not depend on the order of `reports`.
    pub fn reduce<I>(&self, reports: I) -> Result<AggregateReport, PregelError>
    where
        I: IntoIterator<Item = AggregateReport>,
    {
        let mut reduced: BTreeMap<String, AggVal> = BTreeMap::new();
        for report in reports {
            for (name, bytes) in report.values {
                let value = self.decode(&name, &bytes)?;
                match reduced.get_mut(&name) {
                    Some(acc) => {
                        if !self.get(&name)?.combine_value(acc, value) {
                            return Err(PregelError::AggregateType(name));
                        }
                    }
                    None => {
                        reduced.insert(name, value);
                    }
                }
            }
        }

        let mut report = AggregateReport::default();
        for (name, value) in &reduced {
            report.values.insert(name.clone(), self.encode(name, value)?);
        }
        Ok(report)
    }
}

/// Encoded aggregator values, as a worker reports them upward and as the
/// conductor ships the reduced values back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    values: BTreeMap<String, Vec<u8>>,
}

impl AggregateReport {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|name| name.as_str())
    }
}

/// Contributions collected on one compute thread during one superstep.
#[derive(Default)]
pub(crate) struct LocalAggregates {
    values: FxHashMap<String, AggVal>,
}

impl LocalAggregates {
    pub fn add(
        &mut self,
        aggregators: &Aggregators,
        name: &str,
        contribution: AggVal,
    ) -> Result<(), PregelError> {
        let aggregator = aggregators.get(name)?;
        if !self.values.contains_key(name) {
            self.values.insert(name.to_string(), aggregator.zero_value());
        }
        let Some(acc) = self.values.get_mut(name) else {
            return Err(PregelError::UnknownAggregator(name.to_string()));
        };

        if aggregator.add_value(acc, contribution) {
            Ok(())
        } else {
            Err(PregelError::AggregateType(name.to_string()))
        }
    }

    pub fn merge(&mut self, aggregators: &Aggregators, other: LocalAggregates) -> Result<(), PregelError> {
        for (name, value) in other.values {
            match self.values.get_mut(&name) {
                Some(acc) => {
                    if !aggregators.get(&name)?.combine_value(acc, value) {
                        return Err(PregelError::AggregateType(name));
                    }
                }
                None => {
                    self.values.insert(name, value);
                }
            }
        }
        Ok(())
    }

    pub fn report(&self, aggregators: &Aggregators) -> Result<AggregateReport, PregelError> {
        let mut report = AggregateReport::default();
        for (name, value) in &self.values {
            report
                .values
                .insert(name.clone(), aggregators.encode(name, value)?);
        }
        Ok(report)
    }
}

/// The latest reduced value of every aggregator, readable by vertices.
///
/// Values persist across supersteps until a newer reduction overwrites them.
#[derive(Default)]
pub struct AggregateValues {
    values: FxHashMap<String, AggVal>,
}

impl AggregateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, aggregators: &Aggregators, report: &AggregateReport) -> Result<(), PregelError> {
        for (name, bytes) in &report.values {
            let value = aggregators.decode(name, bytes)?;
            self.values.insert(name.clone(), value);
        }
        Ok(())
    }

    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn registry() -> Aggregators {
        let mut aggregators = Aggregators::new();
        aggregators
            .register("max", MaxAggregator::new(0.0_f64))
            .unwrap()
            .register("sum", SumAggregator::<u64>::new())
            .unwrap();
        aggregators
    }

    fn local(aggregators: &Aggregators, max: f64, sum: u64) -> LocalAggregates {
        let mut local = LocalAggregates::default();
        local.add(aggregators, "max", Box::new(max)).unwrap();
        local.add(aggregators, "sum", Box::new(sum)).unwrap();
        local
    }

    fn read(aggregators: &Aggregators, report: &AggregateReport) -> AggregateValues {
        let mut values = AggregateValues::new();
        values.apply(aggregators, report).unwrap();
        values
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut aggregators = registry();
        let result = aggregators.register("max", MaxAggregator::new(1.0_f64));
        assert!(matches!(result, Err(PregelError::DuplicateAggregator(name)) if name == "max"));
    }

    #[test]
    fn local_contributions_fold_with_add() {
        let aggregators = registry();
        let mut local = LocalAggregates::default();
        for diff in [0.5, 2.5, 1.0] {
            local.add(&aggregators, "max", Box::new(diff)).unwrap();
        }
        let values = read(&aggregators, &local.report(&aggregators).unwrap());
        assert_eq!(values.get::<f64>("max"), Some(&2.5));
        assert_eq!(values.get::<u64>("sum"), None);
    }

    #[test]
    fn wrong_type_or_name_is_an_error() {
        let aggregators = registry();
        let mut local = LocalAggregates::default();
        assert!(matches!(
            local.add(&aggregators, "max", Box::new(3_u64)),
            Err(PregelError::AggregateType(_))
        ));
        assert!(matches!(
            local.add(&aggregators, "nope", Box::new(3.0_f64)),
            Err(PregelError::UnknownAggregator(_))
        ));
    }

    #[test]
    fn thread_locals_merge_with_combine() {
        let aggregators = registry();
        let mut a = local(&aggregators, 1.0, 3);
        let b = local(&aggregators, 4.0, 5);
        a.merge(&aggregators, b).unwrap();

        let values = read(&aggregators, &a.report(&aggregators).unwrap());
        assert_eq!(values.get::<f64>("max"), Some(&4.0));
        assert_eq!(values.get::<u64>("sum"), Some(&8));
    }

    #[test]
    fn values_persist_until_overwritten() {
        let aggregators = registry();
        let mut values = AggregateValues::new();

        let first = aggregators
            .reduce(vec![local(&aggregators, 2.0, 1).report(&aggregators).unwrap()])
            .unwrap();
        values.apply(&aggregators, &first).unwrap();

        let mut only_sum = LocalAggregates::default();
        only_sum.add(&aggregators, "sum", Box::new(7_u64)).unwrap();
        let second = aggregators
            .reduce(vec![only_sum.report(&aggregators).unwrap()])
            .unwrap();
        values.apply(&aggregators, &second).unwrap();

        assert_eq!(values.get::<f64>("max"), Some(&2.0));
        assert_eq!(values.get::<u64>("sum"), Some(&7));
    }

    proptest! {
        #[test]
        fn global_max_ignores_reporting_order(
            maxima in proptest::collection::vec(0.0f64..1000.0, 1..16),
            rotate in 0usize..16,
        ) {
            let aggregators = registry();
            let mut reports: Vec<AggregateReport> = maxima
                .iter()
                .map(|max| local(&aggregators, *max, 1).report(&aggregators).unwrap())
                .collect();

            let forward = aggregators.reduce(reports.clone()).unwrap();
            let len = reports.len();
            reports.rotate_left(rotate % len);
            reports.reverse();
            let shuffled = aggregators.reduce(reports).unwrap();

            prop_assert_eq!(&forward, &shuffled);

            let values = read(&aggregators, &forward);
            let expected = maxima.iter().cloned().fold(0.0, f64::max);
            prop_assert_eq!(values.get::<f64>("max"), Some(&expected));
            prop_assert_eq!(values.get::<u64>("sum"), Some(&(maxima.len() as u64)));
        }
    }
}
