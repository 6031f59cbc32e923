use crate::aggregate::{AggregateReport, AggregateValues, Aggregators};
use crate::algorithm::Algorithm;
use crate::config::WorkerConfig;
use crate::error::PregelError;
use crate::graph::{GraphSink, GraphSource};
use crate::network::ChannelNetwork;
use crate::partition::{HashPartitioner, WorkerAddress};
use crate::worker::{SuperstepReport, SuperstepStart, Worker, WorkerStats};

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// The global control surface that drives workers through supersteps.
pub trait Conductor {
    /// Starts the next superstep on every worker and returns its index.
    fn start_superstep(&mut self) -> Result<u64, PregelError>;

    /// Returns once every worker finished the running superstep and every
    /// message it produced has been delivered.
    fn await_barrier(&mut self) -> Result<(), PregelError>;

    fn is_globally_done(&self) -> bool;

    fn run(&mut self) -> Result<(), PregelError> {
        while !self.is_globally_done() {
            self.start_superstep()?;
            self.await_barrier()?;
        }
        Ok(())
    }
}

/// Runs a whole computation in this process: one [`Worker`] per simulated
/// machine, connected by a [`ChannelNetwork`].
pub struct LocalConductor<A: Algorithm> {
    workers: Vec<Worker<A>>,
    receivers: Vec<Receiver<Vec<u8>>>,
    aggregators: Arc<Aggregators>,
    globals: AggregateValues,
    reduced: AggregateReport,
    superstep: u64,
    max_supersteps: u64,
    vertex_count: u64,
    edge_count: u64,
    done: bool,
}

impl<A: Algorithm> LocalConductor<A> {
    pub fn new(algorithm: Arc<A>, nworkers: usize, config: WorkerConfig) -> Result<Self, PregelError> {
        if nworkers == 0 {
            return Err(PregelError::Config(
                "a computation needs at least one worker".to_string(),
            ));
        }
        config.validate()?;

        let addresses: Vec<WorkerAddress> = (0..nworkers)
            .map(|i| WorkerAddress::new(format!("worker-{}", i)))
            .collect();
        let partitions = u32::try_from(nworkers)
            .ok()
            .and_then(|n| n.checked_mul(config.partitions_per_worker))
            .ok_or_else(|| {
                PregelError::Config(format!(
                    "{} workers with {} partitions each do not fit a partition id",
                    nworkers, config.partitions_per_worker
                ))
            })?;
        let partitioner = Arc::new(HashPartitioner::new(partitions, addresses.clone())?);
        let (network, mut channels) = ChannelNetwork::create(&addresses);
        let network = Arc::new(network);

        let mut workers = Vec::with_capacity(nworkers);
        let mut receivers = Vec::with_capacity(nworkers);
        for address in addresses {
            let receiver = channels.remove(&address).ok_or_else(|| PregelError::Network {
                address: address.clone(),
                reason: "no channel".to_string(),
            })?;
            workers.push(Worker::new(
                address,
                algorithm.clone(),
                &config,
                partitioner.clone(),
                network.clone(),
            )?);
            receivers.push(receiver);
        }

        let aggregators = workers[0].aggregators().clone();
        Ok(LocalConductor {
            workers,
            receivers,
            aggregators,
            globals: AggregateValues::new(),
            reduced: AggregateReport::default(),
            superstep: 0,
            max_supersteps: config.max_supersteps,
            vertex_count: 0,
            edge_count: 0,
            done: false,
        })
    }

    /// Hands `source` to every worker, each keeping the vertices it owns.
    pub fn load(&mut self, source: &mut dyn GraphSource<A::Value, A::Edge>) -> Result<u64, PregelError> {
        for worker in &self.workers {
            worker.load(source)?;
        }

        self.vertex_count = self.workers.iter().map(|w| w.local_vertex_count()).sum();
        self.edge_count = self.workers.iter().map(|w| w.local_edge_count()).sum();
        info!(
            workers = self.workers.len(),
            vertices = self.vertex_count,
            edges = self.edge_count,
            "graph loaded"
        );
        Ok(self.vertex_count)
    }

    pub fn store(&self, sink: &mut dyn GraphSink<A::Value>) -> Result<usize, PregelError> {
        let mut stored = 0;
        for worker in &self.workers {
            stored += worker.store(sink)?;
        }
        Ok(stored)
    }

    /// Latest reduced value of an aggregator.
    pub fn aggregated_value<T: 'static>(&self, name: &str) -> Option<&T> {
        self.globals.get(name)
    }

    pub fn vertex_value(&self, id: &str) -> Option<A::Value>
    where
        A::Value: Clone,
    {
        self.workers.iter().find_map(|worker| worker.vertex_value(id))
    }

    /// Supersteps completed so far.
    pub fn supersteps(&self) -> u64 {
        self.superstep
    }

    pub fn vertex_count(&self) -> u64 {
        self.vertex_count
    }

    pub fn worker_stats(&self) -> Vec<(WorkerAddress, WorkerStats)> {
        self.workers
            .iter()
            .map(|worker| (worker.address().clone(), worker.stats()))
            .collect()
    }

    fn fail(&mut self, error: PregelError) -> PregelError {
        self.done = true;
        warn!(superstep = self.superstep, error = %error, "computation failed");
        error
    }

    fn run_workers(&self) -> Vec<Result<SuperstepReport, PregelError>> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .workers
                .iter()
                .map(|worker| scope.spawn(move || worker.run_superstep()))
                .collect();

            handles
                .into_iter()
                .zip(&self.workers)
                .map(|(handle, worker)| match handle.join() {
                    Ok(result) => result.map_err(|e| PregelError::WorkerFailed {
                        address: worker.address().clone(),
                        source: Box::new(e),
                    }),
                    Err(_) => Err(PregelError::WorkerPanicked(worker.address().clone())),
                })
                .collect()
        })
    }

    fn deliver(&self) -> Result<usize, PregelError> {
        let mut batches = 0;
        for (worker, receiver) in self.workers.iter().zip(&self.receivers) {
            for payload in receiver.try_iter() {
                batches += 1;
                if let Err(e) = worker.receive_batch(&payload) {
                    // recoverable errors are already counted by the worker
                    if e.is_fatal() {
                        return Err(PregelError::WorkerFailed {
                            address: worker.address().clone(),
                            source: Box::new(e),
                        });
                    }
                }
            }
        }
        Ok(batches)
    }

    fn print_stats(&self, reports: &[SuperstepReport]) {
        let active: usize = reports.iter().map(|r| r.active).sum();
        let sent: usize = reports.iter().map(|r| r.sent).sum();
        info!(
            superstep = self.superstep,
            vertices = self.vertex_count,
            edges = self.edge_count,
            active,
            sent,
            "superstep done"
        );

        for report in reports {
            debug!(
                worker = %report.worker,
                computed = report.computed,
                active = report.active,
                received = report.received,
                sent = report.sent,
                dropped = report.dropped,
                errors = report.errors,
                elapsed_ms = report.elapsed_ms,
                "worker stats"
            );
        }
    }
}

impl<A: Algorithm> Conductor for LocalConductor<A> {
    fn start_superstep(&mut self) -> Result<u64, PregelError> {
        let start = SuperstepStart {
            superstep: self.superstep,
            vertex_count: self.vertex_count,
            edge_count: self.edge_count,
            aggregates: self.reduced.clone(),
        };

        for i in 0..self.workers.len() {
            if let Err(e) = self.workers[i].start_superstep(start.clone()) {
                let error = PregelError::WorkerFailed {
                    address: self.workers[i].address().clone(),
                    source: Box::new(e),
                };
                return Err(self.fail(error));
            }
        }
        Ok(self.superstep)
    }

    fn await_barrier(&mut self) -> Result<(), PregelError> {
        let mut reports = Vec::with_capacity(self.workers.len());
        for result in self.run_workers() {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => return Err(self.fail(e)),
            }
        }

        if let Err(e) = self.deliver() {
            return Err(self.fail(e));
        }

        let reduced = self
            .aggregators
            .reduce(reports.iter().map(|report| report.aggregates.clone()));
        match reduced {
            Ok(reduced) => {
                if let Err(e) = self.globals.apply(&self.aggregators, &reduced) {
                    return Err(self.fail(e));
                }
                self.reduced = reduced;
            }
            Err(e) => return Err(self.fail(e)),
        }

        self.print_stats(&reports);

        let active: usize = reports.iter().map(|r| r.active).sum();
        let sent: usize = reports.iter().map(|r| r.sent).sum();
        self.superstep += 1;
        if active == 0 && sent == 0 {
            self.done = true;
        } else if self.superstep >= self.max_supersteps {
            warn!(supersteps = self.superstep, "superstep limit reached");
            self.done = true;
        }
        Ok(())
    }

    fn is_globally_done(&self) -> bool {
        self.done
    }

    fn run(&mut self) -> Result<(), PregelError> {
        let now = Instant::now();
        while !self.is_globally_done() {
            self.start_superstep()?;
            self.await_barrier()?;
        }
        info!(
            supersteps = self.superstep,
            elapsed_ms = now.elapsed().as_millis() as u64,
            "computation finished"
        );
        Ok(())
    }
}
