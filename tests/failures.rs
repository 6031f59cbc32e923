use pregel::algos::PageRank;
use pregel::{
    Algorithm, BincodeFormat, Combine, ComputeContext, LocalConductor, MessageBatch,
    MessageFormat, Messages, NetworkSender, PartitionId, PregelError, SuperstepStart,
    TablePartitioner, Vertex, VertexId, Worker, WorkerAddress, WorkerConfig,
};

use parking_lot::Mutex;

use std::sync::Arc;

/// Counts what it receives and sends one message along every edge in each
/// round.
struct Flood;

impl Algorithm for Flood {
    type Value = f64;
    type Edge = ();
    type Message = f64;

    fn name(&self) -> &str {
        "flood"
    }

    fn compute(&self, ctx: &mut ComputeContext<'_, f64, (), f64>, messages: &Messages<f64>) {
        *ctx.value_mut() += messages.iter().sum::<f64>();
        ctx.send_to_neighbors(1.0);
        if ctx.superstep() > 0 {
            ctx.vote_to_halt();
        }
    }

    fn combiner(&self) -> Option<Arc<dyn Combine<f64>>> {
        Some(Arc::new(pregel::SumCombiner))
    }
}

#[derive(Default)]
struct Wire {
    down: bool,
    batches: Mutex<Vec<(WorkerAddress, Vec<u8>)>>,
}

impl NetworkSender for Wire {
    fn send_batch(&self, to: &WorkerAddress, payload: Vec<u8>) -> Result<(), PregelError> {
        if self.down {
            return Err(PregelError::Network {
                address: to.clone(),
                reason: "unplugged".to_string(),
            });
        }
        self.batches.lock().push((to.clone(), payload));
        Ok(())
    }
}

fn table() -> Arc<TablePartitioner> {
    let mut table = TablePartitioner::new();
    table
        .assign("a", PartitionId(0), WorkerAddress::from("local"))
        .assign("b", PartitionId(1), WorkerAddress::from("remote"))
        .assign("c", PartitionId(2), WorkerAddress::from("remote"));
    Arc::new(table)
}

fn worker(network: Arc<Wire>, config: WorkerConfig) -> Worker<Flood> {
    let worker = Worker::new(
        WorkerAddress::from("local"),
        Arc::new(Flood),
        &config,
        table(),
        network,
    )
    .unwrap();

    let mut a = Vertex::new("a", 0.0);
    a.add_outer_edge("b", ())
        .add_outer_edge("c", ())
        .add_outer_edge("nowhere", ());
    worker.add_vertex(a).unwrap();
    worker
}

fn start(worker: &Worker<Flood>, superstep: u64) {
    worker
        .start_superstep(SuperstepStart {
            superstep,
            vertex_count: 3,
            ..SuperstepStart::default()
        })
        .unwrap();
}

#[test]
fn unresolvable_destinations_are_dropped_and_counted() {
    let network = Arc::new(Wire::default());
    let worker = worker(network.clone(), WorkerConfig::default());

    start(&worker, 0);
    let report = worker.run_superstep().unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(worker.stats().unresolved_messages, 1);

    // b and c share a worker but not a partition
    let batches = network.batches.lock();
    assert_eq!(batches.len(), 2);
    for (address, payload) in batches.iter() {
        assert_eq!(address.as_str(), "remote");
        let batch: MessageBatch<f64> = BincodeFormat.decode(payload).unwrap();
        assert_eq!(batch.superstep, 0);
        assert_eq!(batch.messages.len(), 1);
    }
}

#[test]
fn malformed_batches_do_not_stop_the_superstep() {
    let worker = worker(Arc::new(Wire::default()), WorkerConfig::default());
    start(&worker, 0);

    assert!(matches!(worker.receive_batch(b"not a batch"), Err(PregelError::Decode(_))));

    let mut batch = MessageBatch::new(0);
    batch.push(VertexId::from("a"), 2.0);
    batch.push(VertexId::from("a"), 3.0);
    let payload = MessageFormat::<f64>::encode(&BincodeFormat, &batch).unwrap();
    assert_eq!(worker.receive_batch(&payload).unwrap(), 2);

    worker.run_superstep().unwrap();
    start(&worker, 1);
    let report = worker.run_superstep().unwrap();

    assert_eq!(report.received, 2);
    assert_eq!(worker.vertex_value("a"), Some(5.0));
    assert_eq!(worker.stats().malformed_batches, 1);
}

#[test]
fn lost_flush_path_under_memory_pressure_is_fatal() {
    let network = Arc::new(Wire {
        down: true,
        ..Wire::default()
    });
    let config = WorkerConfig::default().with_max_pending_messages(1);
    let worker = worker(network, config);

    start(&worker, 0);
    let error = worker.run_superstep().unwrap_err();

    assert!(matches!(error, PregelError::MemoryBoundExceeded { bound: 1, .. }));
    assert!(error.is_fatal());
}

#[test]
fn transient_network_failures_are_counted() {
    let network = Arc::new(Wire {
        down: true,
        ..Wire::default()
    });
    let worker = worker(network, WorkerConfig::default());

    start(&worker, 0);
    let report = worker.run_superstep().unwrap();
    assert_eq!(report.errors, 2);
    assert_eq!(worker.stats().failed_batches, 2);
}

/// Claims to need a combiner but does not provide one.
struct Uncombined;

impl Algorithm for Uncombined {
    type Value = f64;
    type Edge = ();
    type Message = f64;

    fn name(&self) -> &str {
        "uncombined"
    }

    fn compute(&self, _ctx: &mut ComputeContext<'_, f64, (), f64>, _messages: &Messages<f64>) {}

    fn requires_combiner(&self) -> bool {
        true
    }
}

#[test]
fn misconfiguration_fails_before_the_first_superstep() {
    assert!(matches!(
        LocalConductor::new(Arc::new(Uncombined), 2, WorkerConfig::default()),
        Err(PregelError::MissingCombiner { .. })
    ));

    let config = WorkerConfig::default().with_partitions_per_worker(0);
    assert!(matches!(
        LocalConductor::new(Arc::new(PageRank::new()), 2, config),
        Err(PregelError::Config(_))
    ));
}
