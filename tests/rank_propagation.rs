use pregel::algos::{PageRank, CONVERGENCE};
use pregel::{Conductor, LocalConductor, Vertex, WorkerConfig};

use std::collections::BTreeMap;
use std::sync::Arc;

fn cycle() -> Vec<Vertex<f64, ()>> {
    let ids = ["a", "b", "c", "d"];
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let mut vertex = Vertex::new(*id, 1.0);
            vertex.add_outer_edge(ids[(i + 1) % ids.len()], ());
            vertex
        })
        .collect()
}

fn conductor(workers: usize) -> LocalConductor<PageRank> {
    let config = WorkerConfig::default().with_parallelism(2);
    let mut conductor = LocalConductor::new(Arc::new(PageRank::new()), workers, config).unwrap();
    assert_eq!(conductor.load(&mut cycle()).unwrap(), 4);
    conductor
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}

#[test]
fn first_superstep_passes_values_through() {
    let mut conductor = conductor(2);

    assert_eq!(conductor.start_superstep().unwrap(), 0);
    conductor.await_barrier().unwrap();
    for id in ["a", "b", "c", "d"] {
        assert_eq!(conductor.vertex_value(id), Some(1.0));
    }
    assert_eq!(conductor.aggregated_value::<f64>(CONVERGENCE), Some(&0.0));

    assert_eq!(conductor.start_superstep().unwrap(), 1);
    conductor.await_barrier().unwrap();
    for id in ["a", "b", "c", "d"] {
        assert_close(conductor.vertex_value(id).unwrap(), 0.15 / 4.0 + 0.85, 1e-12);
    }
    assert_close(
        *conductor.aggregated_value::<f64>(CONVERGENCE).unwrap(),
        1.0 - 0.8875,
        1e-12,
    );
    assert!(!conductor.is_globally_done());
}

#[test]
fn ranks_settle_on_the_uniform_distribution() {
    let mut conductor = conductor(2);
    conductor.run().unwrap();

    // rounds 0..=30, the last one only halts
    assert_eq!(conductor.supersteps(), 31);
    assert!(conductor.is_globally_done());

    let mut ranks: BTreeMap<pregel::VertexId, f64> = BTreeMap::new();
    assert_eq!(conductor.store(&mut ranks).unwrap(), 4);
    for rank in ranks.values() {
        assert_close(*rank, 0.25, 0.01);
    }

    let convergence = *conductor.aggregated_value::<f64>(CONVERGENCE).unwrap();
    assert!(convergence > 0.0 && convergence < 0.01, "convergence {}", convergence);
}

#[test]
fn worker_count_does_not_change_the_result() {
    let mut single = conductor(1);
    let mut spread = conductor(3);
    single.run().unwrap();
    spread.run().unwrap();

    for id in ["a", "b", "c", "d"] {
        assert_close(
            single.vertex_value(id).unwrap(),
            spread.vertex_value(id).unwrap(),
            1e-12,
        );
    }
}

#[test]
fn star_concentrates_rank_in_the_hub() {
    let mut graph: Vec<Vertex<f64, ()>> = Vec::new();
    let mut hub = Vertex::new("hub", 1.0);
    for i in 0..5 {
        let leaf = format!("leaf{}", i);
        let mut vertex = Vertex::new(leaf.as_str(), 1.0);
        vertex.add_outer_edge("hub", ());
        hub.add_outer_edge(leaf.as_str(), ());
        graph.push(vertex);
    }
    graph.push(hub);

    let mut conductor = LocalConductor::new(
        Arc::new(PageRank::new().with_rounds(10)),
        2,
        WorkerConfig::default(),
    )
    .unwrap();
    conductor.load(&mut graph).unwrap();
    conductor.run().unwrap();

    assert_eq!(conductor.supersteps(), 11);
    let hub = conductor.vertex_value("hub").unwrap();
    let leaf = conductor.vertex_value("leaf0").unwrap();
    assert!(hub > leaf, "hub {} leaf {}", hub, leaf);
}
