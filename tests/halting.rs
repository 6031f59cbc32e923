use pregel::{Algorithm, ComputeContext, Conductor, LocalConductor, Messages, Vertex, WorkerConfig};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Everybody halts right away; `a` wakes `b` in round 0 and `b` wakes `c`
/// in round 1.
#[derive(Default)]
struct Relay {
    invocations: Mutex<BTreeMap<String, Vec<u64>>>,
}

impl Algorithm for Relay {
    type Value = u32;
    type Edge = ();
    type Message = u32;

    fn name(&self) -> &str {
        "relay"
    }

    fn compute(&self, ctx: &mut ComputeContext<'_, u32, (), u32>, messages: &Messages<u32>) {
        self.invocations
            .lock()
            .entry(ctx.vertex_id().to_string())
            .or_default()
            .push(ctx.superstep());

        *ctx.value_mut() += messages.iter().sum::<u32>();
        let wake = matches!(
            (ctx.vertex_id().as_str(), ctx.superstep()),
            ("a", 0) | ("b", 1)
        );
        if wake {
            ctx.send_to_neighbors(1);
        }
        ctx.vote_to_halt();
    }
}

fn chain() -> Vec<Vertex<u32, ()>> {
    let mut a = Vertex::new("a", 0);
    a.add_outer_edge("b", ());
    let mut b = Vertex::new("b", 0);
    b.add_outer_edge("c", ());
    vec![a, b, Vertex::new("c", 0)]
}

fn run(workers: usize) -> (LocalConductor<Relay>, Arc<Relay>) {
    let relay = Arc::new(Relay::default());
    let mut conductor =
        LocalConductor::new(relay.clone(), workers, WorkerConfig::default()).unwrap();
    conductor.load(&mut chain()).unwrap();
    conductor.run().unwrap();
    (conductor, relay)
}

#[test]
fn halted_vertices_only_run_when_messaged() {
    for workers in [1, 2, 3] {
        let (conductor, relay) = run(workers);

        let expected: BTreeMap<String, Vec<u64>> = [
            ("a".to_string(), vec![0]),
            ("b".to_string(), vec![0, 1]),
            ("c".to_string(), vec![0, 2]),
        ]
        .into_iter()
        .collect();
        assert_eq!(*relay.invocations.lock(), expected);
        assert_eq!(conductor.supersteps(), 3);
        assert_eq!(conductor.vertex_value("c"), Some(1));
    }
}

#[test]
fn everyone_halting_without_messages_ends_the_computation() {
    let relay = Arc::new(Relay::default());
    let mut conductor = LocalConductor::new(relay.clone(), 2, WorkerConfig::default()).unwrap();
    let mut lonely = vec![Vertex::<u32, ()>::new("x", 0), Vertex::new("y", 0)];
    conductor.load(&mut lonely).unwrap();
    conductor.run().unwrap();

    assert_eq!(conductor.supersteps(), 1);
    assert_eq!(relay.invocations.lock().len(), 2);
}
