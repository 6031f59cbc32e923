use pregel::algos::{PageRank, CONVERGENCE};
use pregel::{
    Conductor, EdgeListSource, GraphSource, LocalConductor, PregelError, TsvSink, Vertex,
    VertexId, WorkerConfig,
};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs rank propagation over in-process workers", long_about = None)]
struct Args {
    /// Number of workers
    #[arg(long, short, default_value_t = 4, env = "PREGEL_WORKERS")]
    workers: usize,

    /// Tab separated edge list; a random graph is generated when missing
    #[arg(long)]
    edges: Option<PathBuf>,

    /// Vertices of the random graph
    #[arg(long, default_value_t = 1000)]
    random_vertices: usize,

    /// Outgoing edges per vertex of the random graph
    #[arg(long, default_value_t = 5)]
    random_degree: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Writes `id<TAB>rank` lines instead of printing the top ranks
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JSON worker configuration
    #[arg(long, env = "PREGEL_CONFIG")]
    config: Option<PathBuf>,
}

fn random_graph(vertices: usize, degree: usize, seed: u64) -> Vec<Vertex<f64, ()>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let initial = 1.0 / vertices as f64;

    (0..vertices)
        .map(|i| {
            let mut vertex = Vertex::new(format!("{}", i), initial);
            for _ in 0..degree {
                let target = VertexId::new(format!("{}", rng.gen_range(0..vertices)));
                if !vertex.has_outer_edge_to(&target) {
                    vertex.add_outer_edge(target, ());
                }
            }
            vertex
        })
        .collect()
}

fn main() -> Result<(), PregelError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => WorkerConfig::from_path(path)?,
        None => WorkerConfig::default(),
    };

    let mut conductor = LocalConductor::new(Arc::new(PageRank::new()), args.workers, config)?;
    let mut source: Box<dyn GraphSource<f64, ()>> = match &args.edges {
        Some(path) => Box::new(EdgeListSource::tab_separated(path, Box::new(|_: &VertexId| 1.0))),
        None => Box::new(random_graph(args.random_vertices, args.random_degree, args.seed)),
    };
    conductor.load(source.as_mut())?;
    conductor.run()?;

    info!(
        supersteps = conductor.supersteps(),
        convergence = ?conductor.aggregated_value::<f64>(CONVERGENCE),
        "page rank done"
    );

    match &args.output {
        Some(path) => {
            let mut sink = TsvSink::create(path)?;
            let stored = conductor.store(&mut sink)?;
            sink.finish()?;
            info!(path = %path.display(), stored, "ranks written");
        }
        None => {
            let mut ranks: BTreeMap<VertexId, f64> = BTreeMap::new();
            conductor.store(&mut ranks)?;
            let mut top: Vec<(VertexId, f64)> = ranks.into_iter().collect();
            top.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (id, rank) in top.iter().take(10) {
                println!("{}\t{:.6}", id, rank);
            }
        }
    }

    Ok(())
}
