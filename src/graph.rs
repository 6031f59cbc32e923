use crate::error::PregelError;
use crate::message::VertexId;
use crate::vertex::{Edge, Vertex};

use tracing::{debug, warn};

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Provides the initial vertices of a computation.
///
/// A worker calls `load` once and keeps only the vertices its partitions
/// own, so a source may be loaded several times.
pub trait GraphSource<V, E> {
    fn load(
        &mut self,
        visit: &mut dyn FnMut(Vertex<V, E>) -> Result<(), PregelError>,
    ) -> Result<(), PregelError>;
}

/// Receives the final vertex values of a computation.
pub trait GraphSink<V> {
    fn store(&mut self, id: &VertexId, value: &V) -> Result<(), PregelError>;
}

impl<V: Clone, E: Clone> GraphSource<V, E> for Vec<Vertex<V, E>> {
    fn load(
        &mut self,
        visit: &mut dyn FnMut(Vertex<V, E>) -> Result<(), PregelError>,
    ) -> Result<(), PregelError> {
        for vertex in self.iter() {
            visit(vertex.clone())?;
        }
        Ok(())
    }
}

impl<V: Clone> GraphSink<V> for HashMap<VertexId, V> {
    fn store(&mut self, id: &VertexId, value: &V) -> Result<(), PregelError> {
        self.insert(id.clone(), value.clone());
        Ok(())
    }
}

impl<V: Clone> GraphSink<V> for BTreeMap<VertexId, V> {
    fn store(&mut self, id: &VertexId, value: &V) -> Result<(), PregelError> {
        self.insert(id.clone(), value.clone());
        Ok(())
    }
}

pub type EdgeParserFn<E> = dyn Fn(&str) -> Option<(VertexId, VertexId, E)> + Send + Sync;
pub type VertexInitFn<V> = dyn Fn(&VertexId) -> V + Send + Sync;

/// Reads a line based edge list. Blank lines and lines starting with `#` are
/// ignored; every edge target becomes a vertex even without outgoing edges.
pub struct EdgeListSource<V, E> {
    path: PathBuf,
    edge_parser: Box<EdgeParserFn<E>>,
    vertex_init: Box<VertexInitFn<V>>,
}

impl<V, E> EdgeListSource<V, E> {
    pub fn new(
        path: impl AsRef<Path>,
        edge_parser: Box<EdgeParserFn<E>>,
        vertex_init: Box<VertexInitFn<V>>,
    ) -> Self {
        EdgeListSource {
            path: path.as_ref().to_path_buf(),
            edge_parser,
            vertex_init,
        }
    }
}

impl<V> EdgeListSource<V, ()> {
    /// `source<TAB>target` per line, as in the SNAP datasets.
    pub fn tab_separated(path: impl AsRef<Path>, vertex_init: Box<VertexInitFn<V>>) -> Self {
        EdgeListSource::new(path, Box::new(parse_unweighted), vertex_init)
    }
}

fn parse_unweighted(line: &str) -> Option<(VertexId, VertexId, ())> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(target), None) => Some((source.into(), target.into(), ())),
        _ => None,
    }
}

impl<V, E> GraphSource<V, E> for EdgeListSource<V, E> {
    fn load(
        &mut self,
        visit: &mut dyn FnMut(Vertex<V, E>) -> Result<(), PregelError>,
    ) -> Result<(), PregelError> {
        let file = File::open(&self.path)?;
        let mut adjacency: BTreeMap<VertexId, Vec<Edge<E>>> = BTreeMap::new();
        let mut skipped = 0_usize;

        for (number, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((source, target, value)) = (self.edge_parser)(line) else {
                skipped += 1;
                warn!(path = %self.path.display(), line = number + 1, "skipping unparseable edge");
                continue;
            };

            adjacency.entry(target.clone()).or_default();
            let edges = adjacency.entry(source.clone()).or_default();
            if edges.iter().any(|edge| edge.target() == &target) {
                warn!(%source, %target, "skipping duplicate edge");
            } else {
                edges.push(Edge::new(target, value));
            }
        }

        debug!(
            path = %self.path.display(),
            vertices = adjacency.len(),
            skipped,
            "edge list read"
        );

        for (id, edges) in adjacency {
            let value = (self.vertex_init)(&id);
            visit(Vertex::with_edges(id, value, edges))?;
        }
        Ok(())
    }
}

/// Writes `id<TAB>value` lines.
pub struct TsvSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> TsvSink<W> {
    pub fn new(writer: W) -> Self {
        TsvSink {
            writer: BufWriter::new(writer),
        }
    }

    pub fn finish(self) -> Result<W, PregelError> {
        self.writer
            .into_inner()
            .map_err(|e| PregelError::Io(e.into_error()))
    }
}

impl TsvSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PregelError> {
        Ok(TsvSink::new(File::create(path)?))
    }
}

impl<V: Display, W: Write> GraphSink<V> for TsvSink<W> {
    fn store(&mut self, id: &VertexId, value: &V) -> Result<(), PregelError> {
        writeln!(self.writer, "{}\t{}", id, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn collect<V, E>(source: &mut dyn GraphSource<V, E>) -> Vec<Vertex<V, E>> {
        let mut vertices = Vec::new();
        source
            .load(&mut |vertex: Vertex<V, E>| -> Result<(), PregelError> {
                vertices.push(vertex);
                Ok(())
            })
            .unwrap();
        vertices
    }

    #[test]
    fn edge_list_builds_adjacency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# FromNodeId\tToNodeId").unwrap();
        writeln!(file, "a\tb").unwrap();
        writeln!(file, "a\tc").unwrap();
        writeln!(file, "a\tb").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "b\tc").unwrap();
        writeln!(file, "broken").unwrap();
        file.flush().unwrap();

        let mut source = EdgeListSource::tab_separated(file.path(), Box::new(|_: &VertexId| 1.0_f64));
        let vertices = collect(&mut source);

        let ids: Vec<&str> = vertices.iter().map(|v| v.id().as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let targets: Vec<&str> = vertices[0]
            .get_outer_edges()
            .iter()
            .map(|e| e.target().as_str())
            .collect();
        assert_eq!(targets, vec!["b", "c"]);
        assert_eq!(vertices[1].edge_count(), 1);
        assert_eq!(vertices[2].edge_count(), 0);
        assert!(vertices.iter().all(|v| v.value == 1.0));
    }

    #[test]
    fn custom_parser_reads_weights() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s,t,2.5").unwrap();
        file.flush().unwrap();

        let parser = |line: &str| {
            let parts: Vec<&str> = line.split(',').collect();
            match parts.as_slice() {
                [s, t, w] => w.parse().ok().map(|w: f64| (VertexId::from(*s), VertexId::from(*t), w)),
                _ => None,
            }
        };
        let mut source = EdgeListSource::new(file.path(), Box::new(parser), Box::new(|_: &VertexId| 0_u32));
        let vertices = collect(&mut source);

        assert_eq!(vertices[0].get_outer_edges()[0].value, 2.5);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut source =
            EdgeListSource::tab_separated("/definitely/not/here.txt", Box::new(|_: &VertexId| ()));
        let result = source.load(&mut |_: Vertex<(), ()>| -> Result<(), PregelError> { Ok(()) });
        assert!(matches!(result, Err(PregelError::Io(_))));
    }

    #[test]
    fn tsv_sink_writes_lines() {
        let mut sink = TsvSink::new(Vec::new());
        sink.store(&VertexId::from("a"), &0.5_f64).unwrap();
        sink.store(&VertexId::from("b"), &2_f64).unwrap();
        let bytes = sink.finish().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\t0.5\nb\t2\n");
    }
}
