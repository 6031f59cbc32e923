use crate::message::VertexId;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<E> {
    target: VertexId,
    pub value: E,
}

impl<E> Edge<E> {
    pub fn new(target: impl Into<VertexId>, value: E) -> Self {
        Edge {
            target: target.into(),
            value,
        }
    }

    pub fn target(&self) -> &VertexId {
        &self.target
    }
}

/// A vertex owned by this worker. Only its own computation mutates it.
#[derive(Debug, Clone)]
pub struct Vertex<V, E> {
    id: VertexId,
    pub value: V,
    active: bool,
    outer_edges: Vec<Edge<E>>,
}

impl<V, E> Vertex<V, E> {
    pub fn new(id: impl Into<VertexId>, value: V) -> Self {
        Vertex {
            id: id.into(),
            value,
            active: true,
            outer_edges: Vec::new(),
        }
    }

    pub fn with_edges(id: impl Into<VertexId>, value: V, edges: Vec<Edge<E>>) -> Self {
        Vertex {
            id: id.into(),
            value,
            active: true,
            outer_edges: edges,
        }
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub(crate) fn activate(&mut self) {
        self.active = true;
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn add_outer_edge(&mut self, target: impl Into<VertexId>, value: E) -> &mut Self {
        self.outer_edges.push(Edge::new(target, value));
        self
    }

    pub fn has_outer_edge_to(&self, target: &VertexId) -> bool {
        self.outer_edges.iter().any(|edge| edge.target() == target)
    }

    pub fn get_outer_edges(&self) -> &[Edge<E>] {
        &self.outer_edges
    }

    pub fn edge_count(&self) -> usize {
        self.outer_edges.len()
    }
}
