use crate::combine::Combine;
use crate::message::VertexId;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use tracing::trace;

use std::borrow::Borrow;
use std::hash::{BuildHasherDefault, Hash};
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Messages buffered for one vertex.
pub(crate) enum Inbox<M> {
    /// Fold of everything received so far. Only empty while the combiner runs.
    Combined(Option<M>),
    Raw(Vec<M>),
}

impl<M> Inbox<M> {
    pub(crate) fn new(message: M, combined: bool) -> Self {
        if combined {
            Inbox::Combined(Some(message))
        } else {
            Inbox::Raw(vec![message])
        }
    }

    /// Adds a message, returning false when the raw list is full and the
    /// message was dropped.
    pub(crate) fn push(&mut self, message: M, combiner: Option<&dyn Combine<M>>, cap: usize) -> bool {
        match self {
            Inbox::Combined(slot) => {
                let merged = match (slot.take(), combiner) {
                    (Some(current), Some(combiner)) => combiner.combine(current, message),
                    _ => message,
                };
                *slot = Some(merged);
                true
            }
            Inbox::Raw(list) => {
                if list.len() >= cap {
                    return false;
                }
                list.push(message);
                true
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Inbox::Combined(slot) => slot.is_some() as usize,
            Inbox::Raw(list) => list.len(),
        }
    }

    pub(crate) fn into_messages(self) -> Messages<M> {
        match self {
            Inbox::Combined(Some(value)) => Messages::Combined(value),
            Inbox::Raw(list) if !list.is_empty() => Messages::Raw(list),
            _ => Messages::Empty,
        }
    }

    pub(crate) fn into_vec(self) -> Vec<M> {
        match self {
            Inbox::Combined(slot) => slot.into_iter().collect(),
            Inbox::Raw(list) => list,
        }
    }
}

impl<M: Clone> Inbox<M> {
    fn snapshot(&self) -> Messages<M> {
        match self {
            Inbox::Combined(Some(value)) => Messages::Combined(value.clone()),
            Inbox::Raw(list) if !list.is_empty() => Messages::Raw(list.clone()),
            _ => Messages::Empty,
        }
    }
}

/// The messages a vertex sees in one superstep.
///
/// With a combiner there is at most one value, reachable through
/// [`Messages::combined`]. Without one, [`Messages::iter`] walks every
/// message that arrived. `iter` works in both modes and can be called any
/// number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum Messages<M> {
    Empty,
    Combined(M),
    Raw(Vec<M>),
}

impl<M> Default for Messages<M> {
    fn default() -> Self {
        Messages::Empty
    }
}

impl<M> Messages<M> {
    pub fn empty() -> Self {
        Messages::Empty
    }

    /// The combined value, if a combiner produced one.
    pub fn combined(&self) -> Option<&M> {
        match self {
            Messages::Combined(value) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> MessageIter<'_, M> {
        let values: &[M] = match self {
            Messages::Empty => &[],
            Messages::Combined(value) => slice::from_ref(value),
            Messages::Raw(values) => values,
        };
        MessageIter(values.iter())
    }

    pub fn len(&self) -> usize {
        match self {
            Messages::Empty => 0,
            Messages::Combined(_) => 1,
            Messages::Raw(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_combined(&self) -> bool {
        matches!(self, Messages::Combined(_))
    }
}

impl<'a, M> IntoIterator for &'a Messages<M> {
    type Item = &'a M;
    type IntoIter = MessageIter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct MessageIter<'a, M>(slice::Iter<'a, M>);

impl<'a, M> Iterator for MessageIter<'a, M> {
    type Item = &'a M;

    fn next(&mut self) -> Option<&'a M> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<M> ExactSizeIterator for MessageIter<'_, M> {}

/// A vertex's inbox plus how many messages it accepted before combining.
struct Slot<M> {
    inbox: Inbox<M>,
    arrivals: usize,
}

impl<M> Slot<M> {
    fn new(inbox: Inbox<M>) -> Self {
        Slot { inbox, arrivals: 1 }
    }
}

/// Messages received for local vertices during one superstep.
///
/// Inserts for the same vertex serialize on the map shard that holds it, so
/// concurrent receive paths never lose a merge.
pub struct IncomingCache<M> {
    entries: FxDashMap<VertexId, Slot<M>>,
    combiner: Option<Arc<dyn Combine<M>>>,
    max_per_vertex: usize,
    received: AtomicUsize,
    dropped: AtomicUsize,
}

impl<M> IncomingCache<M> {
    pub fn new(combiner: Option<Arc<dyn Combine<M>>>, max_per_vertex: usize) -> Self {
        IncomingCache {
            entries: FxDashMap::default(),
            combiner,
            max_per_vertex,
            received: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn has_combiner(&self) -> bool {
        self.combiner.is_some()
    }

    /// Stores a message, merging it with whatever the vertex already holds.
    pub fn insert(&self, vertex: VertexId, message: M) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let combiner = self.combiner.as_deref();

        match self.entries.entry(vertex) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                if slot.inbox.push(message, combiner, self.max_per_vertex) {
                    slot.arrivals += 1;
                } else {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(vertex = %entry.key(), "inbox full, dropping message");
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::new(Inbox::new(message, combiner.is_some())));
            }
        }
    }

    /// Overwrites the vertex's messages with an already combined value.
    pub fn set_direct(&self, vertex: VertexId, message: M) {
        self.entries
            .insert(vertex, Slot::new(Inbox::new(message, self.combiner.is_some())));
    }

    /// Removes and returns the vertex's messages.
    pub fn take<Q>(&self, vertex: &Q) -> Messages<M>
    where
        VertexId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.remove(vertex) {
            Some((_, slot)) => slot.inbox.into_messages(),
            None => Messages::Empty,
        }
    }

    pub fn contains<Q>(&self, vertex: &Q) -> bool
    where
        VertexId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(vertex)
    }

    /// Raw inserts observed since the last clear, combined or not.
    pub fn message_count(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    /// Messages dropped because a vertex's uncombined list was full.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of vertices holding messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Buffered messages after combining.
    pub fn stored_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().inbox.len()).sum()
    }

    /// Messages accepted for the vertices still holding an entry, counted
    /// before combining. Overflow drops are not included.
    pub fn arrival_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().arrivals).sum()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.received.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl<M: Clone> IncomingCache<M> {
    /// Copies out the vertex's messages, leaving them in place.
    pub fn get<Q>(&self, vertex: &Q) -> Messages<M>
    where
        VertexId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get(vertex) {
            Some(slot) => slot.inbox.snapshot(),
            None => Messages::Empty,
        }
    }
}
